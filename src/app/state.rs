// ==========================================
// 同行评审系统 - 应用状态
// ==========================================
// 职责: 组装导入流程（连接 / 配置 / 文件存储 / 暂存 / 仓储 / API）
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection, read_schema_version};
use crate::domain::profile::ImportProfile;
use crate::importer::{StagedImporterImpl, StagingStore};
use crate::repository::{
    ArtifactStorage, FsArtifactStorage, TeamAssignmentRepository, UserRepository,
};

/// 应用状态
///
/// 所有组件共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 上传文件目录
    pub artifact_dir: PathBuf,

    /// CSV 导入API
    pub import_api: Arc<ImportApi>,

    /// 用户仓储（导入目标）
    pub user_repo: Arc<UserRepository>,

    /// 分组仓储（导入目标）
    pub team_repo: Arc<TeamAssignmentRepository>,
}

impl AppState {
    /// 创建新的AppState实例（上传目录取自配置）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub async fn new(db_path: String) -> Result<Self, String> {
        Self::build(db_path, None).await
    }

    /// 指定上传目录创建（测试与命令行覆写用）
    pub async fn with_artifact_dir(db_path: String, artifact_dir: PathBuf) -> Result<Self, String> {
        Self::build(db_path, Some(artifact_dir)).await
    }

    async fn build(db_path: String, artifact_dir: Option<PathBuf>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        match read_schema_version(&conn) {
            Ok(version) => tracing::debug!(schema_version = ?version, "数据库结构版本"),
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置与文件存储
        // ==========================================
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| format!("无法创建ConfigManager: {}", e))?;

        let artifact_dir = match artifact_dir {
            Some(dir) => dir,
            None => config
                .get_artifact_dir()
                .await
                .map_err(|e| format!("上传目录配置读取失败: {}", e))?,
        };
        let artifacts: Arc<dyn ArtifactStorage> = Arc::new(
            FsArtifactStorage::new(&artifact_dir)
                .map_err(|e| format!("无法创建上传目录 {}: {}", artifact_dir.display(), e))?,
        );

        // ==========================================
        // 暂存与导入目标
        // ==========================================
        let store = StagingStore::new(conn.clone(), artifacts.clone())
            .map_err(|e| format!("无法创建StagingStore: {}", e))?;

        let user_repo = Arc::new(UserRepository::from_connection(conn.clone()));
        let team_repo = Arc::new(TeamAssignmentRepository::from_connection(conn));

        let mut importer = StagedImporterImpl::with_defaults(config, store, artifacts);
        importer.register_profile(ImportProfile::users(), user_repo.clone());
        importer.register_profile(ImportProfile::team_assignments(), team_repo.clone());

        let import_api = Arc::new(ImportApi::new(Arc::new(importer)));

        tracing::info!(artifact_dir = %artifact_dir.display(), "AppState初始化完成");

        Ok(Self {
            db_path,
            artifact_dir,
            import_api,
            user_repo,
            team_repo,
        })
    }
}
