// ==========================================
// 同行评审系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入流程所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 暂存配置 =====

    /// 获取暂存超时秒数
    ///
    /// # 返回
    /// - 0: 不自动过期
    /// - n: 创建超过 n 秒的待确认导入可被过期
    ///
    /// # 默认值
    /// - 0
    async fn get_staging_ttl_secs(&self) -> ConfigResult<u64>;

    /// 获取最近导入列表条数
    ///
    /// # 默认值
    /// - 50
    async fn get_recent_import_limit(&self) -> ConfigResult<usize>;

    // ===== 上传配置 =====

    /// 获取单次上传最大字节数（超过则拒绝，不保存文件）
    ///
    /// # 默认值
    /// - 5 MiB
    async fn get_max_upload_bytes(&self) -> ConfigResult<usize>;

    /// 获取上传文件存放目录
    ///
    /// # 优先级
    /// 1. config_kv: artifact_dir
    /// 2. 环境变量 PEER_REVIEW_IMPORT_ARTIFACT_DIR
    /// 3. 用户数据目录/peer-review-import/artifacts
    async fn get_artifact_dir(&self) -> ConfigResult<PathBuf>;
}
