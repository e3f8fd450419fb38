// ==========================================
// 同行评审系统 - 暂存导入器实现
// ==========================================
// 职责: 整合导入流程，从上传内容到系统记录
// 提交: 大小检查 → 保存文件 → 解析 → 表头校验 → 记录解析 → 批内去重 → 已存在预览 → 暂存
// 确认: 占用 → 重读文件并重新校验 → 去重复查 → 逐条写入 → 终结
// ==========================================

use crate::config::{config_keys, ImportConfigReader};
use crate::domain::profile::ImportProfile;
use crate::domain::record::{RecordSet, ValidationResult};
use crate::domain::staging::{
    ArtifactLocation, CommitOutcome, StagedImport, StagedImportSummary, StagingId, SubmitOutcome,
};
use crate::domain::types::{ImportDecision, StagingStatus, TerminalStatus};
use crate::importer::dedup_checker::NaturalKeyDedupChecker;
use crate::importer::error::{ImportError, ImportResult, ValidationError};
use crate::importer::file_parser::CsvParser;
use crate::importer::record_parser::RowRecordParser;
use crate::importer::schema_validator::HeaderValidator;
use crate::importer::staged_importer_trait::{
    DedupChecker, FileParser, RecordParser, SchemaValidator, StagedImporter,
};
use crate::importer::staging_store::StagingStore;
use crate::repository::artifact_store::ArtifactStorage;
use crate::repository::record_repo::RecordRepository;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// 配置档与其写入目标
struct ProfileBinding {
    profile: ImportProfile,
    repository: Arc<dyn RecordRepository>,
}

// ==========================================
// StagedImporterImpl - 暂存导入器实现
// ==========================================
pub struct StagedImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 配置读取器
    config: C,

    // 暂存与文件
    store: StagingStore,
    artifacts: Arc<dyn ArtifactStorage>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    schema_validator: Box<dyn SchemaValidator>,
    record_parser: Box<dyn RecordParser>,
    dedup_checker: Box<dyn DedupChecker>,

    // 已注册的导入配置档
    profiles: HashMap<String, ProfileBinding>,
}

impl<C> StagedImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建新的 StagedImporter 实例
    ///
    /// # 参数
    /// - config: 配置读取器
    /// - store: 暂存存储（与 artifacts 共享同一文件存储）
    /// - artifacts: 上传文件存储
    /// - file_parser: 文件解析器
    /// - schema_validator: 表头校验器
    /// - record_parser: 记录解析器
    /// - dedup_checker: 自然键去重检查器
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: C,
        store: StagingStore,
        artifacts: Arc<dyn ArtifactStorage>,
        file_parser: Box<dyn FileParser>,
        schema_validator: Box<dyn SchemaValidator>,
        record_parser: Box<dyn RecordParser>,
        dedup_checker: Box<dyn DedupChecker>,
    ) -> Self {
        Self {
            config,
            store,
            artifacts,
            file_parser,
            schema_validator,
            record_parser,
            dedup_checker,
            profiles: HashMap::new(),
        }
    }

    /// 使用默认组件（CSV / 精确表头 / 逐行解析 / 自然键去重）
    pub fn with_defaults(
        config: C,
        store: StagingStore,
        artifacts: Arc<dyn ArtifactStorage>,
    ) -> Self {
        Self::new(
            config,
            store,
            artifacts,
            Box::new(CsvParser),
            Box::new(HeaderValidator),
            Box::new(RowRecordParser),
            Box::new(NaturalKeyDedupChecker),
        )
    }

    /// 注册导入配置档及其写入目标（同名覆盖）
    pub fn register_profile(
        &mut self,
        profile: ImportProfile,
        repository: Arc<dyn RecordRepository>,
    ) {
        debug!(profile = %profile.name(), "注册导入配置档");
        self.profiles.insert(
            profile.name().to_string(),
            ProfileBinding {
                profile,
                repository,
            },
        );
    }

    /// 只做校验，不保存、不暂存
    pub fn validate(&self, bytes: &[u8], profile: &ImportProfile) -> ValidationResult {
        self.run_validation(bytes, profile).into()
    }

    fn binding(&self, profile: &str) -> ImportResult<&ProfileBinding> {
        self.profiles
            .get(profile)
            .ok_or_else(|| ImportError::UnknownProfile(profile.to_string()))
    }

    // 解析 → 表头校验 → 记录解析 → 批内去重，遇到第一个错误即停止
    fn run_validation(
        &self,
        bytes: &[u8],
        profile: &ImportProfile,
    ) -> Result<RecordSet, ValidationError> {
        let table = self.file_parser.parse(bytes)?;
        self.schema_validator
            .validate_header(&table.header, profile.schema())?;
        let records = self.record_parser.parse_records(&table, profile.schema())?;

        let duplicates = self
            .dedup_checker
            .find_in_batch_duplicates(&records, profile.natural_key());
        if !duplicates.is_empty() {
            return Err(ValidationError::DuplicateKeyInBatch { keys: duplicates });
        }

        Ok(records)
    }

    // 提交失败路径上的文件清理；删除失败只记录
    fn discard_artifact(&self, location: &ArtifactLocation) {
        if let Err(e) = self.artifacts.delete(location) {
            error!(location = %location, error = %e, "上传文件删除失败");
        }
    }

    async fn staging_ttl(&self) -> ImportResult<Option<Duration>> {
        let secs = self
            .config
            .get_staging_ttl_secs()
            .await
            .map_err(config_error(config_keys::STAGING_TTL_SECS))?;
        if secs == 0 {
            return Ok(None);
        }
        Ok(i64::try_from(secs).ok().and_then(Duration::try_seconds))
    }

    async fn confirm(&self, id: &StagingId) -> ImportResult<CommitOutcome> {
        let staged = self.store.get(id)?;
        if staged.status != StagingStatus::PendingConfirmation {
            return Err(ImportError::InvalidTransition {
                id: id.to_string(),
                status: staged.status,
            });
        }
        let binding = self.binding(&staged.profile)?;

        // 超时的先按过期终结，再拒绝
        if let Some(ttl) = self.staging_ttl().await? {
            if Utc::now() - staged.created_at > ttl {
                self.store.finalize(id, TerminalStatus::Expired)?;
                warn!(staging_id = %id, "暂存导入已超时，确认被拒绝");
                return Err(ImportError::InvalidTransition {
                    id: id.to_string(),
                    status: StagingStatus::Expired,
                });
            }
        }

        let token = self.store.try_claim(id)?;

        let result = match self.apply(&staged, binding).await {
            Ok(applied) => self
                .store
                .finalize_claimed(id, &token, TerminalStatus::Committed)
                .map(|_| applied),
            Err(e) => Err(e),
        };

        match result {
            Ok(applied) => {
                info!(staging_id = %id, applied = applied, "导入已提交");
                Ok(CommitOutcome {
                    staging_id: id.clone(),
                    status: StagingStatus::Committed,
                    applied,
                })
            }
            Err(e) => {
                // 暂存保持待确认，操作员可取消或稍后重试
                if let Err(release_err) = self.store.release_claim(id, &token) {
                    error!(staging_id = %id, error = %release_err, "占用释放失败");
                }
                Err(e)
            }
        }
    }

    // 持有占用期间执行：重新校验 → 去重复查 → 逐条写入
    async fn apply(&self, staged: &StagedImport, binding: &ProfileBinding) -> ImportResult<usize> {
        let id = &staged.id;
        let key_field = binding.profile.natural_key();

        // === 步骤 1: 重读文件并重新校验 ===
        debug!(staging_id = %id, "步骤 1: 重新校验上传文件");
        let bytes = self
            .artifacts
            .read(&staged.artifact_location)
            .map_err(|e| ImportError::ArtifactCorrupted {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        let records = self
            .run_validation(&bytes, &binding.profile)
            .map_err(|e| ImportError::ArtifactCorrupted {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        if records != staged.records {
            error!(staging_id = %id, "上传文件与暂存记录不一致");
            return Err(ImportError::ArtifactCorrupted {
                id: id.to_string(),
                reason: "上传文件内容与暂存记录不一致".to_string(),
            });
        }

        // === 步骤 2: 去重复查（状态可能在暂存后变化） ===
        debug!(staging_id = %id, "步骤 2: 自然键去重复查");
        let report = self
            .dedup_checker
            .partition(&staged.records, key_field, binding.repository.as_ref())
            .await?;
        if report.has_conflicts() {
            let keys = report.conflicting_keys();
            warn!(staging_id = %id, conflicts = keys.len(), keys = ?keys, "自然键已存在，整批拒绝");
            return Err(ImportError::DuplicateKey { keys });
        }

        // === 步骤 3: 按行序逐条写入，失败即停，不回滚 ===
        debug!(staging_id = %id, rows = staged.records.len(), "步骤 3: 写入记录");
        for (index, record) in staged.records.iter().enumerate() {
            if let Err(source) = binding.repository.create(record).await {
                let key = record.get(key_field).unwrap_or_default().to_string();
                error!(
                    staging_id = %id,
                    index = index,
                    line = record.line(),
                    key = %key,
                    applied = index,
                    error = %source,
                    "记录写入失败，已写入的记录未回滚"
                );
                return Err(ImportError::RecordCreate {
                    id: id.to_string(),
                    index,
                    line: record.line(),
                    key,
                    applied: index,
                    source,
                });
            }
        }

        Ok(staged.records.len())
    }
}

#[async_trait]
impl<C> StagedImporter for StagedImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn submit(&self, profile: &str, bytes: &[u8]) -> ImportResult<SubmitOutcome> {
        let binding = self.binding(profile)?;

        // === 步骤 0: 大小检查（超限不保存文件） ===
        let max_bytes = self
            .config
            .get_max_upload_bytes()
            .await
            .map_err(config_error(config_keys::MAX_UPLOAD_BYTES))?;
        if bytes.len() > max_bytes {
            warn!(max_bytes = max_bytes, "上传内容超过大小上限");
            return Ok(SubmitOutcome::Rejected(ValidationError::Malformed {
                line: 0,
                message: format!("上传内容 {} 字节，超过上限 {} 字节", bytes.len(), max_bytes),
            }));
        }

        // === 步骤 1: 保存上传文件 ===
        let location = self.artifacts.save(bytes)?;
        debug!(location = %location, "上传文件已保存");

        // === 步骤 2: 校验 ===
        let records = match self.run_validation(bytes, &binding.profile) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    field = e.field().unwrap_or_default(),
                    line = e.line().unwrap_or_default(),
                    error = %e,
                    "校验失败，提交被拒绝"
                );
                self.discard_artifact(&location);
                return Ok(SubmitOutcome::Rejected(e));
            }
        };
        info!(rows = records.len(), "校验通过");

        // === 步骤 3: 已存在预览（只读，不阻止暂存） ===
        let report = match self
            .dedup_checker
            .partition(
                &records,
                binding.profile.natural_key(),
                binding.repository.as_ref(),
            )
            .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "已存在查询失败");
                self.discard_artifact(&location);
                return Err(e.into());
            }
        };
        let existing_keys = report.conflicting_keys();
        if !existing_keys.is_empty() {
            info!(conflicts = existing_keys.len(), "部分自然键已存在，确认时将被拒绝");
        }

        // === 步骤 4: 暂存 ===
        let staging_id = match self.store.stage(profile, &location, &records) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "暂存失败");
                self.discard_artifact(&location);
                return Err(e);
            }
        };

        Ok(SubmitOutcome::Staged {
            staging_id,
            records,
            existing_keys,
        })
    }

    #[instrument(skip(self, id), fields(staging_id = %id))]
    async fn decide(
        &self,
        id: &StagingId,
        decision: ImportDecision,
    ) -> ImportResult<CommitOutcome> {
        match decision {
            ImportDecision::Cancel => {
                self.store.finalize(id, TerminalStatus::Cancelled)?;
                info!(staging_id = %id, "导入已取消");
                Ok(CommitOutcome {
                    staging_id: id.clone(),
                    status: StagingStatus::Cancelled,
                    applied: 0,
                })
            }
            ImportDecision::Confirm => self.confirm(id).await,
        }
    }

    #[instrument(skip(self))]
    async fn expire_stale(&self) -> ImportResult<usize> {
        match self.staging_ttl().await? {
            Some(ttl) => self.store.expire_stale(ttl, Utc::now()),
            None => Ok(0),
        }
    }

    async fn list_recent(&self) -> ImportResult<Vec<StagedImportSummary>> {
        let limit = self
            .config
            .get_recent_import_limit()
            .await
            .map_err(config_error(config_keys::RECENT_IMPORT_LIMIT))?;
        self.store.list_recent(limit)
    }
}

fn config_error(key: &'static str) -> impl FnOnce(Box<dyn Error + Send + Sync>) -> ImportError {
    move |e| ImportError::ConfigReadError {
        key: key.to_string(),
        message: e.to_string(),
    }
}
