// ==========================================
// 同行评审系统 - 暂存导入 Trait
// ==========================================
// 职责: 定义校验 / 暂存 / 确认提交各环节接口（不包含实现）
// 流程: 解析 → 表头校验 → 记录解析 → 批内去重 → 暂存 → 决策
// ==========================================

use crate::domain::record::{FieldSchema, RawTable, RecordSet};
use crate::domain::staging::{CommitOutcome, DedupReport, StagedImportSummary, StagingId, SubmitOutcome};
use crate::domain::types::ImportDecision;
use crate::importer::error::{ImportResult, ValidationError};
use crate::repository::error::RepositoryResult;
use crate::repository::record_repo::RecordRepository;
use async_trait::async_trait;

// ==========================================
// StagedImporter Trait
// ==========================================
// 用途: 导入流程主接口（向上暴露的两个边界操作 + 运维操作）
// 实现者: StagedImporterImpl
#[async_trait]
pub trait StagedImporter: Send + Sync {
    /// 提交上传内容
    ///
    /// # 参数
    /// - profile: 导入配置档名称（users / team_assignments）
    /// - bytes: 原始文件内容
    ///
    /// # 返回
    /// - Ok(Staged): 校验通过，已暂存等待确认
    /// - Ok(Rejected): 校验失败，上传文件已删除
    /// - Err: 未知配置档、存储失败等基础设施错误
    async fn submit(&self, profile: &str, bytes: &[u8]) -> ImportResult<SubmitOutcome>;

    /// 对暂存导入做出决策
    ///
    /// # 返回
    /// - Ok(CommitOutcome): 终态与写入条数
    /// - Err(DuplicateKey / RecordCreate / ArtifactCorrupted): 暂存保持待确认
    /// - Err(NotFound / InvalidTransition / DecisionInProgress): 无任何副作用
    async fn decide(&self, id: &StagingId, decision: ImportDecision)
        -> ImportResult<CommitOutcome>;

    /// 过期超时的待确认导入，返回过期条数（TTL 为 0 时不做任何事）
    async fn expire_stale(&self) -> ImportResult<usize>;

    /// 最近的暂存导入（新的在前）
    async fn list_recent(&self) -> ImportResult<Vec<StagedImportSummary>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（步骤 1）
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析原始字节为表头 + 数据行
    ///
    /// # 返回
    /// - Err(Malformed): 无法解码（引号不闭合 / 非 UTF-8）
    /// - Err(EmptyDataset): 连表头都没有
    fn parse(&self, bytes: &[u8]) -> Result<RawTable, ValidationError>;
}

// ==========================================
// SchemaValidator Trait
// ==========================================
// 用途: 表头校验接口（步骤 2）
// 实现者: HeaderValidator
pub trait SchemaValidator: Send + Sync {
    /// 检查必填字段是否全部出现在表头（精确、区分大小写）
    ///
    /// # 返回
    /// - Err(Schema { field }): 按模式顺序第一个缺失的字段
    fn validate_header(&self, header: &[String], schema: &FieldSchema)
        -> Result<(), ValidationError>;
}

// ==========================================
// RecordParser Trait
// ==========================================
// 用途: 记录解析接口（步骤 3）
// 实现者: RowRecordParser
pub trait RecordParser: Send + Sync {
    /// 将数据行按位置与表头配对为记录集（遇到第一个错误即停止）
    fn parse_records(
        &self,
        table: &RawTable,
        schema: &FieldSchema,
    ) -> Result<RecordSet, ValidationError>;
}

// ==========================================
// DedupChecker Trait
// ==========================================
// 用途: 自然键去重接口（步骤 4 与确认阶段）
// 实现者: NaturalKeyDedupChecker
#[async_trait]
pub trait DedupChecker: Send + Sync {
    /// 批内重复的自然键（每个键只列一次，按首次重复出现顺序）
    fn find_in_batch_duplicates(&self, records: &RecordSet, key_field: &str) -> Vec<String>;

    /// 按是否已存在把记录分为新记录 / 冲突记录（只读）
    async fn partition(
        &self,
        records: &RecordSet,
        key_field: &str,
        lookup: &dyn RecordRepository,
    ) -> RepositoryResult<DedupReport>;
}
