// ==========================================
// 同行评审系统 - 领域模型层
// ==========================================
// 职责: 定义导入流程的实体与类型
// 红线: 不含数据访问逻辑,不含流程编排
// ==========================================

pub mod profile;
pub mod record;
pub mod staging;
pub mod types;

// 重导出核心类型
pub use profile::{ImportProfile, TEAM_ASSIGNMENTS_PROFILE, USERS_PROFILE};
pub use record::{FieldSchema, ParsedRecord, RawTable, RecordSet, ValidationResult};
pub use staging::{
    ArtifactLocation, ClaimToken, CommitOutcome, DedupReport, StagedImport, StagedImportSummary,
    StagingId, SubmitOutcome,
};
pub use types::{ImportDecision, StagingStatus, TerminalStatus};
