// ==========================================
// 同行评审系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供导入目标与上传文件的访问接口,屏蔽存储细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod artifact_store;
pub mod error;
pub mod record_repo;
pub mod team_repo;
pub mod user_repo;

// 重导出核心仓储
pub use artifact_store::{ArtifactStorage, FsArtifactStorage};
pub use error::{RepositoryError, RepositoryResult};
pub use record_repo::RecordRepository;
pub use team_repo::{TeamAssignmentEntity, TeamAssignmentRepository};
pub use user_repo::{UserEntity, UserRepository};
