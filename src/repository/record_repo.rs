// ==========================================
// 同行评审系统 - 记录仓储 Trait
// ==========================================
// 职责: 定义导入目标（系统记录）的数据访问接口
// 红线: Repository 不含业务规则，只做存在性查询与单条写入
// ==========================================

use crate::domain::record::ParsedRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;

// ==========================================
// RecordRepository Trait
// ==========================================
// 实现者: UserRepository / TeamAssignmentRepository（使用 rusqlite）
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// 检查自然键是否已存在
    ///
    /// # 参数
    /// - key: 自然键值（如 user_id）
    async fn exists(&self, key: &str) -> RepositoryResult<bool>;

    /// 写入单条记录
    ///
    /// # 说明
    /// - 单次有界请求；失败不重试（重试可能造成重复创建）
    async fn create(&self, record: &ParsedRecord) -> RepositoryResult<()>;
}

/// 从记录中取字段，缺失时返回 InvalidRecord
pub(crate) fn required_value<'a>(
    record: &'a ParsedRecord,
    field: &str,
) -> RepositoryResult<&'a str> {
    record
        .get(field)
        .ok_or_else(|| RepositoryError::InvalidRecord {
            field: field.to_string(),
        })
}
