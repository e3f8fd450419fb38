// ==========================================
// 同行评审系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 每个错误都携带可定位的上下文（字段 / 行号 / 键列表）
// ==========================================

use crate::domain::types::StagingStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

// ==========================================
// ValidationError - 文件校验错误
// ==========================================
// 对一次提交是终局性的：上传文件立即删除，不进入暂存
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("表头缺少字段: {field}")]
    Schema { field: String },

    #[error("表头字段重复: {field}")]
    DuplicateHeader { field: String },

    #[error("列数不一致 (行 {line}): 期望 {expected} 列，实际 {actual} 列")]
    RowShape {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("必填字段为空 (行 {line}, 字段 {field})")]
    MissingValue { field: String, line: usize },

    #[error("文件不包含任何数据行")]
    EmptyDataset,

    #[error("CSV 解析失败 (行 {line}): {message}")]
    Malformed { line: usize, message: String },

    #[error("同一文件内自然键重复: {}", keys.join(", "))]
    DuplicateKeyInBatch { keys: Vec<String> },
}

impl ValidationError {
    /// 错误类别（供上层渲染 / 统计）
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Schema { .. } => "SCHEMA",
            ValidationError::DuplicateHeader { .. } => "DUPLICATE_HEADER",
            ValidationError::RowShape { .. } => "ROW_SHAPE",
            ValidationError::MissingValue { .. } => "MISSING_VALUE",
            ValidationError::EmptyDataset => "EMPTY_DATASET",
            ValidationError::Malformed { .. } => "MALFORMED",
            ValidationError::DuplicateKeyInBatch { .. } => "DUPLICATE_KEY_IN_BATCH",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::Schema { field }
            | ValidationError::DuplicateHeader { field }
            | ValidationError::MissingValue { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ValidationError::RowShape { line, .. }
            | ValidationError::MissingValue { line, .. }
            | ValidationError::Malformed { line, .. } => Some(*line),
            _ => None,
        }
    }
}

// ==========================================
// SchemaDefinitionError - 字段模式定义错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    #[error("字段重复定义: {0}")]
    DuplicateField(String),

    #[error("自然键 {0} 不是必填字段")]
    NaturalKeyNotRequired(String),
}

// ==========================================
// ImportError - 导入流程错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 校验错误 =====
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ===== 去重错误 =====
    #[error("自然键已存在，整批拒绝: {}", keys.join(", "))]
    DuplicateKey { keys: Vec<String> },

    // ===== 暂存状态错误 =====
    #[error("暂存导入不存在: {id}")]
    NotFound { id: String },

    #[error("无效的状态转换: id={id}, 当前状态={status}")]
    InvalidTransition { id: String, status: StagingStatus },

    #[error("暂存导入正在确认中: {id}")]
    DecisionInProgress { id: String },

    #[error("暂存文件与暂存记录不一致: {id} ({reason})")]
    ArtifactCorrupted { id: String, reason: String },

    // ===== 写入错误 =====
    #[error(
        "写入第 {index} 条记录失败 (行 {line}, 键 {key})，已写入 {applied} 条未回滚: {source}"
    )]
    RecordCreate {
        id: String,
        index: usize,
        line: usize,
        key: String,
        applied: usize,
        #[source]
        source: RepositoryError,
    },

    // ===== 配置错误 =====
    #[error("未知的导入配置档: {0}")]
    UnknownProfile(String),

    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 基础设施错误 =====
    #[error("文件存储失败: {0}")]
    Storage(String),

    #[error("数据库操作失败: {0}")]
    Database(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("序列化失败: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Database(err.to_string())
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Storage(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::StorageError(msg) => ImportError::Storage(msg),
            RepositoryError::LockError(msg) => ImportError::LockError(msg),
            other => ImportError::Database(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
