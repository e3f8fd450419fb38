// ==========================================
// 同行评审系统 - API层错误类型
// ==========================================
// 职责: 将导入流程错误转换为与传输无关的错误类别
// 约束: 每个错误都带可渲染的原因（字段 / 行号 / 键列表）
// ==========================================

use crate::importer::error::{ImportError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {message}")]
    ValidationError {
        message: String,
        kind: String,
        field: Option<String>,
        line: Option<usize>,
    },

    // ==========================================
    // 状态错误
    // ==========================================
    #[error("数据冲突: {message}")]
    Conflict { message: String, keys: Vec<String> },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: id={id}, 当前状态={status}")]
    InvalidStateTransition { id: String, status: String },

    /// 逐条写入中途失败，之前的记录已写入且未回滚
    #[error("部分提交: {message}")]
    PartialCommit {
        message: String,
        applied: usize,
        line: usize,
        key: String,
    },

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 错误类别代码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::PartialCommit { .. } => "PARTIAL_COMMIT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// 序列化用的错误载荷
    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            field: None,
            line: None,
            keys: Vec::new(),
            applied: None,
        };
        match self {
            ApiError::ValidationError { field, line, .. } => {
                payload.field = field.clone();
                payload.line = *line;
            }
            ApiError::Conflict { keys, .. } => payload.keys = keys.clone(),
            ApiError::PartialCommit {
                applied, line, key, ..
            } => {
                payload.applied = Some(*applied);
                payload.line = Some(*line);
                payload.keys = vec![key.clone()];
            }
            _ => {}
        }
        payload
    }
}

/// 错误载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<usize>,
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::ValidationError {
            message: err.to_string(),
            kind: err.kind().to_string(),
            field: err.field().map(str::to_string),
            line: err.line(),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = err.to_string();
        match err {
            ImportError::Validation(e) => e.into(),
            ImportError::DuplicateKey { keys } => ApiError::Conflict { message, keys },
            ImportError::DecisionInProgress { .. } => ApiError::Conflict {
                message,
                keys: Vec::new(),
            },
            ImportError::NotFound { id } => ApiError::NotFound(format!("暂存导入 {}", id)),
            ImportError::InvalidTransition { id, status } => ApiError::InvalidStateTransition {
                id,
                status: status.to_string(),
            },
            ImportError::RecordCreate {
                line, key, applied, ..
            } => ApiError::PartialCommit {
                message,
                applied,
                line,
                key,
            },
            ImportError::UnknownProfile(name) => {
                ApiError::InvalidInput(format!("未知的导入配置档: {}", name))
            }
            ImportError::Database(msg) | ImportError::LockError(msg) => ApiError::DatabaseError(msg),
            ImportError::ArtifactCorrupted { .. }
            | ImportError::ConfigReadError { .. }
            | ImportError::Storage(_)
            | ImportError::Serialization(_)
            | ImportError::Other(_) => ApiError::InternalError(message),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::StagingStatus;
    use crate::repository::error::RepositoryError;

    #[test]
    fn test_validation_error_keeps_context() {
        let api: ApiError = ImportError::Validation(ValidationError::MissingValue {
            field: "email".to_string(),
            line: 4,
        })
        .into();
        let payload = api.to_payload();
        assert_eq!(payload.code, "VALIDATION_ERROR");
        assert_eq!(payload.field.as_deref(), Some("email"));
        assert_eq!(payload.line, Some(4));
    }

    #[test]
    fn test_duplicate_key_is_conflict_with_keys() {
        let api: ApiError = ImportError::DuplicateKey {
            keys: vec!["u1".to_string()],
        }
        .into();
        assert_eq!(api.code(), "CONFLICT");
        assert_eq!(api.to_payload().keys, vec!["u1".to_string()]);
    }

    #[test]
    fn test_record_create_is_partial_commit() {
        let api: ApiError = ImportError::RecordCreate {
            id: "s1".to_string(),
            index: 2,
            line: 3,
            key: "u3".to_string(),
            applied: 2,
            source: RepositoryError::DatabaseQueryError("disk I/O".to_string()),
        }
        .into();
        let payload = api.to_payload();
        assert_eq!(payload.code, "PARTIAL_COMMIT");
        assert_eq!(payload.applied, Some(2));
        assert_eq!(payload.line, Some(3));
        assert!(payload.message.contains("u3"));
    }

    #[test]
    fn test_invalid_transition_reports_status() {
        let api: ApiError = ImportError::InvalidTransition {
            id: "s1".to_string(),
            status: StagingStatus::Committed,
        }
        .into();
        assert!(matches!(
            api,
            ApiError::InvalidStateTransition { ref status, .. } if status == "COMMITTED"
        ));
    }
}
