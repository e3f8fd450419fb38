// ==========================================
// 同行评审系统 - 暂存导入实体
// ==========================================
// 职责: 暂存批次、标识符、提交结果
// ==========================================

use crate::domain::record::{ParsedRecord, RecordSet};
use crate::domain::types::StagingStatus;
use crate::importer::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// StagingId - 暂存标识（不透明令牌）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagingId(String);

impl StagingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StagingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StagingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StagingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==========================================
// ArtifactLocation - 上传文件位置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLocation(String);

impl ArtifactLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==========================================
// ClaimToken - 确认占用令牌
// ==========================================
// 确认流程独占暂存批次期间持有，提交或放弃后失效
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken(String);

impl ClaimToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ==========================================
// StagedImport - 暂存导入
// ==========================================
#[derive(Debug, Clone)]
pub struct StagedImport {
    pub id: StagingId,
    pub profile: String,
    pub artifact_location: ArtifactLocation,
    pub records: RecordSet,
    pub status: StagingStatus,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    /// 是否有确认流程正在进行
    pub claimed: bool,
}

/// 暂存列表（操作员界面用，不含记录明细）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedImportSummary {
    pub id: StagingId,
    pub profile: String,
    pub status: StagingStatus,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

// ==========================================
// CommitOutcome - 决策结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub staging_id: StagingId,
    pub status: StagingStatus,
    /// 实际写入记录数（取消时为 0）
    pub applied: usize,
}

// ==========================================
// DedupReport - 去重分类结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub key_field: String,
    pub new_records: Vec<ParsedRecord>,
    pub conflicting_records: Vec<ParsedRecord>,
}

impl DedupReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_records.is_empty()
    }

    /// 冲突记录的自然键（按行序）
    pub fn conflicting_keys(&self) -> Vec<String> {
        self.conflicting_records
            .iter()
            .map(|r| r.get(&self.key_field).unwrap_or_default().to_string())
            .collect()
    }
}

// ==========================================
// SubmitOutcome - 提交结果
// ==========================================
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// 校验通过并已暂存，等待操作员确认
    Staged {
        staging_id: StagingId,
        records: RecordSet,
        /// 提交时已存在的自然键（仅预览，确认时会重新检查）
        existing_keys: Vec<String>,
    },
    /// 校验失败，上传文件已删除
    Rejected(ValidationError),
}

impl SubmitOutcome {
    pub fn staging_id(&self) -> Option<&StagingId> {
        match self {
            SubmitOutcome::Staged { staging_id, .. } => Some(staging_id),
            SubmitOutcome::Rejected(_) => None,
        }
    }
}
