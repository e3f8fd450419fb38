// ==========================================
// 同行评审系统 - 导入领域类型定义
// ==========================================
// 职责: 暂存状态 / 终态 / 操作员决策
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 暂存状态 (Staging Status)
// ==========================================
// 状态机: PENDING_CONFIRMATION → {COMMITTED, CANCELLED, EXPIRED}
// 红线: 只能前进一次，不能回退，不能重复
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingStatus {
    PendingConfirmation, // 待确认
    Committed,           // 已提交
    Cancelled,           // 已取消
    Expired,             // 已过期
}

impl StagingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            StagingStatus::Committed => "COMMITTED",
            StagingStatus::Cancelled => "CANCELLED",
            StagingStatus::Expired => "EXPIRED",
        }
    }

    /// 从数据库字符串解析（未知值返回 None，不做静默回退）
    pub fn parse(s: &str) -> Option<StagingStatus> {
        match s.trim().to_uppercase().as_str() {
            "PENDING_CONFIRMATION" => Some(StagingStatus::PendingConfirmation),
            "COMMITTED" => Some(StagingStatus::Committed),
            "CANCELLED" => Some(StagingStatus::Cancelled),
            "EXPIRED" => Some(StagingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StagingStatus::PendingConfirmation)
    }
}

impl fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 终态 (Terminal Status)
// ==========================================
// finalize 只接受终态，类型层面排除 PENDING_CONFIRMATION
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Committed,
    Cancelled,
    Expired,
}

impl From<TerminalStatus> for StagingStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Committed => StagingStatus::Committed,
            TerminalStatus::Cancelled => StagingStatus::Cancelled,
            TerminalStatus::Expired => StagingStatus::Expired,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(StagingStatus::from(*self).as_str())
    }
}

// ==========================================
// 操作员决策 (Import Decision)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportDecision {
    Confirm, // 确认提交
    Cancel,  // 取消
}

impl ImportDecision {
    /// 兼容旧页面的 confirm=1/0 以及文本形式
    pub fn parse(s: &str) -> Option<ImportDecision> {
        match s.trim().to_lowercase().as_str() {
            "1" | "confirm" | "yes" => Some(ImportDecision::Confirm),
            "0" | "cancel" | "no" => Some(ImportDecision::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for ImportDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportDecision::Confirm => write!(f, "CONFIRM"),
            ImportDecision::Cancel => write!(f, "CANCEL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_status_round_trip_through_db_string() {
        for status in [
            StagingStatus::PendingConfirmation,
            StagingStatus::Committed,
            StagingStatus::Cancelled,
            StagingStatus::Expired,
        ] {
            assert_eq!(StagingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(StagingStatus::parse("DRAFT"), None);
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!StagingStatus::PendingConfirmation.is_terminal());
        assert!(StagingStatus::Committed.is_terminal());
        assert!(StagingStatus::Cancelled.is_terminal());
        assert!(StagingStatus::Expired.is_terminal());
    }

    #[test]
    fn test_decision_parse_accepts_legacy_flags() {
        assert_eq!(ImportDecision::parse("1"), Some(ImportDecision::Confirm));
        assert_eq!(ImportDecision::parse(" Cancel "), Some(ImportDecision::Cancel));
        assert_eq!(ImportDecision::parse("maybe"), None);
    }
}
