// ==========================================
// 同行评审系统 - CSV 暂存导入核心库
// ==========================================
// 技术栈: Rust + SQLite
// 流程: 上传 → 校验 → 暂存预览 → 人工确认 / 取消 → 写入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问与上传文件存储
pub mod repository;

// 导入层 - 解析 / 校验 / 暂存
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ImportDecision, StagingStatus, TerminalStatus};

// 领域实体
pub use domain::{
    CommitOutcome, ImportProfile, ParsedRecord, RecordSet, StagedImport, StagingId, SubmitOutcome,
    ValidationResult,
};

// 导入器
pub use importer::{
    validate_csv, ImportError, StagedImporter, StagedImporterImpl, StagingStore, ValidationError,
};

// API
pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "同行评审系统 - CSV 导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
