// ==========================================
// 同行评审系统 - 配置层
// ==========================================
// 职责: 导入流程配置读取与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, default_artifact_dir, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportConfigReader};
