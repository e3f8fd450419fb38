// ==========================================
// 同行评审系统 - 应用层
// ==========================================
// 职责: 组装各层组件，供命令行与上层调用
// ==========================================

pub mod state;

// 重导出
pub use crate::db::get_default_db_path;
pub use state::AppState;
