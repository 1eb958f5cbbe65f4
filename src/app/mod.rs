// ==========================================
// 表格数据导入引擎 - 应用层
// ==========================================
// 职责: 启动装配与命令行传输
// ==========================================

pub mod cli;
pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
