// ==========================================
// 表格数据导入引擎 - 配置层
// ==========================================
// 职责: 导入相关配置读取与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, defaults, ConfigManager, AI_API_KEY_ENV};
pub use import_config_trait::{ConfigError, ImportConfigReader};
