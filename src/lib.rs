// ==========================================
// 表格数据导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格数据 → 强类型实体的两阶段导入（预览 / 确认）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录值模型与实体定义
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析 / 列对齐 / 落库 / 导出
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 导入接口
pub mod api;

// 应用层 - 启动装配与命令行
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    EntityDefinition, ExplicitMapping, FieldDef, FieldKind, FieldValue, FileInfo, ImportOutcome,
    ImportProvenance, ImportStatus, PreviewResult, Record, RecordFailure,
};

pub use importer::{ImportError, RecordImporter, RecordImporterImpl};

pub use api::{ApiError, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "tabular-import";
