// ==========================================
// 表格数据导入引擎 - API 层
// ==========================================
// 职责: 提供导入 API 接口,供命令行等传输层调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{parse_mapping, parse_transforms, ExportFormat, ExtractResponse, ImportApi};
