// ==========================================
// 表格数据导入引擎 - 领域模型层
// ==========================================
// 职责: 定义记录值模型、实体定义、导入过程对象
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod entity;
pub mod import;
pub mod record;
pub mod types;

// 重导出核心类型
pub use entity::{builtin_definitions, EntityDefinition, FieldDef, SYSTEM_FIELDS};
pub use import::{FileInfo, ImportOutcome, ImportProvenance, PreviewResult, RecordFailure};
pub use record::{record_from_pairs, ExplicitMapping, FieldValue, Record, DATE_FORMAT};
pub use types::{FieldKind, ImportStatus};
