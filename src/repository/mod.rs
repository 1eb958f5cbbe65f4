// ==========================================
// 表格数据导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含导入规则
// 职责: 提供实体记录与导入溯源的数据访问,屏蔽数据库细节
// 约束: 值一律参数化绑定；表/列名来自实体定义
// ==========================================

pub mod entity_registry;
pub mod entity_repo;
pub mod error;
pub mod provenance_repo;

// 重导出核心仓储
pub use entity_registry::EntityRegistry;
pub use entity_repo::{EntityRepository, SqliteEntityRepository, CREATED_AT_FIELD, ID_FIELD};
pub use error::{RepositoryError, RepositoryResult};
pub use provenance_repo::{ProvenanceRepository, ProvenanceRepositoryImpl};
