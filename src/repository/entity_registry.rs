// ==========================================
// 表格数据导入引擎 - 实体注册表
// ==========================================
// 职责: 类型标签 → 实体仓储（大小写不敏感）
// ==========================================

use crate::domain::entity::builtin_definitions;
use crate::repository::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::repository::error::RepositoryResult;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default, Clone)]
pub struct EntityRegistry {
    entries: HashMap<String, Arc<dyn EntityRepository>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置实体（participant / module / program）
    pub fn with_builtin_entities(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let mut registry = Self::new();
        for definition in builtin_definitions() {
            let repo = SqliteEntityRepository::new(conn.clone(), definition)?;
            registry.register(Arc::new(repo));
        }
        Ok(registry)
    }

    /// 注册实体仓储；同名标签后注册者覆盖
    pub fn register(&mut self, repo: Arc<dyn EntityRepository>) {
        let key = repo.definition().name.to_lowercase();
        self.entries.insert(key, repo);
    }

    /// 按类型标签查找
    pub fn resolve(&self, entity_type: &str) -> Option<Arc<dyn EntityRepository>> {
        self.entries.get(&entity_type.trim().to_lowercase()).cloned()
    }

    /// 已注册的类型标签（排序）
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entries.keys().cloned().collect();
        types.sort();
        types
    }
}
