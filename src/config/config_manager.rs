// ==========================================
// 表格数据导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigError, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::importer::fuzzy_matcher::DEFAULT_MATCH_THRESHOLD;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 凭据环境变量
pub const AI_API_KEY_ENV: &str = "GOOGLE_API_KEY";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；格式错误时记录警告并使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        Ok(raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
            default
        }))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式，凭据值不输出）
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            if key == config_keys::AI_API_KEY {
                config_map.insert(key, "***".to_string());
            } else {
                config_map.insert(key, value);
            }
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_fuzzy_match_threshold(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::FUZZY_MATCH_THRESHOLD, DEFAULT_MATCH_THRESHOLD)
    }

    async fn get_preview_row_limit(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::PREVIEW_ROW_LIMIT, defaults::PREVIEW_ROW_LIMIT)
    }

    async fn get_ai_max_input_chars(&self) -> Result<usize, ConfigError> {
        self.get_parsed_or_default(config_keys::AI_MAX_INPUT_CHARS, defaults::AI_MAX_INPUT_CHARS)
    }

    async fn get_ai_model(&self) -> Result<String, ConfigError> {
        self.get_config_or_default(config_keys::AI_MODEL, defaults::AI_MODEL)
    }

    async fn get_ai_timeout_secs(&self) -> Result<u64, ConfigError> {
        self.get_parsed_or_default(config_keys::AI_TIMEOUT_SECS, defaults::AI_TIMEOUT_SECS)
    }

    async fn get_ai_api_key(&self) -> Result<Option<String>, ConfigError> {
        if let Ok(key) = std::env::var(AI_API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(Some(key));
            }
        }

        Ok(self
            .get_global_config_value(config_keys::AI_API_KEY)?
            .filter(|v| !v.trim().is_empty()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 列对齐
    pub const FUZZY_MATCH_THRESHOLD: &str = "fuzzy_match_threshold";
    pub const PREVIEW_ROW_LIMIT: &str = "preview_row_limit";

    // AI 抽取
    pub const AI_MAX_INPUT_CHARS: &str = "ai_max_input_chars";
    pub const AI_MODEL: &str = "ai_model";
    pub const AI_TIMEOUT_SECS: &str = "ai_timeout_secs";
    pub const AI_API_KEY: &str = "ai_api_key";
}

/// 配置默认值
pub mod defaults {
    pub const PREVIEW_ROW_LIMIT: usize = 100;
    pub const AI_MAX_INPUT_CHARS: usize = 30_000;
    pub const AI_MODEL: &str = "gemini-1.5-flash";
    pub const AI_TIMEOUT_SECS: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = manager();

        assert_eq!(config.get_fuzzy_match_threshold().await.unwrap(), 3);
        assert_eq!(config.get_preview_row_limit().await.unwrap(), 100);
        assert_eq!(config.get_ai_max_input_chars().await.unwrap(), 30_000);
        assert_eq!(config.get_ai_model().await.unwrap(), "gemini-1.5-flash");
        assert_eq!(config.get_ai_timeout_secs().await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_overrides_and_bad_values() {
        let config = manager();
        config
            .set_config_value(config_keys::FUZZY_MATCH_THRESHOLD, "5")
            .unwrap();
        config
            .set_config_value(config_keys::PREVIEW_ROW_LIMIT, "abc")
            .unwrap();

        assert_eq!(config.get_fuzzy_match_threshold().await.unwrap(), 5);
        assert_eq!(config.get_preview_row_limit().await.unwrap(), 100);

        config
            .set_config_value(config_keys::FUZZY_MATCH_THRESHOLD, "1")
            .unwrap();
        assert_eq!(config.get_fuzzy_match_threshold().await.unwrap(), 1);
    }

    #[test]
    fn test_snapshot_masks_api_key() {
        let config = manager();
        config.set_config_value(config_keys::AI_API_KEY, "secret").unwrap();
        config.set_config_value(config_keys::AI_MODEL, "m").unwrap();

        let snapshot = config.get_config_snapshot().unwrap();

        assert!(!snapshot.contains("secret"));
        assert!(snapshot.contains("\"ai_model\":\"m\""));
    }
}
