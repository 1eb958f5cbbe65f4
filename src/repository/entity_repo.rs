// ==========================================
// 表格数据导入引擎 - 实体仓储
// ==========================================
// 职责: 按实体定义落库/查询记录（使用 rusqlite）
// 红线: Repository 不含导入规则，只做类型转换 + CRUD
// ==========================================

use crate::domain::entity::{EntityDefinition, FieldDef};
use crate::domain::record::{FieldValue, Record, DATE_FORMAT};
use crate::domain::types::FieldKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// 记录主键字段名
pub const ID_FIELD: &str = "id";
/// 记录创建时间字段名
pub const CREATED_AT_FIELD: &str = "createdAt";

// ==========================================
// EntityRepository Trait
// ==========================================
// 用途: 单个实体类型的存储能力（字段清单 + 保存 + 查询 + 删除）
// 实现者: SqliteEntityRepository
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// 实体定义
    fn definition(&self) -> &EntityDefinition;

    /// 目标字段清单（供列对齐使用）
    fn schema_fields(&self) -> Vec<String> {
        self.definition().schema_fields()
    }

    /// 保存单条记录
    ///
    /// # 返回
    /// - Ok(Record): 已保存记录（含 id / createdAt）
    /// - Err(UniqueConstraintViolation): 唯一约束冲突
    /// - Err(ValidationError / FieldValueError): 必填缺失或类型无法转换
    async fn save(&self, record: &Record) -> RepositoryResult<Record>;

    /// 查询全部记录（按写入顺序）
    async fn find_all(&self) -> RepositoryResult<Vec<Record>>;

    /// 按 id 查询
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record>>;

    /// 按 id 删除，返回是否删除了记录
    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool>;

    /// 记录总数
    async fn count(&self) -> RepositoryResult<usize>;
}

// ==========================================
// 值转换（记录值 → 列值）
// ==========================================

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field_error(field: &FieldDef, message: String) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: field.name.clone(),
        message,
    }
}

/// 按字段类型转换记录值（空白值由调用方预先处理）
fn coerce_value(field: &FieldDef, value: &FieldValue) -> RepositoryResult<SqlValue> {
    match (field.kind, value) {
        (_, FieldValue::Empty) => Ok(SqlValue::Null),

        (FieldKind::Text, v) => Ok(SqlValue::Text(v.to_cell_string())),

        (FieldKind::Number, FieldValue::Number(n)) => Ok(SqlValue::Real(*n)),
        (FieldKind::Number, FieldValue::Bool(b)) => Ok(SqlValue::Real(if *b { 1.0 } else { 0.0 })),
        (FieldKind::Number, FieldValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::Real)
            .map_err(|_| field_error(field, format!("无法解析为数值: {}", s))),
        (FieldKind::Number, FieldValue::Date(_)) => {
            Err(field_error(field, "日期不能转换为数值".to_string()))
        }

        (FieldKind::Bool, FieldValue::Bool(b)) => Ok(SqlValue::Integer(*b as i64)),
        (FieldKind::Bool, FieldValue::Number(n)) if *n == 0.0 || *n == 1.0 => {
            Ok(SqlValue::Integer(*n as i64))
        }
        (FieldKind::Bool, FieldValue::Text(s)) => parse_bool(s)
            .map(|b| SqlValue::Integer(b as i64))
            .ok_or_else(|| field_error(field, format!("无法解析为布尔值: {}", s))),
        (FieldKind::Bool, other) => Err(field_error(
            field,
            format!("无法解析为布尔值: {}", other.to_cell_string()),
        )),

        (FieldKind::Date, FieldValue::Date(d)) => {
            Ok(SqlValue::Text(d.format(DATE_FORMAT).to_string()))
        }
        (FieldKind::Date, FieldValue::Text(s)) => parse_datetime(s)
            .map(|d| SqlValue::Text(d.format(DATE_FORMAT).to_string()))
            .ok_or_else(|| field_error(field, format!("无法解析为日期: {}", s))),
        (FieldKind::Date, other) => Err(field_error(
            field,
            format!("无法解析为日期: {}", other.to_cell_string()),
        )),
    }
}

/// 列值 → 记录值
fn read_value(row: &Row, field: &FieldDef) -> rusqlite::Result<FieldValue> {
    let column = field.name.as_str();
    let value = match field.kind {
        FieldKind::Text => row
            .get::<_, Option<String>>(column)?
            .map(FieldValue::Text),
        FieldKind::Number => row.get::<_, Option<f64>>(column)?.map(FieldValue::Number),
        FieldKind::Bool => row
            .get::<_, Option<i64>>(column)?
            .map(|v| FieldValue::Bool(v != 0)),
        FieldKind::Date => row.get::<_, Option<String>>(column)?.map(|s| {
            NaiveDateTime::parse_from_str(&s, DATE_FORMAT)
                .map(FieldValue::Date)
                .unwrap_or(FieldValue::Text(s))
        }),
    };
    Ok(value.unwrap_or(FieldValue::Empty))
}

// ==========================================
// SqliteEntityRepository
// ==========================================
pub struct SqliteEntityRepository {
    conn: Arc<Mutex<Connection>>,
    definition: EntityDefinition,
}

impl SqliteEntityRepository {
    /// 创建仓储并确保实体表存在
    ///
    /// # 参数
    /// - conn: 共享连接
    /// - definition: 实体定义
    pub fn new(conn: Arc<Mutex<Connection>>, definition: EntityDefinition) -> RepositoryResult<Self> {
        let repo = Self { conn, definition };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let mut columns = vec![format!("\"{}\" TEXT PRIMARY KEY", ID_FIELD)];
        for field in &self.definition.fields {
            let mut column = format!("\"{}\" {}", field.name, field.kind.sql_type());
            if field.required {
                column.push_str(" NOT NULL");
            }
            if field.unique {
                column.push_str(" UNIQUE");
            }
            columns.push(column);
        }
        columns.push("\"created_at\" TEXT NOT NULL".to_string());

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            self.definition.table,
            columns.join(", ")
        );

        let conn = self.lock()?;
        conn.execute(&sql, [])
            .map_err(|e| RepositoryError::SchemaError {
                table: self.definition.table.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// 组装待写入的列值（缺省值、必填校验、类型转换）
    fn build_values(&self, record: &Record) -> RepositoryResult<Vec<SqlValue>> {
        let mut values = Vec::with_capacity(self.definition.fields.len());

        for field in &self.definition.fields {
            let provided = record
                .get(&field.name)
                .filter(|v| !v.is_blank())
                .or(field.default.as_ref());

            match provided {
                Some(value) => values.push(coerce_value(field, value)?),
                None if field.required => {
                    return Err(RepositoryError::ValidationError(format!(
                        "{} 为必填字段",
                        field.name
                    )));
                }
                None => values.push(SqlValue::Null),
            }
        }

        Ok(values)
    }

    fn select_sql(&self) -> String {
        let mut columns = vec![format!("\"{}\"", ID_FIELD)];
        columns.extend(self.definition.fields.iter().map(|f| format!("\"{}\"", f.name)));
        columns.push("\"created_at\"".to_string());
        format!(
            "SELECT {} FROM \"{}\"",
            columns.join(", "),
            self.definition.table
        )
    }

    /// 行 → 持久化记录视图（id, 字段..., createdAt）
    fn map_row(&self, row: &Row) -> rusqlite::Result<Record> {
        let mut record = Record::with_capacity(self.definition.fields.len() + 2);
        record.insert(
            ID_FIELD.to_string(),
            FieldValue::Text(row.get::<_, String>(ID_FIELD)?),
        );
        for field in &self.definition.fields {
            record.insert(field.name.clone(), read_value(row, field)?);
        }
        record.insert(
            CREATED_AT_FIELD.to_string(),
            FieldValue::Text(row.get::<_, String>("created_at")?),
        );
        Ok(record)
    }
}

#[async_trait]
impl EntityRepository for SqliteEntityRepository {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn save(&self, record: &Record) -> RepositoryResult<Record> {
        let values = self.build_values(record)?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        let mut columns = vec![format!("\"{}\"", ID_FIELD)];
        columns.extend(self.definition.fields.iter().map(|f| format!("\"{}\"", f.name)));
        columns.push("\"created_at\"".to_string());
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.definition.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut all_values = Vec::with_capacity(values.len() + 2);
        all_values.push(SqlValue::Text(id.clone()));
        all_values.extend(values);
        all_values.push(SqlValue::Text(created_at));

        {
            let conn = self.lock()?;
            conn.execute(&sql, params_from_iter(all_values.iter()))?;
        }

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: self.definition.name.clone(),
                id,
            })
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Record>> {
        let conn = self.lock()?;
        let sql = format!("{} ORDER BY rowid", self.select_sql());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| self.map_row(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Record>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE \"{}\" = ?1", self.select_sql(), ID_FIELD);
        let result = conn.query_row(&sql, params![id], |row| self.map_row(row));

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.lock()?;
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            self.definition.table, ID_FIELD
        );
        let affected = conn.execute(&sql, params![id])?;
        Ok(affected > 0)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.definition.table);
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::builtin_definitions;
    use crate::domain::record::record_from_pairs;

    fn repo_for(name: &str) -> SqliteEntityRepository {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let definition = builtin_definitions()
            .into_iter()
            .find(|d| d.name == name)
            .unwrap();
        SqliteEntityRepository::new(conn, definition).unwrap()
    }

    #[tokio::test]
    async fn test_save_applies_defaults_and_returns_view() {
        let repo = repo_for("participant");
        let record = record_from_pairs([
            ("firstName", "Ada"),
            ("lastName", "Lovelace"),
            ("email", "ada@example.com"),
        ]);

        let saved = repo.save(&record).await.unwrap();

        assert!(matches!(saved.get(ID_FIELD), Some(FieldValue::Text(_))));
        assert_eq!(saved["email"], FieldValue::from("ada@example.com"));
        assert_eq!(saved["status"], FieldValue::from("active"));
        assert_eq!(saved["phone"], FieldValue::Empty);
        assert!(saved.contains_key(CREATED_AT_FIELD));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation_is_distinguishable() {
        let repo = repo_for("participant");
        let record = record_from_pairs([
            ("firstName", "Ada"),
            ("lastName", "Lovelace"),
            ("email", "ada@example.com"),
        ]);

        repo.save(&record).await.unwrap();
        let err = repo.save(&record).await.unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueConstraintViolation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_required_field_missing() {
        let repo = repo_for("participant");
        let record = record_from_pairs([("firstName", "Ada"), ("email", "ada@example.com")]);

        let err = repo.save(&record).await.unwrap_err();

        assert!(matches!(err, RepositoryError::ValidationError(msg) if msg.contains("lastName")));
    }

    #[tokio::test]
    async fn test_number_and_bool_coercion() {
        let modules = repo_for("module");
        let saved = modules
            .save(&record_from_pairs([("title", "Algebra"), ("credits", "4")]))
            .await
            .unwrap();
        assert_eq!(saved["credits"], FieldValue::Number(4.0));

        let err = modules
            .save(&record_from_pairs([("title", "Geometry"), ("credits", "four")]))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { field, .. } if field == "credits"));

        let programs = repo_for("program");
        let saved = programs
            .save(&record_from_pairs([
                ("name", "Evening School"),
                ("isActive", "no"),
                ("startDate", "2025-09-01"),
            ]))
            .await
            .unwrap();
        assert_eq!(saved["isActive"], FieldValue::Bool(false));
        let expected = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(saved["startDate"], FieldValue::Date(expected));
    }

    #[tokio::test]
    async fn test_unknown_keys_ignored_and_delete() {
        let repo = repo_for("module");
        let saved = repo
            .save(&record_from_pairs([("title", "Algebra"), ("bogus", "x")]))
            .await
            .unwrap();
        assert!(!saved.contains_key("bogus"));
        assert_eq!(saved["credits"], FieldValue::Number(3.0));

        let id = saved[ID_FIELD].to_cell_string();
        assert!(repo.delete_by_id(&id).await.unwrap());
        assert!(!repo.delete_by_id(&id).await.unwrap());
        assert!(repo.find_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_keeps_insert_order() {
        let repo = repo_for("module");
        for title in ["C", "A", "B"] {
            repo.save(&record_from_pairs([("title", title)])).await.unwrap();
        }

        let titles: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r["title"].to_cell_string())
            .collect();

        assert_eq!(titles, vec!["C", "A", "B"]);
    }
}
