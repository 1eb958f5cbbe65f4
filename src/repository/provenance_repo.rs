// ==========================================
// 表格数据导入引擎 - 导入溯源 Repository
// ==========================================
// 职责: import_provenance 表的追加写入与查询
// 红线: 只追加，不更新、不删除
// ==========================================

use crate::domain::import::ImportProvenance;
use crate::domain::types::ImportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProvenanceRepository Trait
// ==========================================
#[async_trait]
pub trait ProvenanceRepository: Send + Sync {
    /// 写入一条溯源记录
    async fn create(&self, provenance: &ImportProvenance) -> RepositoryResult<()>;

    /// 最近的溯源记录（按时间倒序）
    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportProvenance>>;
}

// ==========================================
// ProvenanceRepositoryImpl
// ==========================================
pub struct ProvenanceRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ProvenanceRepositoryImpl {
    /// 创建实例（表由 db::init_schema 建立）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row) -> rusqlite::Result<ImportProvenance> {
        let errors_json: String = row.get("errors_json")?;
        let uploaded_at: String = row.get("uploaded_at")?;
        let status: String = row.get("status")?;
        let size: i64 = row.get("size")?;
        let record_count: i64 = row.get("record_count")?;

        Ok(ImportProvenance {
            provenance_id: row.get("provenance_id")?,
            original_name: row.get("original_name")?,
            file_type: row.get("file_type")?,
            size: size.max(0) as u64,
            target_entity: row.get("target_entity")?,
            record_count: record_count.max(0) as usize,
            errors: serde_json::from_str(&errors_json).unwrap_or_default(),
            uploaded_by: row.get("uploaded_by")?,
            uploaded_at: DateTime::parse_from_rfc3339(&uploaded_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            status: ImportStatus::parse(&status),
        })
    }
}

#[async_trait]
impl ProvenanceRepository for ProvenanceRepositoryImpl {
    async fn create(&self, provenance: &ImportProvenance) -> RepositoryResult<()> {
        let errors_json = serde_json::to_string(&provenance.errors)?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO import_provenance (
                provenance_id, original_name, file_type, size, target_entity,
                record_count, errors_json, uploaded_by, uploaded_at, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                provenance.provenance_id,
                provenance.original_name,
                provenance.file_type,
                provenance.size as i64,
                provenance.target_entity,
                provenance.record_count as i64,
                errors_json,
                provenance.uploaded_by,
                provenance.uploaded_at.to_rfc3339(),
                provenance.status.as_str(),
            ],
        )?;

        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportProvenance>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT provenance_id, original_name, file_type, size, target_entity,
                   record_count, errors_json, uploaded_by, uploaded_at, status
            FROM import_provenance
            ORDER BY uploaded_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], Self::map_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::import::{FileInfo, ImportOutcome, RecordFailure};
    use crate::domain::record::record_from_pairs;

    fn setup() -> ProvenanceRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ProvenanceRepositoryImpl::new(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_create_and_list_recent() {
        let repo = setup();
        let file_info = FileInfo {
            original_name: "people.csv".to_string(),
            size: 128,
            file_type: "text/csv".to_string(),
            uploaded_by: Some("admin".to_string()),
        };
        let outcome = ImportOutcome {
            imported: 0,
            errors: vec![RecordFailure {
                record: record_from_pairs([("email", "x@example.com")]),
                error: "Duplicate entry".to_string(),
            }],
        };

        let provenance =
            ImportProvenance::from_outcome("p-1".to_string(), "participant", &file_info, &outcome);
        repo.create(&provenance).await.unwrap();

        let listed = repo.list_recent(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].provenance_id, "p-1");
        assert_eq!(listed[0].status, ImportStatus::Failed);
        assert_eq!(listed[0].errors.len(), 1);
        assert!(listed[0].errors[0].contains("Duplicate entry"));
        assert_eq!(listed[0].uploaded_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_list_recent_respects_limit() {
        let repo = setup();
        let outcome = ImportOutcome {
            imported: 1,
            errors: vec![],
        };
        for i in 0..3 {
            let p = ImportProvenance::from_outcome(
                format!("p-{}", i),
                "module",
                &FileInfo::default(),
                &outcome,
            );
            repo.create(&p).await.unwrap();
        }

        let listed = repo.list_recent(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.status == ImportStatus::Confirmed));
    }
}
