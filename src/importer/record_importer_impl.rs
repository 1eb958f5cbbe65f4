// ==========================================
// 表格数据导入引擎 - 记录导入器实现
// ==========================================
// 职责: 整合两阶段导入流程
// 预览: 解析 → 列对齐 → 清洗 → 截取展示子集（不落库）
// 确认: 逐条落库 → 汇总结果 → 写溯源
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{FileInfo, ImportOutcome, ImportProvenance, PreviewResult, RecordFailure};
use crate::domain::record::{ExplicitMapping, Record};
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::{DataCleaner, FieldMapper, ImportOptions, RecordImporter};
use crate::repository::entity_registry::EntityRegistry;
use crate::repository::entity_repo::EntityRepository;
use crate::repository::provenance_repo::ProvenanceRepository;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 直接导入时写入溯源的文件名
pub const DIRECT_IMPORT_NAME: &str = "Direct Import";
/// 直接导入按此媒体类型解析
pub const DIRECT_IMPORT_MEDIA_TYPE: &str = "text/csv";

/// 所有行都没有取到值的目标字段
fn unresolved_fields<'a>(target_fields: &'a [String], rows: &[Record]) -> Vec<&'a str> {
    target_fields
        .iter()
        .filter(|f| !rows.iter().any(|r| r.contains_key(f.as_str())))
        .map(|f| f.as_str())
        .collect()
}

// ==========================================
// RecordImporterImpl - 记录导入器实现
// ==========================================
pub struct RecordImporterImpl {
    // 数据访问层
    registry: EntityRegistry,
    provenance_repo: Arc<dyn ProvenanceRepository>,

    // 配置读取器
    config: Arc<dyn ImportConfigReader>,

    // 导入组件
    file_parser: UniversalFileParser,
    data_cleaner: Box<dyn DataCleaner>,
}

impl RecordImporterImpl {
    /// 创建新的 RecordImporter 实例
    ///
    /// # 参数
    /// - registry: 实体注册表
    /// - provenance_repo: 溯源仓储
    /// - config: 配置读取器
    pub fn new(
        registry: EntityRegistry,
        provenance_repo: Arc<dyn ProvenanceRepository>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            registry,
            provenance_repo,
            config,
            file_parser: UniversalFileParser,
            data_cleaner: Box::new(DataCleanerImpl),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    fn resolve_entity(&self, entity_type: &str) -> ImportResult<Arc<dyn EntityRepository>> {
        self.registry
            .resolve(entity_type)
            .ok_or_else(|| ImportError::UnknownEntity(entity_type.to_string()))
    }

    /// 当前阈值配置下的列对齐器
    async fn field_mapper(&self) -> ImportResult<FieldMapperImpl> {
        let threshold = self
            .config
            .get_fuzzy_match_threshold()
            .await
            .map_err(|e| ImportError::InternalError(format!("读取配置失败: {}", e)))?;
        Ok(FieldMapperImpl::new(threshold))
    }

    async fn preview_row_limit(&self) -> ImportResult<usize> {
        self.config
            .get_preview_row_limit()
            .await
            .map_err(|e| ImportError::InternalError(format!("读取配置失败: {}", e)))
    }

    /// 写溯源；失败只记日志，不影响导入结果
    async fn record_provenance(
        &self,
        entity_type: &str,
        file_info: &FileInfo,
        outcome: &ImportOutcome,
    ) {
        let provenance = ImportProvenance::from_outcome(
            Uuid::new_v4().to_string(),
            entity_type,
            file_info,
            outcome,
        );

        match self.provenance_repo.create(&provenance).await {
            Ok(()) => debug!(provenance_id = %provenance.provenance_id, "溯源记录已写入"),
            Err(e) => error!(
                error = %e,
                original_name = %file_info.original_name,
                "溯源记录写入失败"
            ),
        }
    }
}

#[async_trait]
impl RecordImporter for RecordImporterImpl {
    async fn preview(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        media_type: &str,
        mapping: &ExplicitMapping,
    ) -> ImportResult<PreviewResult> {
        self.preview_with_options(
            entity_type,
            file_bytes,
            media_type,
            mapping,
            &ImportOptions::default(),
        )
        .await
    }

    #[instrument(skip(self, file_bytes, mapping, options), fields(size = file_bytes.len()))]
    async fn preview_with_options(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        media_type: &str,
        mapping: &ExplicitMapping,
        options: &ImportOptions,
    ) -> ImportResult<PreviewResult> {
        let start_time = Instant::now();

        // 步骤 1: 解析目标实体（未知实体在解析文件之前拒绝）
        let repo = self.resolve_entity(entity_type)?;
        let target_fields = repo.schema_fields();

        // 步骤 2: 解析文件
        debug!("步骤 2: 解析文件");
        let raw_records = self
            .file_parser
            .parse(file_bytes, media_type, &options.parse)
            .map_err(|e| {
                error!(error = %e, "文件解析失败");
                e
            })?;
        let total_rows = raw_records.len();
        info!(total_rows = total_rows, "文件解析完成");

        // 步骤 3: 列对齐 + 清洗（每行独立）
        debug!("步骤 3: 列对齐");
        let mapper = self.field_mapper().await?;
        let full_data: Vec<Record> = raw_records
            .iter()
            .map(|row| {
                let reconciled = mapper.reconcile(row, &target_fields, mapping);
                self.data_cleaner
                    .apply_transforms(reconciled, &options.transforms)
            })
            .collect();

        let unresolved = unresolved_fields(&target_fields, &full_data);
        if !full_data.is_empty() && !unresolved.is_empty() {
            debug!(unresolved = ?unresolved, "部分目标字段未匹配到源列");
        }

        // 步骤 4: 截取展示子集
        let limit = self.preview_row_limit().await?;
        let preview: Vec<Record> = full_data.iter().take(limit).cloned().collect();

        info!(
            entity_type = %entity_type,
            total_rows = total_rows,
            preview_rows = preview.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "预览完成"
        );

        Ok(PreviewResult {
            entity_type: entity_type.to_string(),
            total_rows,
            preview,
            full_data,
        })
    }

    #[instrument(skip(self, records, file_info), fields(count = records.len()))]
    async fn confirm(
        &self,
        entity_type: &str,
        records: Vec<Record>,
        file_info: FileInfo,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();

        let repo = self.resolve_entity(entity_type)?;
        if records.is_empty() {
            warn!("确认导入的记录为空");
            return Err(ImportError::EmptyBatch);
        }

        info!(
            entity_type = %entity_type,
            original_name = %file_info.original_name,
            "开始确认导入"
        );

        // 逐条独立落库，按输入顺序
        let mut imported = 0usize;
        let mut errors = Vec::new();
        for (idx, record) in records.into_iter().enumerate() {
            match repo.save(&record).await {
                Ok(_) => imported += 1,
                Err(e) => {
                    let failure = ImportError::from_save_failure(e);
                    let reason = failure.failure_reason();
                    warn!(row_number = idx + 1, error = %failure, "记录保存失败");
                    errors.push(RecordFailure {
                        record,
                        error: reason,
                    });
                }
            }
        }

        let outcome = ImportOutcome { imported, errors };

        self.record_provenance(entity_type, &file_info, &outcome)
            .await;

        info!(
            imported = outcome.imported,
            failed = outcome.errors.len(),
            status = %outcome.status(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "确认导入完成"
        );

        Ok(outcome)
    }

    #[instrument(skip(self, file_bytes, mapping), fields(size = file_bytes.len()))]
    async fn import_direct(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        mapping: Option<&ExplicitMapping>,
    ) -> ImportResult<ImportOutcome> {
        let empty = ExplicitMapping::new();
        let mapping = mapping.unwrap_or(&empty);

        let preview = self
            .preview(entity_type, file_bytes, DIRECT_IMPORT_MEDIA_TYPE, mapping)
            .await?;

        let file_info = FileInfo {
            original_name: DIRECT_IMPORT_NAME.to_string(),
            size: file_bytes.len() as u64,
            file_type: "csv".to_string(),
            uploaded_by: None,
        };

        self.confirm(entity_type, preview.full_data, file_info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::init_schema;
    use crate::domain::record::FieldValue;
    use crate::domain::import::ImportProvenance;
    use crate::domain::record::record_from_pairs;
    use crate::domain::types::ImportStatus;
    use crate::repository::error::{RepositoryError, RepositoryResult};
    use crate::repository::provenance_repo::ProvenanceRepositoryImpl;
    use rusqlite::Connection;
    use std::sync::Mutex;

    /// 写入总是失败的溯源仓储
    struct BrokenProvenanceRepository;

    #[async_trait]
    impl ProvenanceRepository for BrokenProvenanceRepository {
        async fn create(&self, _provenance: &ImportProvenance) -> RepositoryResult<()> {
            Err(RepositoryError::DatabaseQueryError("disk I/O error".to_string()))
        }

        async fn list_recent(&self, _limit: usize) -> RepositoryResult<Vec<ImportProvenance>> {
            Ok(Vec::new())
        }
    }

    fn setup() -> (RecordImporterImpl, Arc<ProvenanceRepositoryImpl>) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let registry = EntityRegistry::with_builtin_entities(conn.clone()).unwrap();
        let provenance = Arc::new(ProvenanceRepositoryImpl::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn).unwrap());

        (
            RecordImporterImpl::new(registry, provenance.clone(), config),
            provenance,
        )
    }

    #[tokio::test]
    async fn test_preview_aligns_all_rows() {
        let (importer, _) = setup();
        let csv = "First Name,Last Name,Email\nAda,Lovelace,ada@example.com\nAlan,Turing,alan@example.com\n";

        let result = importer
            .preview("participant", csv.as_bytes(), "text/csv", &ExplicitMapping::new())
            .await
            .unwrap();

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.full_data.len(), 2);
        assert_eq!(result.preview.len(), 2);
        assert_eq!(result.full_data[0]["firstName"], FieldValue::from("Ada"));
        assert_eq!(result.full_data[1]["email"], FieldValue::from("alan@example.com"));
    }

    #[tokio::test]
    async fn test_preview_unknown_entity() {
        let (importer, _) = setup();

        let err = importer
            .preview("widget", b"a\n1\n", "text/csv", &ExplicitMapping::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::UnknownEntity(t) if t == "widget"));
    }

    #[tokio::test]
    async fn test_confirm_empty_batch() {
        let (importer, provenance) = setup();

        let err = importer
            .confirm("module", vec![], FileInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::EmptyBatch));
        assert!(provenance.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_direct_writes_provenance() {
        let (importer, provenance) = setup();

        let outcome = importer
            .import_direct("module", b"title,credits\nAlgebra,4\nGeometry,\n", None)
            .await
            .unwrap();

        assert_eq!(outcome.imported, 2);
        assert!(outcome.errors.is_empty());

        let history = provenance.list_recent(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].original_name, DIRECT_IMPORT_NAME);
        assert_eq!(history[0].file_type, "csv");
        assert_eq!(history[0].record_count, 2);
    }

    #[tokio::test]
    async fn test_confirm_survives_provenance_write_failure() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let registry = EntityRegistry::with_builtin_entities(conn.clone()).unwrap();
        let config = Arc::new(ConfigManager::from_connection(conn).unwrap());
        let importer =
            RecordImporterImpl::new(registry, Arc::new(BrokenProvenanceRepository), config);

        let records = vec![
            record_from_pairs([("title", "Algebra")]),
            record_from_pairs([("title", "Geometry")]),
            record_from_pairs([("code", "NO-TITLE")]),
        ];

        let outcome = importer
            .confirm("module", records, FileInfo::default())
            .await
            .unwrap();

        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].error.contains("title"));
        assert_eq!(outcome.status(), ImportStatus::Confirmed);

        let stored = importer.registry().resolve("module").unwrap().count().await.unwrap();
        assert_eq!(stored, 2);
    }

    #[test]
    fn test_unresolved_fields_considers_every_row() {
        let targets = vec!["title".to_string(), "code".to_string(), "credits".to_string()];
        let rows = vec![
            record_from_pairs([("title", "Algebra")]),
            record_from_pairs([("code", "M2")]),
        ];

        assert_eq!(unresolved_fields(&targets, &rows), vec!["credits"]);
        assert_eq!(unresolved_fields(&targets, &[]).len(), 3);
    }
}
