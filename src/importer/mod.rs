// ==========================================
// 表格数据导入引擎 - 导入层
// ==========================================
// 职责: 外部表格数据 → 目标实体记录
// 支持: CSV, Excel/ODS 工作簿, 自由文本（AI 抽取）
// ==========================================

// 模块声明
pub mod ai_extractor;
pub mod data_cleaner;
pub mod error;
pub mod export_serializer;
pub mod field_mapper;
pub mod file_parser;
pub mod fuzzy_matcher;
pub mod importer_trait;
pub mod record_importer_impl;

// 重导出核心类型
pub use ai_extractor::{AiClientError, AiExtractor, ExtractionOutcome, GeminiClient, TextGenerationClient};
pub use data_cleaner::{DataCleaner as DataCleanerImpl, FieldTransform, TransformSet};
pub use error::{ImportError, ImportResult};
pub use export_serializer::export_records;
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, ParseOptions, UniversalFileParser};
pub use fuzzy_matcher::{find_best_match, DEFAULT_MATCH_THRESHOLD};
pub use record_importer_impl::RecordImporterImpl;

// 重导出 Trait 接口
pub use importer_trait::{DataCleaner, FieldMapper, FileParser, ImportOptions, RecordImporter};
