// ==========================================
// 表格数据导入引擎 - 导入 Trait
// ==========================================
// 职责: 定义导入各阶段接口（不包含实现）
// 流程: 解析 → 列对齐 → 清洗 → 预览 | 确认 → 逐条落库 → 溯源
// ==========================================

use crate::domain::import::{FileInfo, ImportOutcome, PreviewResult};
use crate::domain::record::{ExplicitMapping, Record};
use crate::importer::data_cleaner::TransformSet;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParseOptions;
use async_trait::async_trait;

// ==========================================
// 导入选项
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub parse: ParseOptions,      // 解析选项
    pub transforms: TransformSet, // 对齐后的转换规则（为空则原样）
}

// ==========================================
// RecordImporter Trait
// ==========================================
// 用途: 两阶段导入主接口（预览不落库，确认才落库）
// 实现者: RecordImporterImpl
#[async_trait]
pub trait RecordImporter: Send + Sync {
    /// 预览导入
    ///
    /// # 参数
    /// - entity_type: 目标实体类型标签
    /// - file_bytes: 文件内容
    /// - media_type: 声明的媒体类型
    /// - mapping: 显式映射（源列 → 目标字段）
    ///
    /// # 返回
    /// - Ok(PreviewResult): full_data 与解析行数等长、同序
    /// - Err: UnknownEntity / ParseError
    async fn preview(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        media_type: &str,
        mapping: &ExplicitMapping,
    ) -> ImportResult<PreviewResult>;

    /// 预览导入（带解析/转换选项）
    async fn preview_with_options(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        media_type: &str,
        mapping: &ExplicitMapping,
        options: &ImportOptions,
    ) -> ImportResult<PreviewResult>;

    /// 确认导入
    ///
    /// # 说明
    /// - 逐条独立落库，单条失败写入结果的 errors，不中断后续记录
    /// - 结束后写一条溯源记录；溯源写入失败只记日志
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 成功条数 + 失败明细
    /// - Err: UnknownEntity / EmptyBatch
    async fn confirm(
        &self,
        entity_type: &str,
        records: Vec<Record>,
        file_info: FileInfo,
    ) -> ImportResult<ImportOutcome>;

    /// 直接导入（预览后立即确认全部记录，按 CSV 解析）
    async fn import_direct(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        mapping: Option<&ExplicitMapping>,
    ) -> ImportResult<ImportOutcome>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析字节流为原始行记录（列名 → 值），保持源文件行序
    fn parse_to_raw_records(
        &self,
        bytes: &[u8],
        options: &ParseOptions,
    ) -> ImportResult<Vec<Record>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 列对齐接口
// 实现者: FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 将一行原始记录对齐到目标字段清单
    ///
    /// # 参数
    /// - row: 原始行
    /// - target_fields: 目标字段清单
    /// - mapping: 显式映射
    ///
    /// # 返回
    /// - 对齐后记录（无法解析的字段不出现）
    fn reconcile(
        &self,
        row: &Record,
        target_fields: &[String],
        mapping: &ExplicitMapping,
    ) -> Record;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 对齐后字段转换
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// 按规则转换记录；规则为空时原样返回
    fn apply_transforms(&self, record: Record, transforms: &TransformSet) -> Record;
}
