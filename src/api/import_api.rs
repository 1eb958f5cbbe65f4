// ==========================================
// 表格数据导入API
// ==========================================
// 职责: 面向传输层的导入接口（字符串级输入 → 强类型调用）
// 流程: preview / confirm / import_direct / extract / export / history
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{FileInfo, ImportOutcome, ImportProvenance, PreviewResult};
use crate::domain::record::{ExplicitMapping, Record};
use crate::importer::{
    export_records, AiExtractor, ImportError, ImportOptions, RecordImporter, RecordImporterImpl,
    TransformSet,
};
use crate::repository::ProvenanceRepository;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    /// 解析格式参数（大小写不敏感；缺省为 JSON）
    pub fn parse(raw: Option<&str>) -> ApiResult<Self> {
        match raw.map(|s| s.trim().to_lowercase()) {
            None => Ok(ExportFormat::Json),
            Some(s) if s.is_empty() || s == "json" => Ok(ExportFormat::Json),
            Some(s) if s == "csv" => Ok(ExportFormat::Csv),
            Some(s) => Err(ApiError::InvalidInput(format!(
                "导出格式必须为 json 或 csv: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
        }
    }
}

/// AI 抽取响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub extracted: Vec<Record>,
}

/// 解析显式映射（JSON 对象: 源列 → 目标字段）；空串视为无映射
pub fn parse_mapping(raw: Option<&str>) -> ApiResult<ExplicitMapping> {
    match raw.map(str::trim) {
        None | Some("") => Ok(ExplicitMapping::new()),
        Some(text) => serde_json::from_str::<ExplicitMapping>(text)
            .map_err(|e| ApiError::from(ImportError::InvalidMapping(e.to_string()))),
    }
}

/// 解析转换规则（JSON 对象: 目标字段 → 规则列表）；空串视为无规则
pub fn parse_transforms(raw: Option<&str>) -> ApiResult<TransformSet> {
    match raw.map(str::trim) {
        None | Some("") => Ok(TransformSet::new()),
        Some(text) => serde_json::from_str::<TransformSet>(text)
            .map_err(|e| ApiError::InvalidInput(format!("转换规则格式错误: {}", e))),
    }
}

/// 导入API
pub struct ImportApi {
    importer: Arc<RecordImporterImpl>,
    provenance_repo: Arc<dyn ProvenanceRepository>,
    ai_extractor: AiExtractor,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(
        importer: Arc<RecordImporterImpl>,
        provenance_repo: Arc<dyn ProvenanceRepository>,
        ai_extractor: AiExtractor,
    ) -> Self {
        Self {
            importer,
            provenance_repo,
            ai_extractor,
        }
    }

    /// 已注册的实体类型
    pub fn entity_types(&self) -> Vec<String> {
        self.importer.registry().entity_types()
    }

    /// 实体的目标字段清单（未知实体返回 None）
    pub fn entity_fields(&self, entity_type: &str) -> Option<Vec<String>> {
        self.importer
            .registry()
            .resolve(entity_type)
            .map(|repo| repo.schema_fields())
    }

    /// 预览导入
    ///
    /// # 参数
    /// - entity_type: 实体类型标签
    /// - file_bytes: 文件内容
    /// - media_type: 声明的媒体类型
    /// - mapping_json: 显式映射 JSON（可选）
    /// - transforms_json: 转换规则 JSON（可选）
    pub async fn preview(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        media_type: &str,
        mapping_json: Option<&str>,
        transforms_json: Option<&str>,
    ) -> ApiResult<PreviewResult> {
        let mapping = parse_mapping(mapping_json)?;
        let options = ImportOptions {
            transforms: parse_transforms(transforms_json)?,
            ..ImportOptions::default()
        };

        Ok(self
            .importer
            .preview_with_options(entity_type, file_bytes, media_type, &mapping, &options)
            .await?)
    }

    /// 确认导入（records 为预览返回的 full_data，可经调用方编辑）
    pub async fn confirm(
        &self,
        entity_type: &str,
        records: Vec<Record>,
        file_info: FileInfo,
    ) -> ApiResult<ImportOutcome> {
        Ok(self.importer.confirm(entity_type, records, file_info).await?)
    }

    /// 确认导入（records 以 JSON 数组文本提供）
    pub async fn confirm_json(
        &self,
        entity_type: &str,
        records_json: &str,
        file_info: FileInfo,
    ) -> ApiResult<ImportOutcome> {
        let records: Vec<Record> = serde_json::from_str(records_json)
            .map_err(|e| ApiError::InvalidInput(format!("记录数据格式错误: {}", e)))?;
        self.confirm(entity_type, records, file_info).await
    }

    /// 直接导入（CSV）
    pub async fn import_direct(
        &self,
        entity_type: &str,
        file_bytes: &[u8],
        mapping_json: Option<&str>,
    ) -> ApiResult<ImportOutcome> {
        let mapping = parse_mapping(mapping_json)?;
        let mapping = if mapping.is_empty() { None } else { Some(&mapping) };

        Ok(self
            .importer
            .import_direct(entity_type, file_bytes, mapping)
            .await?)
    }

    /// AI 抽取；未配置凭据或调用失败时返回空列表
    pub async fn extract(&self, text: &str, target_fields: &[String]) -> ApiResult<ExtractResponse> {
        if text.trim().is_empty() || target_fields.is_empty() {
            return Err(ApiError::InvalidInput(
                "需要提供文本与目标字段列表".to_string(),
            ));
        }

        let extracted = self
            .ai_extractor
            .extract(text, target_fields)
            .await
            .into_records();
        Ok(ExtractResponse { extracted })
    }

    /// 导出实体全部记录
    ///
    /// # 参数
    /// - entity_type: 实体类型标签
    /// - format: "json"（缺省）或 "csv"
    pub async fn export(&self, entity_type: &str, format: Option<&str>) -> ApiResult<String> {
        let format = ExportFormat::parse(format)?;
        let repo = self
            .importer
            .registry()
            .resolve(entity_type)
            .ok_or_else(|| ApiError::from(ImportError::UnknownEntity(entity_type.to_string())))?;

        let records = repo.find_all().await?;
        let output = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&records)
                .map_err(|e| ApiError::InternalError(format!("序列化失败: {}", e)))?,
            ExportFormat::Csv => export_records(&records)?,
        };

        info!(entity_type = %entity_type, format = %format, count = records.len(), "导出完成");
        Ok(output)
    }

    /// 最近的导入溯源记录
    pub async fn history(&self, limit: usize) -> ApiResult<Vec<ImportProvenance>> {
        Ok(self.provenance_repo.list_recent(limit).await?)
    }
}
