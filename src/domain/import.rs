// ==========================================
// 表格数据导入引擎 - 导入过程对象
// ==========================================
// 职责: 预览结果 / 确认结果 / 文件信息 / 导入溯源
// ==========================================

use crate::domain::record::Record;
use crate::domain::types::ImportStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PreviewResult - 预览结果
// ==========================================
// 不落库、不缓存；调用方需把 full_data 原样（或编辑后）回传给确认接口
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub entity_type: String, // 目标实体类型
    pub total_rows: usize,   // 解析出的总行数
    pub preview: Vec<Record>, // 展示子集（full_data 的前缀）
    pub full_data: Vec<Record>, // 全部对齐后记录（与源行一一对应）
}

// ==========================================
// RecordFailure - 单条落库失败
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFailure {
    pub record: Record, // 出错的记录
    pub error: String,  // 失败原因（唯一约束冲突为 "Duplicate entry"）
}

// ==========================================
// ImportOutcome - 确认结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,             // 成功落库条数
    pub errors: Vec<RecordFailure>,  // 失败明细（保持输入顺序）
}

impl ImportOutcome {
    pub fn status(&self) -> ImportStatus {
        ImportStatus::from_counts(self.imported, self.errors.len())
    }
}

// ==========================================
// FileInfo - 上传文件信息（由传输层提供）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub original_name: String,       // 原始文件名
    pub size: u64,                   // 字节数
    #[serde(rename = "type")]
    pub file_type: String,           // 媒体类型或扩展名
    pub uploaded_by: Option<String>, // 上传人
}

// ==========================================
// ImportProvenance - 导入溯源（追加写）
// ==========================================
// 对齐: import_provenance 表
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProvenance {
    pub provenance_id: String,       // 记录 ID（UUID）
    pub original_name: String,       // 原始文件名
    pub file_type: String,           // 媒体类型
    pub size: u64,                   // 字节数
    pub target_entity: String,       // 目标实体
    pub record_count: usize,         // 成功条数
    pub errors: Vec<String>,         // 失败描述（每条为 JSON）
    pub uploaded_by: Option<String>, // 上传人
    pub uploaded_at: DateTime<Utc>,  // 时间
    pub status: ImportStatus,        // 状态
}

impl ImportProvenance {
    /// 根据一次确认结果生成溯源记录
    pub fn from_outcome(
        provenance_id: String,
        entity_type: &str,
        file_info: &FileInfo,
        outcome: &ImportOutcome,
    ) -> Self {
        let errors = outcome
            .errors
            .iter()
            .map(|f| serde_json::to_string(f).unwrap_or_else(|_| f.error.clone()))
            .collect();

        Self {
            provenance_id,
            original_name: file_info.original_name.clone(),
            file_type: file_info.file_type.clone(),
            size: file_info.size,
            target_entity: entity_type.to_string(),
            record_count: outcome.imported,
            errors,
            uploaded_by: file_info.uploaded_by.clone(),
            uploaded_at: Utc::now(),
            status: outcome.status(),
        }
    }
}
