// ==========================================
// 表格数据导入引擎 - 领域类型定义
// ==========================================
// 职责: 字段类型、导入状态等封闭枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段类型 (Field Kind)
// ==========================================
// 存储层按此类型对记录值做转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,   // 文本
    Number, // 数值
    Bool,   // 布尔
    Date,   // 日期时间
}

impl FieldKind {
    /// SQLite 列类型
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Number => "REAL",
            FieldKind::Bool => "INTEGER",
            FieldKind::Date => "TEXT",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Date => write!(f, "date"),
        }
    }
}

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// 序列化格式: 小写 (与 import_provenance.status 列一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,   // 待确认
    Confirmed, // 已确认（含部分成功）
    Failed,    // 全部失败
}

impl ImportStatus {
    /// 根据确认结果判定批次状态
    ///
    /// 仅当 0 条成功且至少 1 条失败时为 Failed，其余一律 Confirmed
    pub fn from_counts(imported: usize, failed: usize) -> Self {
        if imported == 0 && failed > 0 {
            ImportStatus::Failed
        } else {
            ImportStatus::Confirmed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Confirmed => "confirmed",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "confirmed" => ImportStatus::Confirmed,
            "failed" => ImportStatus::Failed,
            _ => ImportStatus::Pending,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_failed_only_when_nothing_imported() {
        assert_eq!(ImportStatus::from_counts(0, 3), ImportStatus::Failed);
        assert_eq!(ImportStatus::from_counts(1, 3), ImportStatus::Confirmed);
        assert_eq!(ImportStatus::from_counts(0, 0), ImportStatus::Confirmed);
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [ImportStatus::Pending, ImportStatus::Confirmed, ImportStatus::Failed] {
            assert_eq!(ImportStatus::parse(status.as_str()), status);
        }
    }
}
