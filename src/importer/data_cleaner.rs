// ==========================================
// 表格数据导入引擎 - 数据清洗器实现
// ==========================================
// 职责: 对齐后按调用方提供的转换规则清洗字段值
// 约束: 未提供规则时原样输出（默认不做任何转换）
// ==========================================

use crate::domain::record::{FieldValue, Record};
use crate::importer::importer_trait::DataCleaner as DataCleanerTrait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ==========================================
// 单字段转换规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldTransform {
    Trim,          // 去两端空白
    Lowercase,     // 转小写
    Uppercase,     // 转大写
    EmptyAsAbsent, // 空白值视为缺失（从记录中移除）
}

/// 目标字段 → 依次执行的转换规则
pub type TransformSet = IndexMap<String, Vec<FieldTransform>>;

pub struct DataCleaner;

impl DataCleaner {
    /// 单值转换；返回 None 表示该字段应从记录中移除
    fn apply_one(&self, value: FieldValue, transform: FieldTransform) -> Option<FieldValue> {
        match (transform, value) {
            (FieldTransform::Trim, FieldValue::Text(s)) => Some(FieldValue::Text(s.trim().to_string())),
            (FieldTransform::Lowercase, FieldValue::Text(s)) => {
                Some(FieldValue::Text(s.to_lowercase()))
            }
            (FieldTransform::Uppercase, FieldValue::Text(s)) => {
                Some(FieldValue::Text(s.to_uppercase()))
            }
            (FieldTransform::EmptyAsAbsent, v) if v.is_blank() => None,
            // 非文本值不受文本类规则影响
            (_, v) => Some(v),
        }
    }
}

impl DataCleanerTrait for DataCleaner {
    fn apply_transforms(&self, record: Record, transforms: &TransformSet) -> Record {
        if transforms.is_empty() {
            return record;
        }

        record
            .into_iter()
            .filter_map(|(field, value)| {
                let rules = match transforms.get(&field) {
                    Some(rules) => rules,
                    None => return Some((field, value)),
                };

                let mut current = Some(value);
                for rule in rules {
                    current = current.and_then(|v| self.apply_one(v, *rule));
                }
                current.map(|v| (field, v))
            })
            .collect()
    }
}
