// ==========================================
// 表格数据导入引擎 - 导出序列化
// ==========================================
// 职责: 持久化记录 → CSV 文本（带表头）
// 列集: 取第一条记录的键（排除内部字段），后续记录按此列集输出
// ==========================================

use crate::domain::record::Record;
use crate::importer::error::{ImportError, ImportResult};
use tracing::info;

/// 导出时排除的内部字段
pub const EXPORT_EXCLUDED_FIELDS: [&str; 3] = ["id", "_id", "__v"];

/// 导出记录为 CSV
///
/// # 返回
/// - 空输入返回空字符串（无表头）
/// - 后续记录缺少的列输出为空单元格，多出的键不输出
pub fn export_records(records: &[Record]) -> ImportResult<String> {
    let first = match records.first() {
        Some(first) => first,
        None => return Ok(String::new()),
    };

    let columns: Vec<&str> = first
        .keys()
        .map(|k| k.as_str())
        .filter(|k| !EXPORT_EXCLUDED_FIELDS.contains(k))
        .collect();

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                record
                    .get(*column)
                    .map(|v| v.to_cell_string())
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Serialization(e.to_string()))?;
    let output =
        String::from_utf8(bytes).map_err(|e| ImportError::Serialization(e.to_string()))?;

    info!(count = records.len(), columns = columns.len(), "导出 CSV 完成");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{record_from_pairs, FieldValue};

    #[test]
    fn test_empty_input_is_empty_string() {
        assert_eq!(export_records(&[]).unwrap(), "");
    }

    #[test]
    fn test_internal_fields_excluded() {
        let records = vec![record_from_pairs([
            ("id", FieldValue::from("abc")),
            ("_id", FieldValue::from("x")),
            ("__v", FieldValue::Number(0.0)),
            ("title", FieldValue::from("Algebra")),
            ("credits", FieldValue::Number(3.0)),
        ])];

        let csv = export_records(&records).unwrap();

        assert_eq!(csv, "title,credits\nAlgebra,3\n");
    }

    #[test]
    fn test_columns_follow_first_record() {
        let records = vec![
            record_from_pairs([("title", "A"), ("code", "M1")]),
            record_from_pairs([("title", "B"), ("extra", "dropped")]),
        ];

        let csv = export_records(&records).unwrap();

        assert_eq!(csv, "title,code\nA,M1\nB,\n");
    }

    #[test]
    fn test_values_are_quoted_when_needed() {
        let records = vec![record_from_pairs([("description", "Intro, part 1")])];

        let csv = export_records(&records).unwrap();

        assert_eq!(csv, "description\n\"Intro, part 1\"\n");
    }
}
