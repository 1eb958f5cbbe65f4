// ==========================================
// 表格数据导入引擎 - 文件解析器实现
// ==========================================
// 职责: 字节流 + 媒体类型 → 有序原始行
// 支持: 分隔文本 (CSV) / 工作簿 (xlsx/xls/xlsb/ods)
// 约束: 只读内存数据，不访问文件系统路径
// ==========================================

use crate::domain::record::{FieldValue, Record};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::debug;

/// ODS 媒体类型
const ODS_MEDIA_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

// ==========================================
// 解析选项
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// 去除值与表头两端空白（默认保留原样）
    pub trim_values: bool,
}

/// 媒体类型是否指向工作簿格式
pub fn is_spreadsheet_media_type(media_type: &str) -> bool {
    let mt = media_type.to_lowercase();
    mt.contains("spreadsheet")
        || mt.contains("excel")
        || mt.contains("officedocument")
        || mt == ODS_MEDIA_TYPE
}

/// 整行为空（所有值为空白，仅用于工作簿）
fn is_blank_row(row: &Record) -> bool {
    row.values().all(|v| v.is_blank())
}

fn clean_label(label: &str, trim: bool) -> String {
    if trim {
        label.trim().to_string()
    } else {
        label.to_string()
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(
        &self,
        bytes: &[u8],
        options: &ParseOptions,
    ) -> ImportResult<Vec<Record>> {
        // 行长度必须与表头一致，否则视为格式错误
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| clean_label(h, options.trim_values))
            .collect();

        // 读取所有行
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row = Record::with_capacity(headers.len());

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    let value = if options.trim_values {
                        value.trim()
                    } else {
                        value
                    };
                    row.insert(header.clone(), FieldValue::Text(value.to_string()));
                }
            }

            // 空行已由 csv reader 跳过；仅含分隔符或空白的行照常保留
            records.push(row);
        }

        debug!(rows = records.len(), columns = headers.len(), "CSV 解析完成");
        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// 单元格 → 记录值（空单元格返回 None，不写入行）
    fn cell_to_value(cell: &Data, trim: bool) -> Option<FieldValue> {
        match cell {
            Data::Empty => None,
            Data::String(s) => Some(FieldValue::Text(clean_label(s, trim))),
            Data::Float(f) => Some(FieldValue::Number(*f)),
            Data::Int(i) => Some(FieldValue::Number(*i as f64)),
            Data::Bool(b) => Some(FieldValue::Bool(*b)),
            Data::DateTime(dt) => Some(
                dt.as_datetime()
                    .map(FieldValue::Date)
                    .unwrap_or_else(|| FieldValue::Number(dt.as_f64())),
            ),
            Data::DateTimeIso(s) => Some(
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .map(FieldValue::Date)
                    .unwrap_or_else(|_| FieldValue::Text(s.clone())),
            ),
            Data::DurationIso(s) => Some(FieldValue::Text(s.clone())),
            Data::Error(e) => Some(FieldValue::Text(e.to_string())),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_to_raw_records(
        &self,
        bytes: &[u8],
        options: &ParseOptions,
    ) -> ImportResult<Vec<Record>> {
        // 按内容自动识别工作簿格式
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 只读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ParseError("工作簿中没有工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| ImportError::ParseError("工作表缺少表头行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| clean_label(&cell.to_string(), options.trim_values))
            .collect();

        // 读取数据行
        let mut records = Vec::new();
        for data_row in rows {
            let mut row = Record::with_capacity(headers.len());

            for (col_idx, cell) in data_row.iter().enumerate() {
                let Some(header) = headers.get(col_idx) else {
                    continue;
                };
                // 无表头的列不产出字段
                if header.is_empty() {
                    continue;
                }
                if let Some(value) = Self::cell_to_value(cell, options.trim_values) {
                    row.insert(header.clone(), value);
                }
            }

            // 跳过完全空白的行
            if is_blank_row(&row) {
                continue;
            }

            records.push(row);
        }

        debug!(sheet = %sheet_name, rows = records.len(), "工作簿解析完成");
        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据媒体类型选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 解析字节流
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - media_type: 声明的媒体类型；工作簿类型走 ExcelParser，其余一律按 CSV 处理
    /// - options: 解析选项
    pub fn parse(
        &self,
        bytes: &[u8],
        media_type: &str,
        options: &ParseOptions,
    ) -> ImportResult<Vec<Record>> {
        if is_spreadsheet_media_type(media_type) {
            ExcelParser.parse_to_raw_records(bytes, options)
        } else {
            CsvParser.parse_to_raw_records(bytes, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_valid_bytes() {
        let csv = "First Name,Last Name,email\nAda,Lovelace,ada@example.com\nAlan,Turing,alan@example.com\n";

        let records = CsvParser
            .parse_to_raw_records(csv.as_bytes(), &ParseOptions::default())
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("First Name"), Some(&FieldValue::from("Ada")));
        assert_eq!(
            records[1].get("email"),
            Some(&FieldValue::from("alan@example.com"))
        );
        // 列顺序与表头一致
        let keys: Vec<&str> = records[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["First Name", "Last Name", "email"]);
    }

    #[test]
    fn test_csv_parser_skips_empty_lines_only() {
        let csv = "name,code\nMath,M1\n\n,\n  ,  \nPhysics,P1\n";

        let records = CsvParser
            .parse_to_raw_records(csv.as_bytes(), &ParseOptions::default())
            .unwrap();

        // 空行跳过，分隔符行与空白行保留
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].get("name"), Some(&FieldValue::from("")));
        assert_eq!(records[2].get("code"), Some(&FieldValue::from("  ")));
        assert_eq!(records[3].get("name"), Some(&FieldValue::from("Physics")));
    }

    #[test]
    fn test_csv_parser_preserves_whitespace_by_default() {
        let csv = "name,code\n  Math  , M1\n";

        let kept = CsvParser
            .parse_to_raw_records(csv.as_bytes(), &ParseOptions::default())
            .unwrap();
        assert_eq!(kept[0].get("name"), Some(&FieldValue::from("  Math  ")));

        let trimmed = CsvParser
            .parse_to_raw_records(csv.as_bytes(), &ParseOptions { trim_values: true })
            .unwrap();
        assert_eq!(trimmed[0].get("name"), Some(&FieldValue::from("Math")));
        assert_eq!(trimmed[0].get("code"), Some(&FieldValue::from("M1")));
    }

    #[test]
    fn test_csv_parser_ragged_row_is_parse_error() {
        let csv = "a,b\n1,2\n3,4,5\n";

        let result = CsvParser.parse_to_raw_records(csv.as_bytes(), &ParseOptions::default());

        assert!(matches!(result, Err(ImportError::ParseError(_))));
    }

    #[test]
    fn test_csv_parser_quoted_fields() {
        let csv = "title,description\n\"Intro, Part 1\",\"He said \"\"hi\"\"\"\n";

        let records = CsvParser
            .parse_to_raw_records(csv.as_bytes(), &ParseOptions::default())
            .unwrap();

        assert_eq!(records[0].get("title"), Some(&FieldValue::from("Intro, Part 1")));
        assert_eq!(
            records[0].get("description"),
            Some(&FieldValue::from("He said \"hi\""))
        );
    }

    #[test]
    fn test_excel_parser_corrupt_workbook_is_parse_error() {
        let result = ExcelParser.parse_to_raw_records(b"not a workbook", &ParseOptions::default());

        assert!(matches!(result, Err(ImportError::ParseError(_))));
    }

    #[test]
    fn test_media_type_detection() {
        assert!(is_spreadsheet_media_type(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
        assert!(is_spreadsheet_media_type("application/vnd.ms-excel"));
        assert!(is_spreadsheet_media_type(
            "application/vnd.oasis.opendocument.spreadsheet"
        ));
        assert!(!is_spreadsheet_media_type("text/csv"));
        assert!(!is_spreadsheet_media_type("application/octet-stream"));
    }

    #[test]
    fn test_universal_parser_defaults_to_csv() {
        let records = UniversalFileParser
            .parse(b"a\n1\n", "application/octet-stream", &ParseOptions::default())
            .unwrap();
        assert_eq!(records.len(), 1);

        let result = UniversalFileParser.parse(
            b"a\n1\n",
            "application/vnd.ms-excel",
            &ParseOptions::default(),
        );
        assert!(matches!(result, Err(ImportError::ParseError(_))));
    }
}
