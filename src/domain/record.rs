// ==========================================
// 表格数据导入引擎 - 记录值模型
// ==========================================
// 职责: 原始行 / 对齐后记录的统一容器
// 约束: 键为字符串，值为封闭的几种标量类型
// ==========================================

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 日期输出格式（CSV 导出 / 存储）
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ==========================================
// FieldValue - 单元格值
// ==========================================
// JSON 形式为裸值: 字符串 / 数值 / 布尔 / null
// 字符串仅在按 DATE_FORMAT 重新渲染后与原文完全一致时归为 Date，其余一律为 Text
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
    Empty,
}

impl FieldValue {
    /// 文本值（非文本返回 None）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 是否为空值（Empty 或纯空白文本）
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 渲染为 CSV 单元格文本
    pub fn to_cell_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            FieldValue::Empty => String::new(),
        }
    }
}

/// 严格按 DATE_FORMAT 识别日期文本（往返不变才算）
fn parse_exact_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .ok()
        .filter(|d| d.format(DATE_FORMAT).to_string() == text)
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Date(d) => serializer.serialize_str(&d.format(DATE_FORMAT).to_string()),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Empty => serializer.serialize_unit(),
        }
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(match parse_exact_date(v) {
            Some(d) => FieldValue::Date(d),
            None => FieldValue::Text(v.to_string()),
        })
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(match parse_exact_date(&v) {
            Some(d) => FieldValue::Date(d),
            None => FieldValue::Text(v),
        })
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Empty)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FieldValue, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// 整数值不带小数部分输出
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cell_string())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Date(value)
    }
}

/// 一行记录: 列名/字段名 → 值，保持插入顺序
///
/// 原始行（RawRecord）与对齐后记录（ReconciledRecord）共用此容器
pub type Record = IndexMap<String, FieldValue>;

/// 显式映射: 源列名 → 目标字段名（调用方提供，可不完整、可多对一）
pub type ExplicitMapping = IndexMap<String, String>;

/// 构造记录的便捷函数（测试与导出使用）
pub fn record_from_pairs<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
