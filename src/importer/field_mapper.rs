// ==========================================
// 表格数据导入引擎 - 字段映射器（列对齐）
// ==========================================
// 职责: 原始行 → 目标字段记录
// 规则: 每个目标字段独立按优先级解析
//   1. 显式映射  2. 同名列（不做归一化）  3. 近似匹配
// 未解析的字段不写入输出（缺失 ≠ 空值）
// ==========================================

use crate::domain::record::{ExplicitMapping, Record};
use crate::importer::fuzzy_matcher::{find_best_match, DEFAULT_MATCH_THRESHOLD};
use crate::importer::importer_trait::FieldMapper as FieldMapperTrait;

pub struct FieldMapper {
    threshold: usize,
}

impl FieldMapper {
    /// 创建映射器
    ///
    /// # 参数
    /// - threshold: 近似匹配的最大编辑距离
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// 显式映射: 第一个指向该目标字段、且源列存在于本行的映射项
    fn explicit_source<'m>(
        row: &Record,
        target: &str,
        mapping: &'m ExplicitMapping,
    ) -> Option<&'m str> {
        mapping
            .iter()
            .filter(|(_, mapped_target)| mapped_target.as_str() == target)
            .map(|(source, _)| source.as_str())
            .find(|source| row.contains_key(*source))
    }

    /// 解析单个目标字段对应的源列名
    fn resolve_source<'r>(
        &self,
        row: &'r Record,
        target: &str,
        mapping: &ExplicitMapping,
    ) -> Option<&'r str> {
        // 1. 显式映射
        if let Some(source) = Self::explicit_source(row, target, mapping) {
            return row.get_key_value(source).map(|(k, _)| k.as_str());
        }

        // 2. 同名列
        if let Some((key, _)) = row.get_key_value(target) {
            return Some(key.as_str());
        }

        // 3. 近似匹配（候选为本行全部列名，按列顺序）
        find_best_match(target, row.keys().map(|k| k.as_str()), self.threshold)
    }
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl FieldMapperTrait for FieldMapper {
    fn reconcile(
        &self,
        row: &Record,
        target_fields: &[String],
        mapping: &ExplicitMapping,
    ) -> Record {
        let mut out = Record::with_capacity(target_fields.len());

        for target in target_fields {
            if let Some(source) = self.resolve_source(row, target, mapping) {
                if let Some(value) = row.get(source) {
                    out.insert(target.clone(), value.clone());
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{record_from_pairs, FieldValue};

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fuzzy_headers_resolve() {
        let row = record_from_pairs([
            ("First Name", "Ada"),
            ("Last Name", "Lovelace"),
            ("Email", "ada@example.com"),
        ]);

        let out = FieldMapper::default().reconcile(
            &row,
            &fields(&["firstName", "lastName", "email"]),
            &ExplicitMapping::new(),
        );

        assert_eq!(out.get("firstName"), Some(&FieldValue::from("Ada")));
        assert_eq!(out.get("lastName"), Some(&FieldValue::from("Lovelace")));
        assert_eq!(out.get("email"), Some(&FieldValue::from("ada@example.com")));
    }

    #[test]
    fn test_exact_beats_approximate() {
        let row = record_from_pairs([("E-Mail", "fuzzy@example.com"), ("email", "exact@example.com")]);

        let out = FieldMapper::default().reconcile(&row, &fields(&["email"]), &ExplicitMapping::new());

        assert_eq!(out.get("email"), Some(&FieldValue::from("exact@example.com")));
    }

    #[test]
    fn test_explicit_mapping_beats_exact() {
        let row = record_from_pairs([("email", "exact@example.com"), ("Contact XYZ", "mapped@example.com")]);
        let mut mapping = ExplicitMapping::new();
        mapping.insert("Contact XYZ".to_string(), "email".to_string());

        let out = FieldMapper::default().reconcile(&row, &fields(&["email"]), &mapping);

        assert_eq!(out.get("email"), Some(&FieldValue::from("mapped@example.com")));
    }

    #[test]
    fn test_explicit_mapping_absent_column_falls_through() {
        let row = record_from_pairs([("email", "exact@example.com")]);
        let mut mapping = ExplicitMapping::new();
        mapping.insert("Not In File".to_string(), "email".to_string());

        let out = FieldMapper::default().reconcile(&row, &fields(&["email"]), &mapping);

        assert_eq!(out.get("email"), Some(&FieldValue::from("exact@example.com")));
    }

    #[test]
    fn test_explicit_mapping_uses_first_present_source() {
        let row = record_from_pairs([("Mail 2", "second@example.com")]);
        let mut mapping = ExplicitMapping::new();
        mapping.insert("Mail 1".to_string(), "email".to_string());
        mapping.insert("Mail 2".to_string(), "email".to_string());

        let out = FieldMapper::default().reconcile(&row, &fields(&["email"]), &mapping);

        assert_eq!(out.get("email"), Some(&FieldValue::from("second@example.com")));
    }

    #[test]
    fn test_unresolved_field_is_omitted() {
        let row = record_from_pairs([("zzzzzzzz", "x")]);

        let out = FieldMapper::default().reconcile(
            &row,
            &fields(&["firstName", "email"]),
            &ExplicitMapping::new(),
        );

        assert!(out.is_empty());
        assert!(!out.contains_key("email"));
    }

    #[test]
    fn test_same_source_fans_out() {
        // 同一源列同时满足两个目标字段（一个显式映射、一个同名），均取同值
        let row = record_from_pairs([("name", "Algebra")]);
        let mut mapping = ExplicitMapping::new();
        mapping.insert("name".to_string(), "title".to_string());

        let out = FieldMapper::default().reconcile(&row, &fields(&["title", "name"]), &mapping);

        assert_eq!(out.get("title"), Some(&FieldValue::from("Algebra")));
        assert_eq!(out.get("name"), Some(&FieldValue::from("Algebra")));
    }

    #[test]
    fn test_values_copied_verbatim() {
        let row = record_from_pairs([("code", FieldValue::from("  M1 ")), ("credits", FieldValue::Number(4.0))]);

        let out = FieldMapper::default().reconcile(&row, &fields(&["code", "credits"]), &ExplicitMapping::new());

        assert_eq!(out.get("code"), Some(&FieldValue::from("  M1 ")));
        assert_eq!(out.get("credits"), Some(&FieldValue::Number(4.0)));
    }

    #[test]
    fn test_threshold_is_respected() {
        let row = record_from_pairs([("Phone Number", "555")]);

        let strict = FieldMapper::new(0).reconcile(&row, &fields(&["phone"]), &ExplicitMapping::new());
        assert!(strict.is_empty());

        let loose = FieldMapper::new(10).reconcile(&row, &fields(&["phone"]), &ExplicitMapping::new());
        assert_eq!(loose.get("phone"), Some(&FieldValue::from("555")));
    }
}
