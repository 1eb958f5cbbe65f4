// ==========================================
// 表格数据导入引擎 - 近似匹配器
// ==========================================
// 职责: 在候选列名中找出与目标名编辑距离最小者
// 算法: Levenshtein（单字符插入/删除/替换，单位代价）
// ==========================================

use strsim::levenshtein;

/// 默认距离阈值
pub const DEFAULT_MATCH_THRESHOLD: usize = 3;

/// 目标名归一化: 小写 + 去除所有非字母数字字符
fn normalize_target(target: &str) -> String {
    target
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// 候选名归一化: 仅小写
///
/// 注意: 与目标名的归一化不对称（候选名保留空格/标点），
/// 现有导入文件的匹配结果依赖此行为，修改前需评估兼容性
fn normalize_candidate(candidate: &str) -> String {
    candidate.to_lowercase()
}

/// 在候选集中查找最佳匹配
///
/// # 参数
/// - target: 目标名（如字段名 "firstName"）
/// - candidates: 候选名（如文件列名 "First Name"），按调用方给定顺序遍历
/// - threshold: 最大允许距离（含）
///
/// # 返回
/// - Some(候选原文): 归一化后完全相等者立即返回；否则返回距离最小且 ≤ threshold 者，
///   距离相同时先出现者优先
/// - None: 无候选在阈值内
pub fn find_best_match<'a, I>(target: &str, candidates: I, threshold: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized_target = normalize_target(target);

    let mut best_match = None;
    let mut min_distance = usize::MAX;

    for candidate in candidates {
        let normalized_candidate = normalize_candidate(candidate);

        if normalized_target == normalized_candidate {
            return Some(candidate);
        }

        let distance = levenshtein(&normalized_target, &normalized_candidate);
        if distance < min_distance && distance <= threshold {
            min_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_matches_spaced_header() {
        let candidates = ["First Name", "Last Name"];
        assert_eq!(
            find_best_match("firstName", candidates, 3),
            Some("First Name")
        );
    }

    #[test]
    fn test_no_match_beyond_threshold() {
        assert_eq!(find_best_match("firstName", ["zzzzz"], 3), None);
    }

    #[test]
    fn test_exact_match_short_circuits() {
        // "emai" 距离 1 在前，但 "EMAIL" 归一化后完全相等
        let candidates = ["emai", "EMAIL"];
        assert_eq!(find_best_match("email", candidates, 3), Some("EMAIL"));
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let candidates = ["nama", "namo"];
        assert_eq!(find_best_match("name", candidates, 3), Some("nama"));
    }

    #[test]
    fn test_target_is_stripped_but_candidate_is_not() {
        // 目标 "e-mail" → "email"；候选 "e-mail" 仅小写 → 距离 1
        assert_eq!(find_best_match("e-mail", ["e-mail"], 0), None);
        assert_eq!(find_best_match("e-mail", ["e-mail"], 1), Some("e-mail"));
        // 候选无标点时归一化后完全相等
        assert_eq!(find_best_match("E-Mail", ["email"], 0), Some("email"));
    }

    #[test]
    fn test_threshold_zero_requires_exact() {
        assert_eq!(find_best_match("phone", ["phones"], 0), None);
        assert_eq!(find_best_match("phone", ["Phone"], 0), Some("Phone"));
    }

    #[test]
    fn test_empty_candidates() {
        let candidates: Vec<&str> = Vec::new();
        assert_eq!(find_best_match("email", candidates, 3), None);
    }
}
