// ==========================================
// 商品目录批量导入系统 - 值规范化器
// ==========================================
// 职责: 空值哨兵归一 / 地区化小数解析 /
//       状态令牌回落 / slug 派生 / 编码消歧
// 红线: 解析失败必须产出带原值的错误，
//       禁止静默归零
// ==========================================

use std::collections::{HashMap, HashSet};

/// 空值哨兵词表（命中即视为真空值）
pub const EMPTY_TOKENS: &[&str] = &["-", "--", "n/a", "na", "null", "none", "nil", "无", "空"];

/// 空值归一: TRIM 后为空或命中哨兵词 → None
pub fn normalize_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if EMPTY_TOKENS.contains(&lower.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// 地区化小数解析
///
/// 规则:
/// - 逗号与点同时存在: 最右侧的为小数点，另一个为千分位（丢弃）
/// - 仅有逗号: 逗号即小数点
/// - 仅有点: 标准小数点
///
/// # 返回
/// - Err(()) 表示不可解析（调用方须产出错误，不得归零）
pub fn parse_decimal(raw: &str) -> Result<f64, ()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(());
    }

    let comma = trimmed.rfind(',');
    let dot = trimmed.rfind('.');

    let normalized = match (comma, dot) {
        (Some(c), Some(d)) => {
            // 最右侧为小数点，另一符号为千分位
            let (decimal, thousands) = if c > d { (',', '.') } else { ('.', ',') };
            trimmed
                .chars()
                .filter(|ch| *ch != thousands)
                .map(|ch| if ch == decimal { '.' } else { ch })
                .collect::<String>()
        }
        (Some(_), None) => trimmed.replace(',', "."),
        _ => trimmed.to_string(),
    };

    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(()),
    }
}

/// 整数解析（仅接受十进制整数写法）
pub fn parse_integer(raw: &str) -> Result<i64, ()> {
    raw.trim().parse::<i64>().map_err(|_| ())
}

/// 状态令牌归一
///
/// 空白或未识别令牌一律回落 "active"；
/// 未识别非空令牌属于规范化选择而非错误，
/// 返回 true 表示发生了回落（调用方记 Info 备注）
pub fn normalize_status(raw: Option<&str>) -> (String, bool) {
    let Some(token) = raw else {
        return ("active".to_string(), false);
    };
    let lower = token.trim().to_lowercase();
    match lower.as_str() {
        "" => ("active".to_string(), false),
        "active" | "enabled" | "on" | "1" | "上架" | "启用" => ("active".to_string(), false),
        "inactive" | "disabled" | "off" | "0" | "下架" | "停用" => ("inactive".to_string(), false),
        _ => ("active".to_string(), true),
    }
}

/// 布尔令牌解析（推荐标记等）
pub fn parse_flag(raw: Option<&str>) -> bool {
    match raw {
        None => false,
        Some(token) => matches!(
            token.trim().to_lowercase().as_str(),
            "1" | "y" | "yes" | "true" | "是" | "推荐"
        ),
    }
}

/// 名称派生 slug
///
/// 小写化；字母数字保留，其余折叠为 '-'；首尾去 '-'
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true; // 抑制开头的 '-'
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// 卖点条目拆分（换行或分号分隔）
pub fn split_features(raw: &str) -> Vec<String> {
    raw.split(['\n', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

// ==========================================
// 型号编码消歧
// ==========================================

/// 编码改写记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRewrite {
    pub row: usize,
    pub original: String,
    pub replacement: String,
}

/// 规划同批次内重复编码的改写
///
/// 首次出现保持原值；之后第 n 次出现改写为 "<code>-n"，
/// 改写结果不得与批内任何字面编码或先前改写撞车，
/// 冲突时后缀继续递增直至落在未占用编码上。
/// 仅规划，不修改输入；Reject 策略下调用方将改写
/// 项转为行级错误。
pub fn plan_code_rewrites(codes: &[(usize, String)]) -> Vec<CodeRewrite> {
    // 已占用编码: 全部字面编码 + 已规划的改写结果
    let mut taken: HashSet<String> = codes.iter().map(|(_, c)| c.clone()).collect();
    let mut occurrence: HashMap<&str, usize> = HashMap::new();
    let mut rewrites = Vec::new();

    for (row, code) in codes {
        let count = occurrence.entry(code.as_str()).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }

        let mut suffix = *count;
        let mut replacement = format!("{code}-{suffix}");
        while taken.contains(&replacement) {
            suffix += 1;
            replacement = format!("{code}-{suffix}");
        }
        taken.insert(replacement.clone());
        rewrites.push(CodeRewrite {
            row: *row,
            original: code.clone(),
            replacement,
        });
    }

    rewrites
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty_sentinels() {
        assert_eq!(normalize_empty("  "), None);
        assert_eq!(normalize_empty("-"), None);
        assert_eq!(normalize_empty("N/A"), None);
        assert_eq!(normalize_empty("null"), None);
        assert_eq!(normalize_empty("无"), None);
        assert_eq!(normalize_empty(" value "), Some("value".to_string()));
        // 含连字符的正常值不受哨兵影响
        assert_eq!(normalize_empty("a-b"), Some("a-b".to_string()));
    }

    #[test]
    fn test_parse_decimal_locale_forms() {
        // 三种写法解析为同一数值
        assert_eq!(parse_decimal("1.234,50"), Ok(1234.50));
        assert_eq!(parse_decimal("1234.50"), Ok(1234.50));
        assert_eq!(parse_decimal("1234,50"), Ok(1234.50));
        // 逗号为千分位的美式写法
        assert_eq!(parse_decimal("1,234.50"), Ok(1234.50));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("12x34").is_err());
        assert!(parse_decimal("").is_err());
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Ok(42));
        assert_eq!(parse_integer("-3"), Ok(-3));
        assert!(parse_integer("3,5").is_err());
        assert!(parse_integer("1.234").is_err());
        assert!(parse_integer("x").is_err());
    }

    #[test]
    fn test_normalize_status_defaults() {
        assert_eq!(normalize_status(None), ("active".to_string(), false));
        assert_eq!(normalize_status(Some("inactive")), ("inactive".to_string(), false));
        assert_eq!(normalize_status(Some("下架")), ("inactive".to_string(), false));
        // 未识别令牌回落 active 并标记
        assert_eq!(normalize_status(Some("archived")), ("active".to_string(), true));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("Y")));
        assert!(parse_flag(Some("是")));
        assert!(parse_flag(Some("true")));
        assert!(!parse_flag(Some("no")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Premium Series"), "premium-series");
        assert_eq!(slugify("  A__B  "), "a-b");
        assert_eq!(slugify("Test-Product!"), "test-product");
    }

    #[test]
    fn test_plan_code_rewrites() {
        let codes = vec![
            (1, "X100".to_string()),
            (2, "X100".to_string()),
            (3, "X100".to_string()),
            (4, "Y200".to_string()),
        ];
        let rewrites = plan_code_rewrites(&codes);
        assert_eq!(rewrites.len(), 2);
        assert_eq!(rewrites[0].row, 2);
        assert_eq!(rewrites[0].replacement, "X100-2");
        assert_eq!(rewrites[1].row, 3);
        assert_eq!(rewrites[1].replacement, "X100-3");
    }

    #[test]
    fn test_plan_code_rewrites_skips_taken_literal() {
        // 批内已有字面 "X100-2"，改写须跳到 "-3"
        let codes = vec![
            (1, "X100".to_string()),
            (2, "X100".to_string()),
            (3, "X100-2".to_string()),
        ];
        let rewrites = plan_code_rewrites(&codes);
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].row, 2);
        assert_eq!(rewrites[0].replacement, "X100-3");
    }

    #[test]
    fn test_plan_code_rewrites_final_codes_unique() {
        let codes = vec![
            (1, "X100".to_string()),
            (2, "X100".to_string()),
            (3, "X100".to_string()),
            (4, "X100-2".to_string()),
        ];
        let rewrites = plan_code_rewrites(&codes);

        // 套用改写后所有最终编码互不相同
        let mut finals: Vec<String> = Vec::new();
        for (row, code) in &codes {
            let replaced = rewrites
                .iter()
                .find(|r| r.row == *row)
                .map(|r| r.replacement.clone())
                .unwrap_or_else(|| code.clone());
            finals.push(replaced);
        }
        let unique: HashSet<&String> = finals.iter().collect();
        assert_eq!(unique.len(), finals.len(), "最终编码存在重复: {finals:?}");
    }
}
