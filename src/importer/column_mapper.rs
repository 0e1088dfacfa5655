// ==========================================
// 商品目录批量导入系统 - 列映射器
// ==========================================
// 职责: 开放别名表 → 规范字段名解析
// 规则: 别名按序匹配，首个命中生效；
//       必填字段整体缺失时产出一条表级阻断问题
//       （列出全部缺失字段），仅中止该表
// ==========================================

use crate::domain::import::{issue_codes, ValidationIssue};
use crate::importer::normalizer::slugify;
use std::collections::HashMap;

// ==========================================
// 规范字段名
// ==========================================
pub mod fields {
    // ===== 商品表 =====
    pub const BRAND: &str = "brand";
    pub const CATEGORY: &str = "category";
    pub const CATEGORY_PATH: &str = "category_path";
    pub const SERIES: &str = "series";
    pub const NAME: &str = "name";
    pub const SLUG: &str = "slug";
    pub const TITLE: &str = "title";
    pub const TITLE_SECONDARY: &str = "title_secondary";
    pub const STATUS: &str = "status";
    pub const FEATURED: &str = "featured";
    pub const DESCRIPTION: &str = "description";
    pub const FEATURES: &str = "features";

    // ===== 型号表 =====
    pub const PRODUCT: &str = "product";
    pub const CODE: &str = "code";
    pub const NAME_SECONDARY: &str = "name_secondary";
    pub const SKU: &str = "sku";
    pub const DIMENSIONS: &str = "dimensions";
    pub const WEIGHT: &str = "weight";
    pub const PRICE: &str = "price";
    pub const STOCK: &str = "stock";
}

/// 自由规格列前缀（"Spec:<key>"）
const SPEC_PREFIX: &str = "spec:";

// 商品表别名表（含历史拼写与中文表头）
const PRODUCT_ALIASES: &[(&str, &[&str])] = &[
    (fields::BRAND, &["brand", "brand slug", "品牌"]),
    (fields::CATEGORY, &["category", "category slug", "分类", "类目"]),
    (
        fields::CATEGORY_PATH,
        &["category path", "taxonomy path", "taxonomy", "分类路径", "类目路径"],
    ),
    (fields::SERIES, &["series", "series slug", "系列"]),
    (fields::NAME, &["name", "internal name", "内部名称"]),
    (fields::SLUG, &["slug", "public slug", "url slug", "标识"]),
    (fields::TITLE, &["title", "product title", "商品标题", "标题"]),
    (
        fields::TITLE_SECONDARY,
        &["title secondary", "secondary title", "title en", "英文标题"],
    ),
    (fields::STATUS, &["status", "状态"]),
    (fields::FEATURED, &["featured", "is featured", "推荐", "是否推荐"]),
    (fields::DESCRIPTION, &["description", "描述", "详情"]),
    (fields::FEATURES, &["features", "feature bullets", "卖点", "特性"]),
];

// 型号表别名表
const VARIANT_ALIASES: &[(&str, &[&str])] = &[
    (
        fields::PRODUCT,
        &["product", "product slug", "product ref", "商品", "所属商品"],
    ),
    (fields::CODE, &["code", "variant code", "model", "model code", "型号", "编码"]),
    (fields::NAME, &["name", "variant name", "display name", "名称"]),
    (
        fields::NAME_SECONDARY,
        &["name secondary", "secondary name", "name en", "英文名称"],
    ),
    (fields::SKU, &["sku", "stock code", "库存码"]),
    (fields::DIMENSIONS, &["dimensions", "size", "尺寸"]),
    (fields::WEIGHT, &["weight", "重量"]),
    (fields::PRICE, &["price", "list price", "价格", "单价"]),
    (fields::STOCK, &["stock", "stock qty", "quantity", "库存", "库存数量"]),
];

// ==========================================
// SpecColumn - 自由规格列
// ==========================================
#[derive(Debug, Clone)]
pub struct SpecColumn {
    pub header: String, // 源表头（取值用）
    pub key: String,    // 规格键（<key> 的 slug 形式）
}

// ==========================================
// ColumnMap - 解析完成的列映射
// ==========================================
#[derive(Debug, Clone)]
pub struct ColumnMap {
    resolved: HashMap<&'static str, String>, // 规范字段 → 实际表头
    pub spec_columns: Vec<SpecColumn>,
}

impl ColumnMap {
    /// 是否解析到某规范字段
    pub fn has(&self, canonical: &str) -> bool {
        self.resolved.contains_key(canonical)
    }

    /// 取某行在规范字段下的值（TRIM 后非空才返回）
    pub fn value<'a>(&self, row: &'a HashMap<String, String>, canonical: &str) -> Option<&'a str> {
        let header = self.resolved.get(canonical)?;
        let raw = row.get(header)?.trim();
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    }

    /// 取某行在规范字段下的原始值（含空串，报错回显用）
    pub fn raw_value<'a>(&self, row: &'a HashMap<String, String>, canonical: &str) -> &'a str {
        self.resolved
            .get(canonical)
            .and_then(|h| row.get(h))
            .map(|v| v.trim())
            .unwrap_or("")
    }
}

/// 解析商品表表头
///
/// 必填: series、title、category 或 category_path 之一、
///       name 与 slug 至少一项（互相可派生）
pub fn resolve_product_columns(headers: &[String]) -> Result<ColumnMap, ValidationIssue> {
    let map = resolve(headers, PRODUCT_ALIASES, false);

    let mut missing = Vec::new();
    if !map.has(fields::CATEGORY) && !map.has(fields::CATEGORY_PATH) {
        missing.push("category/category_path");
    }
    if !map.has(fields::SERIES) {
        missing.push(fields::SERIES);
    }
    if !map.has(fields::TITLE) {
        missing.push(fields::TITLE);
    }
    if !map.has(fields::NAME) && !map.has(fields::SLUG) {
        missing.push("name/slug");
    }

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(missing_columns_issue(&missing))
    }
}

/// 解析型号表表头
///
/// 必填: product、code
pub fn resolve_variant_columns(headers: &[String]) -> Result<ColumnMap, ValidationIssue> {
    let map = resolve(headers, VARIANT_ALIASES, true);

    let mut missing = Vec::new();
    if !map.has(fields::PRODUCT) {
        missing.push(fields::PRODUCT);
    }
    if !map.has(fields::CODE) {
        missing.push(fields::CODE);
    }

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(missing_columns_issue(&missing))
    }
}

fn resolve(headers: &[String], aliases: &[(&'static str, &[&str])], collect_spec: bool) -> ColumnMap {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let mut resolved = HashMap::new();
    for (canonical, alias_list) in aliases {
        // 别名按序尝试，首个命中生效
        'alias: for alias in *alias_list {
            for (idx, header) in lowered.iter().enumerate() {
                if header == alias {
                    resolved.insert(*canonical, headers[idx].trim().to_string());
                    break 'alias;
                }
            }
        }
    }

    let mut spec_columns = Vec::new();
    if collect_spec {
        for (idx, header) in lowered.iter().enumerate() {
            if let Some(rest) = header.strip_prefix(SPEC_PREFIX) {
                let key = slugify(rest);
                if !key.is_empty() {
                    spec_columns.push(SpecColumn {
                        header: headers[idx].trim().to_string(),
                        key,
                    });
                }
            }
        }
    }

    ColumnMap {
        resolved,
        spec_columns,
    }
}

fn missing_columns_issue(missing: &[&str]) -> ValidationIssue {
    ValidationIssue::sheet_level(
        &missing.join(","),
        issue_codes::MISSING_COLUMNS,
        format!("必填列缺失: {}", missing.join(", ")),
    )
}
