// ==========================================
// 商品目录批量导入系统 - 目录领域模型
// ==========================================
// 层级: 品牌 → 分类树 → 系列 → 商品 → 型号
// 用途: 导入层写入，查询层只读
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Brand - 品牌主数据
// ==========================================
// 唯一键: slug（全局）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub brand_id: String, // UUID
    pub slug: String,     // 全局唯一标识
    pub name: String,     // 展示名称
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Category - 分类节点（树形）
// ==========================================
// 唯一键: (parent_id, slug) —— 同父节点下 slug 唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<String>, // None = 根节点
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Series - 产品系列
// ==========================================
// 唯一键: (category_id, slug) —— 系列 slug 在所属分类内唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub series_id: String,
    pub slug: String,
    pub name: String,
    pub category_id: String, // 绑定分类（商品分类需等于此分类或其后代）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Product - 商品主数据
// ==========================================
// 唯一键: slug（全局，作为对外引用键）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub slug: String,                  // 对外 slug（URL 级）
    pub name: String,                  // 内部名称
    pub title: String,                 // 主语言标题
    pub title_secondary: Option<String>, // 次语言标题
    pub brand_id: Option<String>,      // 品牌可空
    pub series_id: String,
    pub category_id: String,           // 商品所属分类（系列分类的自身或后代）
    pub status: String,                // active / inactive
    pub featured: bool,
    pub description: Option<String>,
    pub features: Vec<String>,         // 卖点条目
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Variant - 具体型号
// ==========================================
// 唯一键: code（全局唯一，契约中唯一的全局键）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: String,
    pub code: String, // 型号编码（全局唯一）
    pub product_id: String,
    pub name: Option<String>,           // 展示名称（缺省回落商品标题）
    pub name_secondary: Option<String>, // 次语言名称
    pub sku: Option<String>,            // 库存码
    pub dimensions: Option<String>,     // 尺寸串
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub stock_qty: Option<i64>,
    pub specs: BTreeMap<String, String>, // 自由规格项（Spec:<key> 列）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ProductRow - 已接受商品行（快照成员）
// ==========================================
// 用途: 校验输出 → 快照 → 提交输入
// 约束: 仅含规范化后的值，不含数据库 ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRow {
    pub row_number: usize,
    pub slug: String,
    pub name: String,
    pub title: String,
    pub title_secondary: Option<String>,
    pub brand_slug: Option<String>,
    // 分类链（根 → 叶，slug 序列）；末位即商品分类
    pub category_chain: Vec<String>,
    pub series_slug: String,
    pub status: String,
    pub featured: bool,
    pub description: Option<String>,
    pub features: Vec<String>,
}

impl ProductRow {
    /// 商品直属分类 slug（分类链末位）
    pub fn category_slug(&self) -> &str {
        self.category_chain
            .last()
            .map(|s| s.as_str())
            .unwrap_or_default()
    }
}

// ==========================================
// VariantRow - 已接受型号行（快照成员）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRow {
    pub row_number: usize,
    pub product_slug: String,
    pub code: String,
    // 编码被改写消歧时保留原值（NormalizationNote 另有记录）
    pub original_code: Option<String>,
    pub name: Option<String>,
    pub name_secondary: Option<String>,
    pub sku: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<f64>,
    pub price: Option<f64>,
    pub stock_qty: Option<i64>,
    pub specs: BTreeMap<String, String>,
}
