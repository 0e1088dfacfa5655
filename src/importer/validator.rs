// ==========================================
// 商品目录批量导入系统 - 行级校验器
// ==========================================
// 职责: 规范化 + 引用解析 + 行接受判定 +
//       候选实体收集 + 编码消歧
// 红线: 行进入接受集 ⇔ 该行无 Error 级问题；
//       宽容模式下未知品牌/分类/系列转为候选，
//       未知商品引用在两种模式下均为错误
// ==========================================

use crate::config::ImportOptions;
use crate::domain::catalog::{ProductRow, VariantRow};
use crate::domain::import::{issue_codes, Candidate, NormalizationNote, ValidationIssue};
use crate::domain::types::{
    CategoryMatch, DuplicateCodePolicy, EntityKind, IssueSeverity, ReferenceMode, ValidationStatus,
};
use crate::importer::column_mapper::{
    fields, resolve_product_columns, resolve_variant_columns, ColumnMap,
};
use crate::importer::loader::RawSheet;
use crate::importer::normalizer::{
    normalize_empty, normalize_status, parse_decimal, parse_flag, parse_integer,
    plan_code_rewrites, slugify, split_features,
};
use crate::importer::taxonomy::{
    check_series_category, parse_path, resolve_flat, resolve_path, ChainLink, ResolvedTaxonomy,
};
use crate::repository::catalog_repo::CatalogLookup;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// slug / 编码长度上限
pub const MAX_KEY_LEN: usize = 120;
/// 标题 / 名称长度上限
pub const MAX_TEXT_LEN: usize = 255;

// ==========================================
// ValidationOutcome - 单趟校验输出
// ==========================================
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub products: Vec<ProductRow>,
    pub variants: Vec<VariantRow>,
    pub issues: Vec<ValidationIssue>,
    pub candidates: Vec<Candidate>,
    pub notes: Vec<NormalizationNote>,
    pub total_rows: usize,
}

impl ValidationOutcome {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    pub fn status(&self) -> ValidationStatus {
        if self.error_count() > 0 {
            ValidationStatus::Failed
        } else if self.warning_count() > 0 {
            ValidationStatus::PassedWithWarnings
        } else {
            ValidationStatus::Passed
        }
    }
}

// ==========================================
// CandidateCollector - 候选实体收集器
// ==========================================
// 去重键: (kind, parent_scope, slug)；重复出现仅追加行号
#[derive(Debug, Default)]
struct CandidateCollector {
    entries: HashMap<(EntityKind, Option<String>, String), Candidate>,
}

impl CandidateCollector {
    fn record(
        &mut self,
        kind: EntityKind,
        slug: &str,
        name: &str,
        parent_scope: Option<&str>,
        row: usize,
    ) {
        let key = (
            kind,
            parent_scope.map(|s| s.to_string()),
            slug.to_string(),
        );
        let entry = self.entries.entry(key).or_insert_with(|| Candidate {
            kind,
            slug: slug.to_string(),
            name: name.to_string(),
            parent_scope: parent_scope.map(|s| s.to_string()),
            rows: Vec::new(),
        });
        entry.rows.push(row);
    }

    /// 按 (kind, parent_scope, slug) 排序输出（确定性）
    fn into_sorted(self) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self.entries.into_values().collect();
        for candidate in &mut out {
            candidate.rows.sort_unstable();
            candidate.rows.dedup();
        }
        out.sort_by(|a, b| {
            (a.kind.as_str(), a.parent_scope.as_deref(), a.slug.as_str()).cmp(&(
                b.kind.as_str(),
                b.parent_scope.as_deref(),
                b.slug.as_str(),
            ))
        });
        out
    }
}

// ==========================================
// RowValidator - 行级校验器
// ==========================================
pub struct RowValidator<'a> {
    lookup: &'a CatalogLookup,
    options: &'a ImportOptions,
}

impl<'a> RowValidator<'a> {
    pub fn new(lookup: &'a CatalogLookup, options: &'a ImportOptions) -> Self {
        Self { lookup, options }
    }

    /// 校验商品表与型号表
    ///
    /// 传入的表级问题（解码备注等）并入输出
    pub fn validate(
        &self,
        product_sheet: Option<&RawSheet>,
        variant_sheet: Option<&RawSheet>,
        carried_issues: Vec<ValidationIssue>,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            issues: carried_issues,
            ..Default::default()
        };
        let mut collector = CandidateCollector::default();

        if let Some(sheet) = product_sheet {
            self.validate_product_sheet(sheet, &mut outcome, &mut collector);
        }
        if let Some(sheet) = variant_sheet {
            self.validate_variant_sheet(sheet, &mut outcome, &mut collector);
        }

        outcome.candidates = collector.into_sorted();
        debug!(
            products = outcome.products.len(),
            variants = outcome.variants.len(),
            errors = outcome.error_count(),
            warnings = outcome.warning_count(),
            candidates = outcome.candidates.len(),
            "行级校验完成"
        );
        outcome
    }

    // ===== 商品表 =====
    fn validate_product_sheet(
        &self,
        sheet: &RawSheet,
        outcome: &mut ValidationOutcome,
        collector: &mut CandidateCollector,
    ) {
        let columns = match resolve_product_columns(&sheet.headers) {
            Ok(map) => map,
            Err(issue) => {
                // 必填列缺失仅中止该表
                outcome.issues.push(issue);
                return;
            }
        };

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_number = idx + 2; // 首行为表头
            outcome.total_rows += 1;
            self.validate_product_row(row_number, row, &columns, outcome, collector);
        }
    }

    fn validate_product_row(
        &self,
        row_number: usize,
        row: &HashMap<String, String>,
        columns: &ColumnMap,
        outcome: &mut ValidationOutcome,
        collector: &mut CandidateCollector,
    ) {
        let mut row_issues: Vec<ValidationIssue> = Vec::new();

        // --- 标题（必填） ---
        let title = match columns.value(row, fields::TITLE) {
            Some(v) => v.to_string(),
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::TITLE,
                    "",
                    issue_codes::MISSING_REQUIRED,
                    "商品标题不能为空".to_string(),
                ));
                String::new()
            }
        };
        if title.chars().count() > MAX_TEXT_LEN {
            row_issues.push(ValidationIssue::row_error(
                row_number,
                fields::TITLE,
                &title,
                issue_codes::LENGTH_EXCEEDED,
                format!("商品标题超过 {MAX_TEXT_LEN} 字符上限"),
            ));
        }

        // --- 名称 / slug（互相可派生） ---
        let name_raw = columns.value(row, fields::NAME).map(|v| v.to_string());
        let slug_raw = columns.value(row, fields::SLUG).map(|v| v.to_string());
        let slug = slug_raw
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .or_else(|| name_raw.as_deref().map(slugify).filter(|s| !s.is_empty()))
            .or_else(|| Some(slugify(&title)).filter(|s| !s.is_empty()));
        let slug = match slug {
            Some(s) => s,
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::SLUG,
                    columns.raw_value(row, fields::SLUG),
                    issue_codes::MISSING_REQUIRED,
                    "无法从 name/slug/title 派生商品标识".to_string(),
                ));
                String::new()
            }
        };
        if slug.chars().count() > MAX_KEY_LEN {
            row_issues.push(ValidationIssue::row_error(
                row_number,
                fields::SLUG,
                &slug,
                issue_codes::LENGTH_EXCEEDED,
                format!("商品标识超过 {MAX_KEY_LEN} 字符上限"),
            ));
        }
        let name = name_raw.unwrap_or_else(|| title.clone());

        // --- 品牌（可空；未知时按模式分流） ---
        let brand_slug = match columns.value(row, fields::BRAND) {
            None => None,
            Some(raw) => {
                let bslug = slugify(raw);
                if self.lookup.brand_id(&bslug).is_none() {
                    match self.options.mode {
                        ReferenceMode::Strict => {
                            row_issues.push(ValidationIssue::row_error(
                                row_number,
                                fields::BRAND,
                                raw,
                                issue_codes::UNKNOWN_BRAND,
                                format!("未知品牌: {raw}"),
                            ));
                        }
                        ReferenceMode::Permissive => {
                            collector.record(EntityKind::Brand, &bslug, raw, None, row_number);
                        }
                    }
                }
                Some(bslug)
            }
        };

        // --- 分类（必填；层级语义由调用方开关决定） ---
        let category_raw = columns
            .value(row, fields::CATEGORY_PATH)
            .or_else(|| columns.value(row, fields::CATEGORY));
        let taxonomy = match category_raw {
            Some(raw) => {
                let resolved = if self.options.treat_delimiter_as_hierarchy {
                    resolve_path(
                        &parse_path(raw, self.options.taxonomy_delimiter),
                        self.lookup,
                    )
                } else {
                    resolve_flat(raw, self.lookup)
                };
                if resolved.chain.is_empty() {
                    row_issues.push(ValidationIssue::row_error(
                        row_number,
                        fields::CATEGORY,
                        raw,
                        issue_codes::MISSING_REQUIRED,
                        "分类引用解析后为空".to_string(),
                    ));
                }
                for link in resolved.pending() {
                    if let ChainLink::Pending {
                        slug,
                        name,
                        parent_slug,
                    } = link
                    {
                        match self.options.mode {
                            ReferenceMode::Strict => {
                                row_issues.push(ValidationIssue::row_error(
                                    row_number,
                                    fields::CATEGORY,
                                    raw,
                                    issue_codes::UNKNOWN_CATEGORY,
                                    format!("未知分类: {name}"),
                                ));
                            }
                            ReferenceMode::Permissive => {
                                collector.record(
                                    EntityKind::Category,
                                    slug,
                                    name,
                                    parent_slug.as_deref(),
                                    row_number,
                                );
                            }
                        }
                    }
                }
                resolved
            }
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::CATEGORY,
                    "",
                    issue_codes::MISSING_REQUIRED,
                    "商品分类不能为空".to_string(),
                ));
                ResolvedTaxonomy::default()
            }
        };

        // --- 系列（必填；分类一致性按祖先放宽） ---
        let series_slug = match columns.value(row, fields::SERIES) {
            Some(raw) => {
                let sslug = slugify(raw);
                match self.lookup.series_by_slug(&sslug) {
                    Some(node) => {
                        if self.lookup.series_slug_ambiguous(&sslug) {
                            let resolved_category = self
                                .lookup
                                .category(&node.category_id)
                                .map(|c| c.slug.clone())
                                .unwrap_or_else(|| node.category_id.clone());
                            row_issues.push(ValidationIssue {
                                row: Some(row_number),
                                column: fields::SERIES.to_string(),
                                raw_value: raw.to_string(),
                                severity: IssueSeverity::Warning,
                                code: issue_codes::AMBIGUOUS_SERIES.to_string(),
                                message: format!(
                                    "系列标识 {sslug} 在多个分类下存在，按创建序解析为分类 {resolved_category} 下的系列"
                                ),
                                expected: None,
                            });
                        }
                        if check_series_category(&node.category_id, &taxonomy.chain)
                            == CategoryMatch::Mismatch
                        {
                            let series_category = self
                                .lookup
                                .category(&node.category_id)
                                .map(|c| c.slug.clone())
                                .unwrap_or_else(|| node.category_id.clone());
                            let product_category =
                                taxonomy.leaf_slug().unwrap_or_default().to_string();
                            row_issues.push(
                                ValidationIssue::row_error(
                                    row_number,
                                    fields::SERIES,
                                    raw,
                                    issue_codes::CATEGORY_MISMATCH,
                                    format!(
                                        "系列 {raw} 属于分类 {series_category}，与商品分类 {product_category} 不一致（也非其祖先）"
                                    ),
                                )
                                .with_expected(&series_category),
                            );
                        }
                    }
                    None => match self.options.mode {
                        ReferenceMode::Strict => {
                            row_issues.push(ValidationIssue::row_error(
                                row_number,
                                fields::SERIES,
                                raw,
                                issue_codes::UNKNOWN_SERIES,
                                format!("未知系列: {raw}"),
                            ));
                        }
                        ReferenceMode::Permissive => {
                            collector.record(
                                EntityKind::Series,
                                &sslug,
                                raw,
                                taxonomy.leaf_slug(),
                                row_number,
                            );
                        }
                    },
                }
                sslug
            }
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::SERIES,
                    "",
                    issue_codes::MISSING_REQUIRED,
                    "商品系列不能为空".to_string(),
                ));
                String::new()
            }
        };

        // --- 状态（未识别令牌回落 active，记备注） ---
        let status_raw = columns.value(row, fields::STATUS);
        let (status, defaulted) = normalize_status(status_raw);
        if defaulted {
            outcome.notes.push(NormalizationNote {
                row: Some(row_number),
                column: fields::STATUS.to_string(),
                original: status_raw.unwrap_or_default().to_string(),
                replacement: status.clone(),
                reason: issue_codes::STATUS_DEFAULTED.to_string(),
            });
        }

        let featured = parse_flag(columns.value(row, fields::FEATURED));
        let title_secondary =
            columns.value(row, fields::TITLE_SECONDARY).and_then(normalize_empty);
        let description = columns.value(row, fields::DESCRIPTION).and_then(normalize_empty);
        let features = columns
            .value(row, fields::FEATURES)
            .map(split_features)
            .unwrap_or_default();

        let accepted = !row_issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error);
        outcome.issues.append(&mut row_issues);

        if accepted {
            outcome.products.push(ProductRow {
                row_number,
                slug,
                name,
                title,
                title_secondary,
                brand_slug,
                category_chain: taxonomy.slug_chain(),
                series_slug,
                status,
                featured,
                description,
                features,
            });
        }
    }

    // ===== 型号表 =====
    fn validate_variant_sheet(
        &self,
        sheet: &RawSheet,
        outcome: &mut ValidationOutcome,
        _collector: &mut CandidateCollector,
    ) {
        let columns = match resolve_variant_columns(&sheet.headers) {
            Ok(map) => map,
            Err(issue) => {
                outcome.issues.push(issue);
                return;
            }
        };

        // 本批已接受商品: slug → 标题（型号名称回落用）
        // 先于行循环固化，行处理期间不再引用商品集
        let batch_titles: HashMap<String, String> = outcome
            .products
            .iter()
            .map(|p| (p.slug.clone(), p.title.clone()))
            .collect();

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_number = idx + 2;
            outcome.total_rows += 1;
            self.validate_variant_row(row_number, row, &columns, &batch_titles, outcome);
        }

        self.disambiguate_codes(outcome);
    }

    fn validate_variant_row(
        &self,
        row_number: usize,
        row: &HashMap<String, String>,
        columns: &ColumnMap,
        batch_titles: &HashMap<String, String>,
        outcome: &mut ValidationOutcome,
    ) {
        let mut row_issues: Vec<ValidationIssue> = Vec::new();

        // --- 商品引用（必填；未知引用两种模式均为错误） ---
        let (product_slug, product_title) = match columns.value(row, fields::PRODUCT) {
            Some(raw) => {
                let pslug = slugify(raw);
                let title = batch_titles
                    .get(pslug.as_str())
                    .cloned()
                    .or_else(|| self.lookup.product(&pslug).map(|p| p.title.clone()));
                if title.is_none() {
                    row_issues.push(ValidationIssue::row_error(
                        row_number,
                        fields::PRODUCT,
                        raw,
                        issue_codes::UNKNOWN_PRODUCT,
                        format!("未知商品引用: {raw}（不在本批商品表中，库中也不存在）"),
                    ));
                }
                (pslug, title)
            }
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::PRODUCT,
                    "",
                    issue_codes::MISSING_REQUIRED,
                    "型号所属商品不能为空".to_string(),
                ));
                (String::new(), None)
            }
        };

        // --- 编码（必填，保留原大小写） ---
        let code = match columns.value(row, fields::CODE) {
            Some(raw) => raw.to_string(),
            None => {
                row_issues.push(ValidationIssue::row_error(
                    row_number,
                    fields::CODE,
                    "",
                    issue_codes::MISSING_REQUIRED,
                    "型号编码不能为空".to_string(),
                ));
                String::new()
            }
        };
        if code.chars().count() > MAX_KEY_LEN {
            row_issues.push(ValidationIssue::row_error(
                row_number,
                fields::CODE,
                &code,
                issue_codes::LENGTH_EXCEEDED,
                format!("型号编码超过 {MAX_KEY_LEN} 字符上限"),
            ));
        }

        // --- 数值字段（解析失败必须报错回显原值） ---
        let weight = self.parse_decimal_field(row_number, row, columns, fields::WEIGHT, &mut row_issues);
        let price = self.parse_decimal_field(row_number, row, columns, fields::PRICE, &mut row_issues);
        let stock_qty = match columns.value(row, fields::STOCK) {
            None => None,
            Some(raw) => match parse_integer(raw) {
                Ok(v) => Some(v),
                Err(()) => {
                    row_issues.push(
                        ValidationIssue::row_error(
                            row_number,
                            fields::STOCK,
                            raw,
                            issue_codes::INVALID_INTEGER,
                            format!("库存数量不是合法整数: {raw}"),
                        )
                        .with_expected("42"),
                    );
                    None
                }
            },
        };

        // --- 名称（缺省回落商品标题） ---
        let name = columns
            .value(row, fields::NAME)
            .and_then(normalize_empty)
            .or(product_title);

        let name_secondary =
            columns.value(row, fields::NAME_SECONDARY).and_then(normalize_empty);
        let sku = columns.value(row, fields::SKU).and_then(normalize_empty);
        let dimensions = columns.value(row, fields::DIMENSIONS).and_then(normalize_empty);

        // --- 自由规格列 ---
        let mut specs = BTreeMap::new();
        for spec in &columns.spec_columns {
            if let Some(value) = row.get(&spec.header).map(|v| v.as_str()).and_then(normalize_empty) {
                specs.insert(spec.key.clone(), value);
            }
        }

        let accepted = !row_issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error);
        outcome.issues.append(&mut row_issues);

        if accepted {
            outcome.variants.push(VariantRow {
                row_number,
                product_slug,
                code,
                original_code: None,
                name,
                name_secondary,
                sku,
                dimensions,
                weight,
                price,
                stock_qty,
                specs,
            });
        }
    }

    fn parse_decimal_field(
        &self,
        row_number: usize,
        row: &HashMap<String, String>,
        columns: &ColumnMap,
        field: &'static str,
        row_issues: &mut Vec<ValidationIssue>,
    ) -> Option<f64> {
        let raw = columns.value(row, field)?;
        match parse_decimal(raw) {
            Ok(v) => Some(v),
            Err(()) => {
                row_issues.push(
                    ValidationIssue::row_error(
                        row_number,
                        field,
                        raw,
                        issue_codes::INVALID_DECIMAL,
                        format!("{field} 不是合法小数: {raw}"),
                    )
                    .with_expected("1234.50"),
                );
                None
            }
        }
    }

    /// 批内重复编码消歧（Rewrite: 改写加后缀；Reject: 转为行级错误）
    fn disambiguate_codes(&self, outcome: &mut ValidationOutcome) {
        let codes: Vec<(usize, String)> = outcome
            .variants
            .iter()
            .map(|v| (v.row_number, v.code.clone()))
            .collect();
        let rewrites = plan_code_rewrites(&codes);
        if rewrites.is_empty() {
            return;
        }

        match self.options.duplicate_code_policy {
            DuplicateCodePolicy::Rewrite => {
                for rewrite in rewrites {
                    if let Some(variant) = outcome
                        .variants
                        .iter_mut()
                        .find(|v| v.row_number == rewrite.row)
                    {
                        variant.original_code = Some(rewrite.original.clone());
                        variant.code = rewrite.replacement.clone();
                    }
                    outcome.notes.push(NormalizationNote {
                        row: Some(rewrite.row),
                        column: fields::CODE.to_string(),
                        original: rewrite.original.clone(),
                        replacement: rewrite.replacement.clone(),
                        reason: issue_codes::DUPLICATE_CODE.to_string(),
                    });
                    outcome.issues.push(ValidationIssue {
                        row: Some(rewrite.row),
                        column: fields::CODE.to_string(),
                        raw_value: rewrite.original.clone(),
                        severity: IssueSeverity::Warning,
                        code: issue_codes::DUPLICATE_CODE.to_string(),
                        message: format!(
                            "型号编码 {} 在本批内重复，已改写为 {}",
                            rewrite.original, rewrite.replacement
                        ),
                        expected: None,
                    });
                }
            }
            DuplicateCodePolicy::Reject => {
                for rewrite in rewrites {
                    outcome.variants.retain(|v| v.row_number != rewrite.row);
                    outcome.issues.push(ValidationIssue::row_error(
                        rewrite.row,
                        fields::CODE,
                        &rewrite.original,
                        issue_codes::DUPLICATE_CODE,
                        format!("型号编码 {} 在本批内重复", rewrite.original),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog_repo::{CategoryNode, ProductNode, SeriesNode};

    fn lookup_with_catalog() -> CatalogLookup {
        let mut lookup = CatalogLookup::default();
        lookup.insert_brand("acme", "b1");
        lookup.insert_category(CategoryNode {
            id: "c1".to_string(),
            slug: "electronics".to_string(),
            name: "Electronics".to_string(),
            parent_id: None,
        });
        lookup.insert_category(CategoryNode {
            id: "c2".to_string(),
            slug: "laptops".to_string(),
            name: "Laptops".to_string(),
            parent_id: Some("c1".to_string()),
        });
        lookup.insert_category(CategoryNode {
            id: "c9".to_string(),
            slug: "furniture".to_string(),
            name: "Furniture".to_string(),
            parent_id: None,
        });
        lookup.insert_series(SeriesNode {
            id: "s1".to_string(),
            slug: "premium".to_string(),
            category_id: "c1".to_string(),
        });
        lookup.insert_product(
            "existing-product",
            ProductNode {
                id: "p1".to_string(),
                title: "Existing Product".to_string(),
            },
        );
        lookup
    }

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|values| {
                headers
                    .iter()
                    .cloned()
                    .zip(values.iter().map(|v| v.to_string()))
                    .collect::<HashMap<_, _>>()
            })
            .collect();
        RawSheet {
            name: "test".to_string(),
            headers,
            rows,
        }
    }

    fn product_headers() -> Vec<&'static str> {
        vec!["Brand", "Category", "Series", "Title", "Slug", "Status"]
    }

    #[test]
    fn test_product_row_accepted() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "Test Product", "test-product", "active"]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.products.len(), 1);
        let row = &outcome.products[0];
        assert_eq!(row.slug, "test-product");
        // 扁平引用展开为完整祖先链
        assert_eq!(row.category_chain, vec!["electronics", "laptops"]);
        assert_eq!(row.brand_slug.as_deref(), Some("acme"));
    }

    #[test]
    fn test_missing_title_blocks_row() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "", "p1", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.products.len(), 0);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == issue_codes::MISSING_REQUIRED && i.row == Some(2)));
    }

    #[test]
    fn test_unknown_brand_permissive_becomes_candidate() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::permissive();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[
                &["Globex", "laptops", "premium", "P One", "p-one", ""],
                &["Globex", "laptops", "premium", "P Two", "p-two", ""],
            ],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.products.len(), 2);
        let brands: Vec<_> = outcome
            .candidates
            .iter()
            .filter(|c| c.kind == EntityKind::Brand)
            .collect();
        // 去重后一条候选，来源行聚合
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].slug, "globex");
        assert_eq!(brands[0].rows, vec![2, 3]);
    }

    #[test]
    fn test_blank_brand_strict_accepted_without_reference() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::strict();
        let validator = RowValidator::new(&lookup, &options);

        // Brand 列存在但值为空: 非引用错误，行照常接受且无品牌
        let products = sheet(
            &product_headers(),
            &[&["", "laptops", "premium", "No Brand", "no-brand", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert!(outcome.issues.is_empty(), "{:?}", outcome.issues);
        assert_eq!(outcome.products.len(), 1);
        assert!(outcome.products[0].brand_slug.is_none());
    }

    #[test]
    fn test_unknown_brand_strict_blocks_row() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::strict();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["Globex", "laptops", "premium", "P One", "p-one", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.products.len(), 0);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == issue_codes::UNKNOWN_BRAND));
    }

    #[test]
    fn test_series_category_mismatch_names_both() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        // premium 绑定 electronics，furniture 与其无祖先关系
        let products = sheet(
            &product_headers(),
            &[&["acme", "furniture", "premium", "Sofa", "sofa", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.products.len(), 0);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.code == issue_codes::CATEGORY_MISMATCH)
            .expect("mismatch issue");
        assert!(issue.message.contains("electronics"));
        assert!(issue.message.contains("furniture"));
    }

    #[test]
    fn test_series_ancestor_allowed() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        // premium 绑定 electronics（laptops 的祖先）→ 放行
        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "Laptop", "laptop", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);
        assert_eq!(outcome.error_count(), 0);
    }

    #[test]
    fn test_unknown_series_permissive_scoped_to_leaf() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::permissive();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "Ultra", "Laptop", "laptop", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.error_count(), 0);
        let series = outcome.candidates_of_kind(EntityKind::Series);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].slug, "ultra");
        assert_eq!(series[0].parent_scope.as_deref(), Some("laptops"));
    }

    #[test]
    fn test_shared_series_slug_warns_but_resolves() {
        let mut lookup = lookup_with_catalog();
        // 第二个同 slug 系列挂在另一分类下 → slug 歧义
        lookup.insert_series(SeriesNode {
            id: "s2".to_string(),
            slug: "premium".to_string(),
            category_id: "c9".to_string(),
        });
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "Laptop", "laptop", ""]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        // 解析落在先创建的系列上（electronics 为祖先，放行），但产出警告
        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.products.len(), 1);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.code == issue_codes::AMBIGUOUS_SERIES)
            .expect("ambiguity warning");
        assert_eq!(issue.severity, IssueSeverity::Warning);
        assert!(issue.message.contains("electronics"));
    }

    #[test]
    fn test_status_fallback_recorded_as_note() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "Laptop", "laptop", "archived"]],
        );
        let outcome = validator.validate(Some(&products), None, vec![]);

        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.products[0].status, "active");
        assert!(outcome
            .notes
            .iter()
            .any(|n| n.reason == issue_codes::STATUS_DEFAULTED && n.original == "archived"));
    }

    fn variant_headers() -> Vec<&'static str> {
        vec!["Product", "Code", "Name", "Price", "Stock", "Spec:RAM"]
    }

    #[test]
    fn test_variant_unknown_product_is_error_in_both_modes() {
        let lookup = lookup_with_catalog();
        for options in [ImportOptions::permissive(), ImportOptions::strict()] {
            let validator = RowValidator::new(&lookup, &options);
            let variants = sheet(
                &variant_headers(),
                &[&["ghost-product", "X100", "", "19,90", "5", ""]],
            );
            let outcome = validator.validate(None, Some(&variants), vec![]);
            assert_eq!(outcome.variants.len(), 0);
            assert!(outcome
                .issues
                .iter()
                .any(|i| i.code == issue_codes::UNKNOWN_PRODUCT));
        }
    }

    #[test]
    fn test_variant_name_falls_back_to_product_title() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let variants = sheet(
            &variant_headers(),
            &[&["existing-product", "X100", "", "1.234,50", "7", "16GB"]],
        );
        let outcome = validator.validate(None, Some(&variants), vec![]);

        assert_eq!(outcome.error_count(), 0);
        let row = &outcome.variants[0];
        assert_eq!(row.name.as_deref(), Some("Existing Product"));
        assert_eq!(row.price, Some(1234.50));
        assert_eq!(row.stock_qty, Some(7));
        assert_eq!(row.specs.get("ram").map(|s| s.as_str()), Some("16GB"));
    }

    #[test]
    fn test_variant_name_falls_back_to_batch_product_title() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        // 商品行与型号行同批出现: 名称回落本批商品标题，而非库中实体
        let products = sheet(
            &product_headers(),
            &[&["acme", "laptops", "premium", "Batch Product", "batch-product", ""]],
        );
        let variants = sheet(
            &variant_headers(),
            &[&["batch-product", "BP-001", "", "9,90", "1", ""]],
        );
        let outcome = validator.validate(Some(&products), Some(&variants), vec![]);

        assert_eq!(outcome.error_count(), 0);
        assert_eq!(outcome.variants.len(), 1);
        assert_eq!(outcome.variants[0].name.as_deref(), Some("Batch Product"));
    }

    #[test]
    fn test_invalid_decimal_blocks_row_with_example() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let variants = sheet(
            &variant_headers(),
            &[&["existing-product", "X100", "", "12x90", "5", ""]],
        );
        let outcome = validator.validate(None, Some(&variants), vec![]);

        assert_eq!(outcome.variants.len(), 0);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.code == issue_codes::INVALID_DECIMAL)
            .expect("decimal issue");
        assert_eq!(issue.raw_value, "12x90");
        assert_eq!(issue.expected.as_deref(), Some("1234.50"));
    }

    #[test]
    fn test_duplicate_codes_rewritten_with_notes() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        let variants = sheet(
            &variant_headers(),
            &[
                &["existing-product", "X100", "", "", "", ""],
                &["existing-product", "X100", "", "", "", ""],
                &["existing-product", "X100", "", "", "", ""],
            ],
        );
        let outcome = validator.validate(None, Some(&variants), vec![]);

        assert_eq!(outcome.error_count(), 0);
        let codes: Vec<_> = outcome.variants.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec!["X100", "X100-2", "X100-3"]);
        assert_eq!(outcome.variants[1].original_code.as_deref(), Some("X100"));
        let note_rows: Vec<_> = outcome
            .notes
            .iter()
            .filter(|n| n.reason == issue_codes::DUPLICATE_CODE)
            .map(|n| n.row)
            .collect();
        assert_eq!(note_rows, vec![Some(3), Some(4)]);
    }

    #[test]
    fn test_rewrite_avoids_literal_code_collision() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        // 批内字面 "X100-2" 已占用 → 重复项改写跳到 "-3"
        let variants = sheet(
            &variant_headers(),
            &[
                &["existing-product", "X100", "", "", "", ""],
                &["existing-product", "X100", "", "", "", ""],
                &["existing-product", "X100-2", "", "", "", ""],
            ],
        );
        let outcome = validator.validate(None, Some(&variants), vec![]);

        assert_eq!(outcome.error_count(), 0);
        let codes: Vec<_> = outcome.variants.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec!["X100", "X100-3", "X100-2"]);
    }

    #[test]
    fn test_duplicate_codes_rejected_under_policy() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions {
            duplicate_code_policy: DuplicateCodePolicy::Reject,
            ..ImportOptions::default()
        };
        let validator = RowValidator::new(&lookup, &options);

        let variants = sheet(
            &variant_headers(),
            &[
                &["existing-product", "X100", "", "", "", ""],
                &["existing-product", "X100", "", "", "", ""],
            ],
        );
        let outcome = validator.validate(None, Some(&variants), vec![]);

        assert_eq!(outcome.variants.len(), 1);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == issue_codes::DUPLICATE_CODE
                && i.severity == IssueSeverity::Error));
    }

    #[test]
    fn test_missing_columns_aborts_sheet_only() {
        let lookup = lookup_with_catalog();
        let options = ImportOptions::default();
        let validator = RowValidator::new(&lookup, &options);

        // 商品表缺必填列，型号表正常
        let products = sheet(&["Brand"], &[&["acme"]]);
        let variants = sheet(
            &variant_headers(),
            &[&["existing-product", "X100", "", "", "", ""]],
        );
        let outcome = validator.validate(Some(&products), Some(&variants), vec![]);

        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == issue_codes::MISSING_COLUMNS && i.row.is_none()));
        assert_eq!(outcome.variants.len(), 1);
    }

    impl ValidationOutcome {
        fn candidates_of_kind(&self, kind: EntityKind) -> Vec<&Candidate> {
            self.candidates.iter().filter(|c| c.kind == kind).collect()
        }
    }
}
