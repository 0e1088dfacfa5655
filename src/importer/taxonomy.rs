// ==========================================
// 商品目录批量导入系统 - 层级分类解析器
// ==========================================
// 职责: 分类路径 → 有序分段；与既有分类树匹配；
//       未匹配尾段转为链式候选；祖先放宽校验
// ==========================================

use crate::domain::types::CategoryMatch;
use crate::importer::normalizer::slugify;
use crate::repository::catalog_repo::CatalogLookup;

// ==========================================
// PathSegment - 路径分段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub level: usize, // 嵌套层级（0 = 根）
    pub name: String, // 原始名称（TRIM 后）
    pub slug: String, // 派生 slug
}

/// 解析分类路径为有序分段
///
/// 空分段（连续分隔符、首尾分隔符）直接丢弃
pub fn parse_path(raw: &str, delimiter: char) -> Vec<PathSegment> {
    raw.split(delimiter)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(level, name)| PathSegment {
            level,
            name: name.to_string(),
            slug: slugify(name),
        })
        .collect()
}

// ==========================================
// ChainLink - 分类链节点
// ==========================================
// Existing: 已匹配到既有分类节点
// Pending:  未匹配，成为层级候选（父指向前一段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLink {
    Existing {
        id: String,
        slug: String,
    },
    Pending {
        slug: String,
        name: String,
        parent_slug: Option<String>,
    },
}

impl ChainLink {
    pub fn slug(&self) -> &str {
        match self {
            ChainLink::Existing { slug, .. } => slug,
            ChainLink::Pending { slug, .. } => slug,
        }
    }
}

// ==========================================
// ResolvedTaxonomy - 路径解析结果（根 → 叶）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResolvedTaxonomy {
    pub chain: Vec<ChainLink>,
}

impl ResolvedTaxonomy {
    /// 商品直属分类 slug（链末位）
    pub fn leaf_slug(&self) -> Option<&str> {
        self.chain.last().map(|l| l.slug())
    }

    /// slug 序列（根 → 叶），进入快照供提交期重放
    pub fn slug_chain(&self) -> Vec<String> {
        self.chain.iter().map(|l| l.slug().to_string()).collect()
    }

    /// 未匹配尾段（候选实体来源）
    pub fn pending(&self) -> impl Iterator<Item = &ChainLink> {
        self.chain
            .iter()
            .filter(|l| matches!(l, ChainLink::Pending { .. }))
    }
}

/// 层级路径匹配
///
/// 逐段在"前一段已匹配节点"之下按 slug 或名称匹配；
/// 一旦某段未命中，其后所有段均为 Pending，父指向前一段
pub fn resolve_path(segments: &[PathSegment], lookup: &CatalogLookup) -> ResolvedTaxonomy {
    let mut chain = Vec::with_capacity(segments.len());
    let mut parent_id: Option<String> = None;
    let mut matching = true;

    for segment in segments {
        if matching {
            if let Some(node) =
                lookup.find_child_category(parent_id.as_deref(), &segment.slug, &segment.name)
            {
                parent_id = Some(node.id.clone());
                chain.push(ChainLink::Existing {
                    id: node.id.clone(),
                    slug: node.slug.clone(),
                });
                continue;
            }
            matching = false;
        }
        let parent_slug = chain.last().map(|l: &ChainLink| l.slug().to_string());
        chain.push(ChainLink::Pending {
            slug: segment.slug.clone(),
            name: segment.name.clone(),
            parent_slug,
        });
    }

    ResolvedTaxonomy { chain }
}

/// 扁平分类匹配（单一引用，不按层级展开）
///
/// 全局按 slug 匹配既有节点；命中时链为该节点的完整
/// 祖先链（提交期无需创建）；未命中则为单个根级候选
pub fn resolve_flat(token: &str, lookup: &CatalogLookup) -> ResolvedTaxonomy {
    let slug = slugify(token);
    if let Some(node) = lookup.find_category_by_slug(&slug) {
        let chain = lookup
            .ancestor_chain(&node.id)
            .into_iter()
            .map(|n| ChainLink::Existing {
                id: n.id.clone(),
                slug: n.slug.clone(),
            })
            .collect();
        return ResolvedTaxonomy { chain };
    }

    ResolvedTaxonomy {
        chain: vec![ChainLink::Pending {
            slug,
            name: token.trim().to_string(),
            parent_slug: None,
        }],
    }
}

/// 系列分类与商品分类一致性校验（祖先放宽）
///
/// 自叶向根回溯商品分类链：系列分类即叶 → Exact；
/// 出现在更上层 → Ancestor；未出现 → Mismatch
pub fn check_series_category(series_category_id: &str, chain: &[ChainLink]) -> CategoryMatch {
    for (offset, link) in chain.iter().rev().enumerate() {
        if let ChainLink::Existing { id, .. } = link {
            if id == series_category_id {
                return if offset == 0 {
                    CategoryMatch::Exact
                } else {
                    CategoryMatch::Ancestor
                };
            }
        }
    }
    CategoryMatch::Mismatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog_repo::{CatalogLookup, CategoryNode};

    fn lookup_with_tree() -> CatalogLookup {
        // electronics → computers → laptops
        let mut lookup = CatalogLookup::default();
        lookup.insert_category(CategoryNode {
            id: "c1".to_string(),
            slug: "electronics".to_string(),
            name: "Electronics".to_string(),
            parent_id: None,
        });
        lookup.insert_category(CategoryNode {
            id: "c2".to_string(),
            slug: "computers".to_string(),
            name: "Computers".to_string(),
            parent_id: Some("c1".to_string()),
        });
        lookup.insert_category(CategoryNode {
            id: "c3".to_string(),
            slug: "laptops".to_string(),
            name: "Laptops".to_string(),
            parent_id: Some("c2".to_string()),
        });
        lookup
    }

    #[test]
    fn test_parse_path_segments() {
        let segments = parse_path(" Electronics / Computers //Laptops ", '/');
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].name, "Electronics");
        assert_eq!(segments[0].slug, "electronics");
        assert_eq!(segments[2].level, 2);
    }

    #[test]
    fn test_resolve_path_full_match() {
        let lookup = lookup_with_tree();
        let segments = parse_path("Electronics/Computers/Laptops", '/');
        let resolved = resolve_path(&segments, &lookup);

        assert_eq!(resolved.chain.len(), 3);
        assert!(resolved.pending().next().is_none());
        assert_eq!(resolved.leaf_slug(), Some("laptops"));
    }

    #[test]
    fn test_resolve_path_unmatched_tail_chained() {
        let lookup = lookup_with_tree();
        let segments = parse_path("Electronics/Gaming/Consoles", '/');
        let resolved = resolve_path(&segments, &lookup);

        let pending: Vec<_> = resolved.pending().collect();
        assert_eq!(pending.len(), 2);
        // 首个未匹配段父指向已匹配段
        assert_eq!(
            pending[0],
            &ChainLink::Pending {
                slug: "gaming".to_string(),
                name: "Gaming".to_string(),
                parent_slug: Some("electronics".to_string()),
            }
        );
        // 其后段父指向前一未匹配段
        assert_eq!(
            pending[1],
            &ChainLink::Pending {
                slug: "consoles".to_string(),
                name: "Consoles".to_string(),
                parent_slug: Some("gaming".to_string()),
            }
        );
    }

    #[test]
    fn test_resolve_path_matches_by_name() {
        let lookup = lookup_with_tree();
        // 名称匹配（大小写不敏感）同样命中
        let segments = parse_path("electronics/COMPUTERS", '/');
        let resolved = resolve_path(&segments, &lookup);
        assert!(resolved.pending().next().is_none());
    }

    #[test]
    fn test_resolve_flat_existing_builds_ancestor_chain() {
        let lookup = lookup_with_tree();
        let resolved = resolve_flat("laptops", &lookup);
        assert_eq!(
            resolved.slug_chain(),
            vec!["electronics", "computers", "laptops"]
        );
    }

    #[test]
    fn test_resolve_flat_unknown_is_root_candidate() {
        let lookup = lookup_with_tree();
        let resolved = resolve_flat("Toys", &lookup);
        assert_eq!(resolved.chain.len(), 1);
        assert!(matches!(
            &resolved.chain[0],
            ChainLink::Pending { slug, parent_slug: None, .. } if slug == "toys"
        ));
    }

    #[test]
    fn test_check_series_category_exact_ancestor_mismatch() {
        let lookup = lookup_with_tree();
        let segments = parse_path("Electronics/Computers/Laptops", '/');
        let resolved = resolve_path(&segments, &lookup);

        // 叶节点 → Exact
        assert_eq!(check_series_category("c3", &resolved.chain), CategoryMatch::Exact);
        // 祖先 → Ancestor
        assert_eq!(check_series_category("c1", &resolved.chain), CategoryMatch::Ancestor);
        // 无关分类 → Mismatch
        assert_eq!(check_series_category("c9", &resolved.chain), CategoryMatch::Mismatch);
    }

    #[test]
    fn test_ancestor_rule_with_pending_leaf() {
        let lookup = lookup_with_tree();
        // 叶为候选分类时，既有系列分类只能是 Ancestor
        let segments = parse_path("Electronics/Gaming", '/');
        let resolved = resolve_path(&segments, &lookup);
        assert_eq!(
            check_series_category("c1", &resolved.chain),
            CategoryMatch::Ancestor
        );
    }
}
