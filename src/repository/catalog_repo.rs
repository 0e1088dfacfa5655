// ==========================================
// 商品目录批量导入系统 - 目录仓储
// ==========================================
// 职责: 既有实体只读快照加载 + 事务内幂等写入
// 红线: Repository 不含业务逻辑；
//       所有查询参数化，防止 SQL 注入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{ProductRow, VariantRow};
use crate::domain::types::EntityKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// 只读快照节点类型
// ==========================================

#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SeriesNode {
    pub id: String,
    pub slug: String,
    pub category_id: String,
}

#[derive(Debug, Clone)]
pub struct ProductNode {
    pub id: String,
    pub title: String,
}

// ==========================================
// CatalogLookup - 既有实体只读快照
// ==========================================
// 用途: 校验趟开始时一次性加载，趟内只读复用；
//       显式传入校验流程，不做进程级共享状态
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    brands: HashMap<String, String>, // slug → brand_id
    categories: HashMap<String, CategoryNode>, // id → node
    // 父节点（根为 ""）→ 子节点 id（加载序）
    children: HashMap<String, Vec<String>>,
    // slug → 首个加载到的节点 id（扁平引用解析用）
    by_slug_first: HashMap<String, String>,
    series: HashMap<String, SeriesNode>, // slug → 首个加载到的节点（创建序）
    // 被多个分类下系列占用的 slug（解析时需提示操作员）
    ambiguous_series: HashSet<String>,
    products: HashMap<String, ProductNode>, // slug → node
    variant_codes: HashSet<String>,
}

impl CatalogLookup {
    pub fn insert_brand(&mut self, slug: &str, id: &str) {
        self.brands.insert(slug.to_string(), id.to_string());
    }

    pub fn insert_category(&mut self, node: CategoryNode) {
        let parent_key = node.parent_id.clone().unwrap_or_default();
        self.children
            .entry(parent_key)
            .or_default()
            .push(node.id.clone());
        self.by_slug_first
            .entry(node.slug.clone())
            .or_insert_with(|| node.id.clone());
        self.categories.insert(node.id.clone(), node);
    }

    pub fn insert_series(&mut self, node: SeriesNode) {
        if let Some(existing) = self.series.get(&node.slug) {
            if existing.id != node.id {
                self.ambiguous_series.insert(node.slug.clone());
            }
            return;
        }
        self.series.insert(node.slug.clone(), node);
    }

    pub fn insert_product(&mut self, slug: &str, node: ProductNode) {
        self.products.insert(slug.to_string(), node);
    }

    pub fn insert_variant_code(&mut self, code: &str) {
        self.variant_codes.insert(code.to_string());
    }

    pub fn brand_id(&self, slug: &str) -> Option<&str> {
        self.brands.get(slug).map(|s| s.as_str())
    }

    pub fn category(&self, id: &str) -> Option<&CategoryNode> {
        self.categories.get(id)
    }

    /// 在指定父节点下按 slug 或名称（大小写不敏感）匹配子分类
    pub fn find_child_category(
        &self,
        parent_id: Option<&str>,
        slug: &str,
        name: &str,
    ) -> Option<&CategoryNode> {
        let parent_key = parent_id.unwrap_or_default();
        let children = self.children.get(parent_key)?;
        let name_lower = name.to_lowercase();
        children
            .iter()
            .filter_map(|id| self.categories.get(id))
            .find(|node| node.slug == slug || node.name.to_lowercase() == name_lower)
    }

    /// 全局按 slug 匹配分类（加载序首个命中，保证确定性）
    pub fn find_category_by_slug(&self, slug: &str) -> Option<&CategoryNode> {
        self.by_slug_first
            .get(slug)
            .and_then(|id| self.categories.get(id))
    }

    /// 自根至叶的祖先链（含自身）
    pub fn ancestor_chain(&self, id: &str) -> Vec<&CategoryNode> {
        let mut chain = Vec::new();
        let mut cursor = self.categories.get(id);
        while let Some(node) = cursor {
            chain.push(node);
            cursor = node
                .parent_id
                .as_deref()
                .and_then(|pid| self.categories.get(pid));
        }
        chain.reverse();
        chain
    }

    pub fn series_by_slug(&self, slug: &str) -> Option<&SeriesNode> {
        self.series.get(slug)
    }

    /// 同一 slug 是否被多个分类下的系列占用（解析按创建序取首个）
    pub fn series_slug_ambiguous(&self, slug: &str) -> bool {
        self.ambiguous_series.contains(slug)
    }

    pub fn product(&self, slug: &str) -> Option<&ProductNode> {
        self.products.get(slug)
    }

    pub fn has_variant_code(&self, code: &str) -> bool {
        self.variant_codes.contains(code)
    }
}

// ==========================================
// CatalogRepository
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 复用既有连接（同一事务域）
    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 加载既有实体只读快照（校验趟开始时调用一次）
    pub fn load_lookup(&self) -> RepositoryResult<CatalogLookup> {
        let conn = self.lock()?;
        let mut lookup = CatalogLookup::default();

        {
            let mut stmt = conn.prepare("SELECT slug, brand_id FROM brand ORDER BY brand_id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (slug, id) = row?;
                lookup.insert_brand(&slug, &id);
            }
        }

        {
            let mut stmt = conn.prepare(
                "SELECT category_id, slug, name, parent_id FROM category ORDER BY created_at, category_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(CategoryNode {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    name: row.get(2)?,
                    parent_id: row.get(3)?,
                })
            })?;
            for row in rows {
                lookup.insert_category(row?);
            }
        }

        {
            let mut stmt = conn.prepare(
                "SELECT series_id, slug, category_id FROM series ORDER BY created_at, series_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SeriesNode {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    category_id: row.get(2)?,
                })
            })?;
            for row in rows {
                lookup.insert_series(row?);
            }
        }

        {
            let mut stmt = conn.prepare("SELECT slug, product_id, title FROM product")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ProductNode {
                        id: row.get(1)?,
                        title: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (slug, node) = row?;
                lookup.insert_product(&slug, node);
            }
        }

        {
            let mut stmt = conn.prepare("SELECT code FROM variant")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                lookup.insert_variant_code(&row?);
            }
        }

        Ok(lookup)
    }

    /// 在单事务内执行写入（出错即整体回滚）
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                Ok(value)
            }
            // Transaction Drop 时自动回滚
            Err(e) => Err(e),
        }
    }

    /// 写后核验读回（独立于提交事务的全新读取）
    pub fn entity_exists(&self, kind: EntityKind, key: &str, id: &str) -> RepositoryResult<bool> {
        let conn = self.lock()?;
        let (sql, param) = match kind {
            EntityKind::Brand => ("SELECT 1 FROM brand WHERE slug = ?1", key),
            // 分类 slug 仅父域内唯一，按 ID 读回
            EntityKind::Category => ("SELECT 1 FROM category WHERE category_id = ?1", id),
            EntityKind::Series => ("SELECT 1 FROM series WHERE series_id = ?1", id),
            EntityKind::Product => ("SELECT 1 FROM product WHERE slug = ?1", key),
            EntityKind::Variant => ("SELECT 1 FROM variant WHERE code = ?1", key),
        };
        let found: Option<i64> = conn
            .query_row(sql, params![param], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内幂等写入（按自然键 get-or-create）
    // ==========================================

    /// 品牌 get-or-create（自然键: slug）
    ///
    /// # 返回
    /// - (brand_id, 是否新建)
    pub fn get_or_create_brand_tx(
        tx: &Transaction,
        slug: &str,
        name: &str,
    ) -> RepositoryResult<(String, bool)> {
        let existing: Option<String> = tx
            .query_row(
                "SELECT brand_id FROM brand WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO brand (brand_id, slug, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, slug, name, now],
        )?;
        Ok((id, true))
    }

    /// 分类 get-or-create（自然键: (parent_id, slug)）
    pub fn get_or_create_category_tx(
        tx: &Transaction,
        parent_id: Option<&str>,
        slug: &str,
        name: &str,
    ) -> RepositoryResult<(String, bool)> {
        let existing: Option<String> = tx
            .query_row(
                "SELECT category_id FROM category
                 WHERE COALESCE(parent_id, '') = COALESCE(?1, '') AND slug = ?2",
                params![parent_id, slug],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO category (category_id, slug, name, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, slug, name, parent_id, now],
        )?;
        Ok((id, true))
    }

    /// 系列 get-or-create（自然键: (category_id, slug)）
    pub fn get_or_create_series_tx(
        tx: &Transaction,
        category_id: &str,
        slug: &str,
        name: &str,
    ) -> RepositoryResult<(String, bool)> {
        let existing: Option<String> = tx
            .query_row(
                "SELECT series_id FROM series WHERE category_id = ?1 AND slug = ?2",
                params![category_id, slug],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO series (series_id, slug, name, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, slug, name, category_id, now],
        )?;
        Ok((id, true))
    }

    /// 事务内按 slug 查系列（跨分类，提交期引用解析用）
    pub fn find_series_by_slug_tx(
        tx: &Transaction,
        slug: &str,
    ) -> RepositoryResult<Option<(String, String)>> {
        let found: Option<(String, String)> = tx
            .query_row(
                "SELECT series_id, category_id FROM series WHERE slug = ?1
                 ORDER BY created_at, series_id LIMIT 1",
                params![slug],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(found)
    }

    /// 商品 upsert（自然键: slug）
    ///
    /// # 返回
    /// - (product_id, 是否新建)
    pub fn upsert_product_tx(
        tx: &Transaction,
        row: &ProductRow,
        brand_id: Option<&str>,
        series_id: &str,
        category_id: &str,
    ) -> RepositoryResult<(String, bool)> {
        let now = Utc::now().to_rfc3339();
        let features_json = serde_json::to_string(&row.features)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT product_id FROM product WHERE slug = ?1",
                params![row.slug],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            tx.execute(
                "UPDATE product SET
                    name = ?2, title = ?3, title_secondary = ?4, brand_id = ?5,
                    series_id = ?6, category_id = ?7, status = ?8, featured = ?9,
                    description = ?10, features_json = ?11, updated_at = ?12
                 WHERE product_id = ?1",
                params![
                    id,
                    row.name,
                    row.title,
                    row.title_secondary,
                    brand_id,
                    series_id,
                    category_id,
                    row.status,
                    row.featured as i32,
                    row.description,
                    features_json,
                    now,
                ],
            )?;
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO product (
                product_id, slug, name, title, title_secondary, brand_id,
                series_id, category_id, status, featured, description,
                features_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                id,
                row.slug,
                row.name,
                row.title,
                row.title_secondary,
                brand_id,
                series_id,
                category_id,
                row.status,
                row.featured as i32,
                row.description,
                features_json,
                now,
            ],
        )?;
        Ok((id, true))
    }

    /// 事务内按 slug 查商品（型号引用解析用）
    pub fn find_product_by_slug_tx(
        tx: &Transaction,
        slug: &str,
    ) -> RepositoryResult<Option<String>> {
        let found: Option<String> = tx
            .query_row(
                "SELECT product_id FROM product WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }

    /// 型号 upsert（自然键: code，全局唯一）
    pub fn upsert_variant_tx(
        tx: &Transaction,
        row: &VariantRow,
        product_id: &str,
    ) -> RepositoryResult<(String, bool)> {
        let now = Utc::now().to_rfc3339();
        let specs_json = serde_json::to_string(&row.specs)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT variant_id FROM variant WHERE code = ?1",
                params![row.code],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            tx.execute(
                "UPDATE variant SET
                    product_id = ?2, name = ?3, name_secondary = ?4, sku = ?5,
                    dimensions = ?6, weight = ?7, price = ?8, stock_qty = ?9,
                    specs_json = ?10, updated_at = ?11
                 WHERE variant_id = ?1",
                params![
                    id,
                    product_id,
                    row.name,
                    row.name_secondary,
                    row.sku,
                    row.dimensions,
                    row.weight,
                    row.price,
                    row.stock_qty,
                    specs_json,
                    now,
                ],
            )?;
            return Ok((id, false));
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO variant (
                variant_id, code, product_id, name, name_secondary, sku,
                dimensions, weight, price, stock_qty, specs_json,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                id,
                row.code,
                product_id,
                row.name,
                row.name_secondary,
                row.sku,
                row.dimensions,
                row.weight,
                row.price,
                row.stock_qty,
                specs_json,
                now,
            ],
        )?;
        Ok((id, true))
    }

    /// 删除实体（测试模拟存储故障用）
    #[doc(hidden)]
    pub fn delete_by_natural_key(&self, kind: EntityKind, key: &str) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let sql = match kind {
            EntityKind::Brand => "DELETE FROM brand WHERE slug = ?1",
            EntityKind::Category => "DELETE FROM category WHERE slug = ?1",
            EntityKind::Series => "DELETE FROM series WHERE slug = ?1",
            EntityKind::Product => "DELETE FROM product WHERE slug = ?1",
            EntityKind::Variant => "DELETE FROM variant WHERE code = ?1",
        };
        Ok(conn.execute(sql, params![key])?)
    }
}
