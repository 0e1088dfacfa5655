// ==========================================
// 商品目录批量导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化目录与导入相关表（幂等）
///
/// 唯一性口径：
/// - brand.slug 全局唯一
/// - category 同父节点下 slug 唯一（根节点 parent_id 以 '' 归一）
/// - series (category_id, slug) 唯一
/// - product.slug 全局唯一
/// - variant.code 全局唯一（契约中唯一的全局键）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS brand (
            brand_id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS category (
            category_id TEXT PRIMARY KEY,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            parent_id TEXT REFERENCES category(category_id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_category_parent_slug
            ON category(COALESCE(parent_id, ''), slug);

        CREATE TABLE IF NOT EXISTS series (
            series_id TEXT PRIMARY KEY,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            category_id TEXT NOT NULL REFERENCES category(category_id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(category_id, slug)
        );

        CREATE TABLE IF NOT EXISTS product (
            product_id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            title TEXT NOT NULL,
            title_secondary TEXT,
            brand_id TEXT REFERENCES brand(brand_id),
            series_id TEXT NOT NULL REFERENCES series(series_id),
            category_id TEXT NOT NULL REFERENCES category(category_id),
            status TEXT NOT NULL DEFAULT 'active',
            featured INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            features_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS variant (
            variant_id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            product_id TEXT NOT NULL REFERENCES product(product_id),
            name TEXT,
            name_secondary TEXT,
            sku TEXT,
            dimensions TEXT,
            weight REAL,
            price REAL,
            stock_qty INTEGER,
            specs_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_job (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            actor TEXT NOT NULL,
            source_files TEXT NOT NULL DEFAULT '[]',
            total_rows INTEGER NOT NULL DEFAULT 0,
            accepted_products INTEGER NOT NULL DEFAULT 0,
            accepted_variants INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            warning_count INTEGER NOT NULL DEFAULT 0,
            snapshot_id TEXT,
            snapshot_digest TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_snapshot (
            snapshot_id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES import_job(job_id),
            document TEXT NOT NULL,
            digest TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            log_id TEXT PRIMARY KEY,
            job_id TEXT,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            summary_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}
