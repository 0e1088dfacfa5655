// ==========================================
// 商品目录批量导入系统 - 导入任务仓储
// ==========================================
// 职责: 任务行 / 快照行持久化
// 红线: 状态仅前向迁移；快照与摘要在同一事务内
//       原子落库；任务行上的摘要独立于快照行存储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::ImportJob;
use crate::domain::types::ImportJobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct ImportJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 新建任务行（初始状态 Validating）
    pub fn insert_job(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO import_job (
                job_id, status, actor, source_files, total_rows,
                accepted_products, accepted_variants, error_count, warning_count,
                snapshot_id, snapshot_digest, last_error, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                job.job_id,
                job.status.as_str(),
                job.actor,
                serde_json::to_string(&job.source_files)?,
                job.total_rows as i64,
                job.accepted_products as i64,
                job.accepted_variants as i64,
                job.error_count as i64,
                job.warning_count as i64,
                job.snapshot_id,
                job.snapshot_digest,
                job.last_error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn fetch_job(&self, job_id: &str) -> RepositoryResult<ImportJob> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT job_id, status, actor, source_files, total_rows,
                    accepted_products, accepted_variants, error_count, warning_count,
                    snapshot_id, snapshot_digest, last_error, created_at, updated_at
             FROM import_job WHERE job_id = ?1",
            params![job_id],
            map_job_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "import_job".to_string(),
            id: job_id.to_string(),
        })
    }

    pub fn list_jobs(&self) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, status, actor, source_files, total_rows,
                    accepted_products, accepted_variants, error_count, warning_count,
                    snapshot_id, snapshot_digest, last_error, created_at, updated_at
             FROM import_job ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], map_job_row)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    /// 状态迁移（乐观并发: WHERE 带当前状态）
    ///
    /// 非法迁移（含一切逆向迁移）返回 InvalidStateTransition
    pub fn transition(&self, job_id: &str, to: ImportJobStatus) -> RepositoryResult<()> {
        let current = self.fetch_job(job_id)?.status;
        if !current.can_transition(to) {
            return Err(RepositoryError::InvalidStateTransition {
                from: current.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE import_job SET status = ?2, updated_at = ?3
             WHERE job_id = ?1 AND status = ?4",
            params![
                job_id,
                to.as_str(),
                Utc::now().to_rfc3339(),
                current.as_str()
            ],
        )?;
        if updated == 0 {
            // 并发方抢先迁移
            return Err(RepositoryError::InvalidStateTransition {
                from: current.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// 迁移至 Failed 并记录触发错误
    pub fn mark_failed(&self, job_id: &str, message: &str) -> RepositoryResult<()> {
        self.transition(job_id, ImportJobStatus::Failed)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE import_job SET last_error = ?2, updated_at = ?3 WHERE job_id = ?1",
            params![job_id, message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// 更新校验计数
    pub fn update_counters(
        &self,
        job_id: &str,
        total_rows: usize,
        accepted_products: usize,
        accepted_variants: usize,
        error_count: usize,
        warning_count: usize,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE import_job SET
                total_rows = ?2, accepted_products = ?3, accepted_variants = ?4,
                error_count = ?5, warning_count = ?6, updated_at = ?7
             WHERE job_id = ?1",
            params![
                job_id,
                total_rows as i64,
                accepted_products as i64,
                accepted_variants as i64,
                error_count as i64,
                warning_count as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 原子落库快照: 同一事务内插入快照行并回写任务行
    /// （snapshot_id + 摘要），二者要么都在要么都不在
    pub fn attach_snapshot(
        &self,
        job_id: &str,
        snapshot_id: &str,
        document: &str,
        digest: &str,
    ) -> RepositoryResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO import_snapshot (snapshot_id, job_id, document, digest, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot_id, job_id, document, digest, now],
        )?;
        tx.execute(
            "UPDATE import_job SET snapshot_id = ?2, snapshot_digest = ?3, updated_at = ?4
             WHERE job_id = ?1",
            params![job_id, snapshot_id, digest, now],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 读取快照文档与其落库时的摘要
    pub fn fetch_snapshot(&self, snapshot_id: &str) -> RepositoryResult<(String, String)> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT document, digest FROM import_snapshot WHERE snapshot_id = ?1",
            params![snapshot_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "import_snapshot".to_string(),
            id: snapshot_id.to_string(),
        })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<ImportJob> {
    let status_raw: String = row.get(1)?;
    let source_files_raw: String = row.get(3)?;
    let created_raw: String = row.get(12)?;
    let updated_raw: String = row.get(13)?;

    Ok(ImportJob {
        job_id: row.get(0)?,
        status: ImportJobStatus::parse(&status_raw).unwrap_or(ImportJobStatus::Failed),
        actor: row.get(2)?,
        source_files: serde_json::from_str(&source_files_raw).unwrap_or_default(),
        total_rows: row.get::<_, i64>(4)? as usize,
        accepted_products: row.get::<_, i64>(5)? as usize,
        accepted_variants: row.get::<_, i64>(6)? as usize,
        error_count: row.get::<_, i64>(7)? as usize,
        warning_count: row.get::<_, i64>(8)? as usize,
        snapshot_id: row.get(9)?,
        snapshot_digest: row.get(10)?,
        last_error: row.get(11)?,
        created_at: parse_rfc3339(&created_raw),
        updated_at: parse_rfc3339(&updated_raw),
    })
}

fn parse_rfc3339(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
