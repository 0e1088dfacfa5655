// ==========================================
// 商品目录批量导入系统 - 审计日志仓储
// ==========================================
// 职责: 导入动作的只追加审计记录
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// AuditEntry - 审计记录
// ==========================================
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub log_id: String,
    pub job_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub summary: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
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

    /// 追加一条审计记录
    pub fn append(
        &self,
        job_id: Option<&str>,
        actor: &str,
        action: &str,
        summary: &serde_json::Value,
    ) -> RepositoryResult<String> {
        let conn = self.lock()?;
        let log_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO audit_log (log_id, job_id, actor, action, summary_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log_id,
                job_id,
                actor,
                action,
                serde_json::to_string(summary)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(log_id)
    }

    /// 按任务列出审计记录（时间升序）
    pub fn list_by_job(&self, job_id: &str) -> RepositoryResult<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT log_id, job_id, actor, action, summary_json, created_at
             FROM audit_log WHERE job_id = ?1 ORDER BY created_at, log_id",
        )?;
        let rows = stmt.query_map(params![job_id], |row| {
            let summary_raw: String = row.get(4)?;
            let created_raw: String = row.get(5)?;
            Ok(AuditEntry {
                log_id: row.get(0)?,
                job_id: row.get(1)?,
                actor: row.get(2)?,
                action: row.get(3)?,
                summary: serde_json::from_str(&summary_raw)
                    .unwrap_or(serde_json::Value::Null),
                created_at: DateTime::parse_from_rfc3339(&created_raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}
