// ==========================================
// 商品目录批量导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("工作簿解析失败: {0}")]
    WorkbookParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 快照相关错误 =====
    #[error("快照序列化失败: {0}")]
    SnapshotEncodeError(String),

    #[error("快照摘要不一致 (job {job_id}): 记录 {expected}，实际 {actual}")]
    SnapshotDigestMismatch {
        job_id: String,
        expected: String,
        actual: String,
    },

    #[error("快照不存在: {0}")]
    SnapshotNotFound(String),

    // ===== 任务状态错误 =====
    #[error("任务不存在: {0}")]
    JobNotFound(String),

    #[error("任务状态不允许提交 (job {job_id}): 当前 {status}，要求 PENDING")]
    JobNotCommittable { job_id: String, status: String },

    // ===== 数据库错误 =====
    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Repository(#[from] crate::repository::RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::SnapshotEncodeError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
