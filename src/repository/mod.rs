// ==========================================
// 商品目录批量导入系统 - 仓储层
// ==========================================
// 分层: 目录主数据 / 导入任务与快照 / 审计日志
// 红线: Repository 不含业务逻辑，只做持久化
// ==========================================

pub mod audit_log_repo;
pub mod catalog_repo;
pub mod error;
pub mod import_job_repo;

pub use audit_log_repo::AuditLogRepository;
pub use catalog_repo::{CatalogLookup, CatalogRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use import_job_repo::ImportJobRepository;
