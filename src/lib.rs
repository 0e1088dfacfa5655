// ==========================================
// 商品目录批量导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 目录对账引擎（两阶段: 校验 / 提交）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 校验 / 提交 / 核验
pub mod engine;

// 导入层 - 文件解析与行级校验
pub mod importer;

// 配置层 - 导入选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CategoryMatch, CommitStatus, DuplicateCodePolicy, EntityKind, ImportJobStatus, IssueSeverity,
    ReferenceMode, ValidationStatus,
};

// 领域实体
pub use domain::catalog::{Brand, Category, Product, ProductRow, Series, Variant, VariantRow};
pub use domain::import::{
    Candidate, CommitReport, ImportJob, NormalizationNote, SnapshotDocument, SnapshotRef,
    ValidationIssue, ValidationReport, VerificationReport,
};

// 配置
pub use config::ImportOptions;

// 引擎
pub use engine::{CommitEngine, ValidationEngine};

// 错误类型
pub use importer::error::{ImportError, ImportResult};
pub use repository::error::{RepositoryError, RepositoryResult};

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "商品目录批量导入系统";
