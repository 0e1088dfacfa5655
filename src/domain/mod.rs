// ==========================================
// 商品目录批量导入系统 - 领域层
// ==========================================
// 职责: 实体与值对象定义，不含业务流程
// ==========================================

pub mod catalog;
pub mod import;
pub mod types;

// 重导出核心类型
pub use catalog::{Brand, Category, Product, ProductRow, Series, Variant, VariantRow};
pub use import::{
    issue_codes, Candidate, CommitReport, CreatedRecord, EntityTally, ImportJob,
    NormalizationNote, SnapshotDocument, SnapshotRef, ValidationIssue, ValidationReport,
    VerificationReport, CONTRACT_VERSION,
};
pub use types::{
    CategoryMatch, CommitStatus, DuplicateCodePolicy, EntityKind, ImportJobStatus, IssueSeverity,
    ReferenceMode, ValidationStatus,
};
