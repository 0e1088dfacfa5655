// ==========================================
// 商品目录批量导入系统 - 导入领域模型
// ==========================================
// 用途: 校验问题 / 候选实体 / 快照 / 任务 / 结果报告
// ==========================================

use crate::domain::catalog::{ProductRow, VariantRow};
use crate::domain::types::{
    CommitStatus, EntityKind, ImportJobStatus, IssueSeverity, ValidationStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// 机器可读问题码
// ==========================================
pub mod issue_codes {
    pub const MISSING_COLUMNS: &str = "missing_columns";
    pub const LOSSY_DECODE: &str = "lossy_decode";
    pub const WORKBOOK_UNREADABLE: &str = "workbook_unreadable";
    pub const MISSING_REQUIRED: &str = "missing_required";
    pub const INVALID_DECIMAL: &str = "invalid_decimal";
    pub const INVALID_INTEGER: &str = "invalid_integer";
    pub const LENGTH_EXCEEDED: &str = "length_exceeded";
    pub const UNKNOWN_BRAND: &str = "unknown_brand";
    pub const UNKNOWN_CATEGORY: &str = "unknown_category";
    pub const UNKNOWN_SERIES: &str = "unknown_series";
    pub const AMBIGUOUS_SERIES: &str = "ambiguous_series";
    pub const UNKNOWN_PRODUCT: &str = "unknown_product";
    pub const CATEGORY_MISMATCH: &str = "category_mismatch";
    pub const DUPLICATE_CODE: &str = "duplicate_code";
    pub const STATUS_DEFAULTED: &str = "status_defaulted";
    pub const ROW_WRITE_FAILED: &str = "row_write_failed";
}

// ==========================================
// ValidationIssue - 校验问题
// ==========================================
// 不变量: 单趟校验内只追加；行进入接受集的前提是
//         该行不存在 Error 级问题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: Option<usize>, // None = 表级问题
    pub column: String,
    pub raw_value: String,
    pub severity: IssueSeverity,
    pub code: String,             // 机器可读问题码
    pub message: String,          // 操作员可读描述
    pub expected: Option<String>, // 期望值示例
}

impl ValidationIssue {
    pub fn sheet_level(column: &str, code: &str, message: String) -> Self {
        Self {
            row: None,
            column: column.to_string(),
            raw_value: String::new(),
            severity: IssueSeverity::Error,
            code: code.to_string(),
            message,
            expected: None,
        }
    }

    pub fn row_error(row: usize, column: &str, raw: &str, code: &str, message: String) -> Self {
        Self {
            row: Some(row),
            column: column.to_string(),
            raw_value: raw.to_string(),
            severity: IssueSeverity::Error,
            code: code.to_string(),
            message,
            expected: None,
        }
    }

    pub fn with_expected(mut self, expected: &str) -> Self {
        self.expected = Some(expected.to_string());
        self
    }
}

// ==========================================
// Candidate - 候选实体
// ==========================================
// 不变量: 按 (kind, slug, parent_scope) 去重，
//         重复出现仅追加来源行号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: EntityKind,
    pub slug: String,
    pub name: String,
    pub parent_scope: Option<String>, // 分类候选=父分类 slug；系列候选=分类 slug
    pub rows: Vec<usize>,             // 来源行号（升序）
}

// ==========================================
// NormalizationNote - 规范化备注
// ==========================================
// 用途: 记录编码改写 / 状态令牌回落 / 有损解码等
//       非错误但改变了数据的处理
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationNote {
    pub row: Option<usize>,
    pub column: String,
    pub original: String,
    pub replacement: String,
    pub reason: String,
}

// ==========================================
// SnapshotDocument - 导入快照（规范化文档）
// ==========================================
// 红线: 提交阶段唯一输入；内容寻址（SHA-256）
// 确定性: 字段顺序固定，集合成员排序固定，
//         不含时间戳/UUID，相同输入 ⇒ 相同摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub contract_version: u32,
    pub source_files: Vec<String>, // 源文件名（排序）
    pub products: Vec<ProductRow>, // 按行号排序
    pub variants: Vec<VariantRow>, // 按行号排序
    pub candidates: Vec<Candidate>, // 按 (kind, scope, slug) 排序
    pub notes: Vec<NormalizationNote>, // 按 (行号, 列) 排序
}

/// 当前列语义契约版本
pub const CONTRACT_VERSION: u32 = 1;

// ==========================================
// ImportJob - 导入任务
// ==========================================
// 关系: 一个任务持有至多一个快照；摘要独立存储
//       用于提交前防篡改比对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub job_id: String, // UUID
    pub status: ImportJobStatus,
    pub actor: String,
    pub source_files: Vec<String>,
    pub total_rows: usize,
    pub accepted_products: usize,
    pub accepted_variants: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub snapshot_id: Option<String>,
    pub snapshot_digest: Option<String>, // 与快照行分开存储
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// SnapshotRef - 快照引用（存储句柄 + 内容摘要）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub snapshot_id: String,
    pub digest: String,
}

// ==========================================
// ValidationReport - 校验结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub job_id: String,
    pub status: ValidationStatus,
    pub issues: Vec<ValidationIssue>,
    pub candidates: Vec<Candidate>,
    pub notes: Vec<NormalizationNote>,
    pub total_rows: usize,
    pub accepted_products: usize,
    pub accepted_variants: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub snapshot: Option<SnapshotRef>,
}

impl ValidationReport {
    /// 指定类型的候选实体列表
    pub fn candidates_of(&self, kind: EntityKind) -> Vec<&Candidate> {
        self.candidates.iter().filter(|c| c.kind == kind).collect()
    }
}

// ==========================================
// EntityTally - 实体创建/更新计数（按实际落库统计）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTally {
    pub brands_created: usize,
    pub categories_created: usize,
    pub series_created: usize,
    pub products_created: usize,
    pub products_updated: usize,
    pub variants_created: usize,
    pub variants_updated: usize,
}

impl EntityTally {
    pub fn created_total(&self) -> usize {
        self.brands_created
            + self.categories_created
            + self.series_created
            + self.products_created
            + self.variants_created
    }
}

// ==========================================
// CreatedRecord - 本次提交报告为"新建"的实体
// ==========================================
// 用途: 写后核验的输入（逐条读回确认）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub kind: EntityKind,
    pub key: String, // 自然键（slug / code）
    pub id: String,  // 数据库 ID
}

// ==========================================
// VerificationReport - 写后核验结果
// ==========================================
// 红线: verified=false 时总体结果禁止展示为成功
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub checked: usize,
    pub missing: Vec<CreatedRecord>, // 报告已创建但读回缺失的实体
}

// ==========================================
// CommitReport - 提交结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReport {
    pub job_id: String,
    pub status: CommitStatus,
    pub tally: EntityTally,
    pub row_errors: Vec<ValidationIssue>, // 部分成功模式下的失败行
    pub verification: VerificationReport,
}
