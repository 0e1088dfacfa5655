// ==========================================
// 商品目录批量导入系统 - 核心类型定义
// ==========================================
// 用途: 全局枚举与状态机定义
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// EntityKind - 目录实体类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Brand,    // 品牌
    Category, // 分类（树形）
    Series,   // 产品系列
    Product,  // 商品
    Variant,  // 具体型号
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Brand => "brand",
            EntityKind::Category => "category",
            EntityKind::Series => "series",
            EntityKind::Product => "product",
            EntityKind::Variant => "variant",
        }
    }
}

// ==========================================
// IssueSeverity - 校验问题级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Error,   // 错误（阻断该行/该表）
    Warning, // 警告（允许导入）
    Info,    // 提示（仅记录）
}

// ==========================================
// ReferenceMode - 未知引用处理模式
// ==========================================
// 宽容模式: 未解析的品牌/分类/系列成为候选实体
// 严格模式: 未解析引用直接阻断该行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceMode {
    Permissive,
    Strict,
}

// ==========================================
// DuplicateCodePolicy - 型号编码重复处理策略
// ==========================================
// Rewrite: 第二次及之后出现的编码改写为 -2/-3 后缀（默认）
// Reject: 重复编码行直接标记为错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateCodePolicy {
    Rewrite,
    Reject,
}

// ==========================================
// CategoryMatch - 系列分类与商品分类一致性
// ==========================================
// 规则: 系列绑定的分类等于商品分类（Exact）
//       或为商品分类的祖先（Ancestor）均视为一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryMatch {
    Exact,
    Ancestor,
    Mismatch,
}

// ==========================================
// ImportJobStatus - 导入任务状态机
// ==========================================
// 生命周期: Validating → Pending → Running → {Success, Partial, Failed}
// 校验致命失败 / 提交前置检查失败可提前迁入 Failed
// 红线: 禁止任何逆向迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportJobStatus {
    Validating,
    Pending,
    Running,
    Success,
    Partial,
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportJobStatus::Validating => "VALIDATING",
            ImportJobStatus::Pending => "PENDING",
            ImportJobStatus::Running => "RUNNING",
            ImportJobStatus::Success => "SUCCESS",
            ImportJobStatus::Partial => "PARTIAL",
            ImportJobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "VALIDATING" => Some(ImportJobStatus::Validating),
            "PENDING" => Some(ImportJobStatus::Pending),
            "RUNNING" => Some(ImportJobStatus::Running),
            "SUCCESS" => Some(ImportJobStatus::Success),
            "PARTIAL" => Some(ImportJobStatus::Partial),
            "FAILED" => Some(ImportJobStatus::Failed),
            _ => None,
        }
    }

    /// 判断状态迁移是否合法（仅允许前向迁移）
    pub fn can_transition(&self, to: ImportJobStatus) -> bool {
        use ImportJobStatus::*;
        matches!(
            (self, to),
            (Validating, Pending)
                | (Validating, Failed)
                | (Pending, Running)
                | (Pending, Failed)
                | (Running, Success)
                | (Running, Partial)
                | (Running, Failed)
        )
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportJobStatus::Success | ImportJobStatus::Partial | ImportJobStatus::Failed
        )
    }
}

// ==========================================
// ValidationStatus - 校验结果总体状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Passed,             // 全部通过
    PassedWithWarnings, // 通过但有警告
    Failed,             // 存在阻断错误
    FatalError,         // 结构性失败（文件不可读等）
}

// ==========================================
// CommitStatus - 提交结果总体状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitStatus {
    Success,
    Partial,
    Failed,
}
