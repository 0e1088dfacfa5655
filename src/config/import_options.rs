// ==========================================
// 商品目录批量导入系统 - 导入选项
// ==========================================
// 职责: 调用方显式传入的行为开关
// 红线: 不做任何"智能推断"——分隔符语义、
//       重复编码策略均由调用方决定
// ==========================================

use crate::domain::types::{DuplicateCodePolicy, ReferenceMode};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportOptions - 单次导入行为配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// 未知品牌/分类/系列的处理模式
    pub mode: ReferenceMode,

    /// 分类路径分隔符（默认 '/'）
    pub taxonomy_delimiter: char,

    /// 扁平分类字段中的分隔符是否视为层级分隔
    /// （slug 可能合法包含该字符，故不自动探测）
    pub treat_delimiter_as_hierarchy: bool,

    /// 型号编码重复处理策略
    pub duplicate_code_policy: DuplicateCodePolicy,

    /// 校验存在阻断错误时是否仍允许生成快照
    /// （true 时任务可进入 Pending，提交仅落通过的行）
    pub allow_partial: bool,

    /// 操作者标识（审计用）
    pub actor: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ReferenceMode::Permissive,
            taxonomy_delimiter: '/',
            treat_delimiter_as_hierarchy: false,
            duplicate_code_policy: DuplicateCodePolicy::Rewrite,
            allow_partial: false,
            actor: "system".to_string(),
        }
    }
}

impl ImportOptions {
    pub fn strict() -> Self {
        Self {
            mode: ReferenceMode::Strict,
            ..Self::default()
        }
    }

    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }
}
