// ==========================================
// 商品目录批量导入系统 - 引擎层
// ==========================================
// 两阶段: 校验（生成快照） / 提交（重放快照）
// ==========================================

pub mod committer;
pub mod validation;
pub mod verifier;

pub use committer::CommitEngine;
pub use validation::ValidationEngine;
pub use verifier::WriteVerifier;
