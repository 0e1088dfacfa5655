// ==========================================
// 商品目录批量导入系统 - 导入层
// ==========================================
// 流水线: 文件加载 → 列映射 → 值规范化 →
//         分类解析 → 行级校验 → 快照编码
// ==========================================

pub mod column_mapper;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod snapshot;
pub mod taxonomy;
pub mod validator;

pub use error::{ImportError, ImportResult};
pub use loader::{DocumentLoader, LoadedDocument, RawSheet};
pub use snapshot::{decode_snapshot, encode_snapshot, EncodedSnapshot};
pub use validator::{RowValidator, ValidationOutcome};
