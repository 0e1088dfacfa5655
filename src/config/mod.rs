// ==========================================
// 商品目录批量导入系统 - 配置层
// ==========================================
// 职责: 导入行为配置
// ==========================================

pub mod import_options;

pub use import_options::ImportOptions;
