// ==========================================
// 商品目录批量导入系统 - 文件加载器
// ==========================================
// 支持: 分隔文本 (.csv, 分号分隔) / 多表工作簿 (.xlsx)
// 编码: 按降序尝试 UTF-8 → GB18030，全部失败则
//       有损解码并记录 Info 级问题（不硬失败）
// ==========================================

use crate::domain::import::{issue_codes, ValidationIssue};
use crate::domain::types::IssueSeverity;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use encoding_rs::GB18030;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// 分隔文本默认分隔符
pub const DEFAULT_DELIMITER: u8 = b';';

// ==========================================
// RawSheet - 原始表数据
// ==========================================
// 行记录: HashMap<列名, 值>（值已 TRIM）
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

// ==========================================
// LoadedDocument - 加载结果
// ==========================================
// 商品表与型号表独立可缺；表级问题随结果返回
#[derive(Debug, Default)]
pub struct LoadedDocument {
    pub product_sheet: Option<RawSheet>,
    pub variant_sheet: Option<RawSheet>,
    pub issues: Vec<ValidationIssue>,
}

// ==========================================
// DocumentLoader - 按扩展名分派的加载器
// ==========================================
pub struct DocumentLoader {
    delimiter: u8,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl DocumentLoader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// 加载单个文件
    ///
    /// # 返回
    /// - Ok(LoadedDocument): 商品/型号表 + 表级问题
    /// - Err: 文件不存在 / 扩展名不支持 / 工作簿不可解析
    pub fn load(&self, file_path: &Path) -> ImportResult<LoadedDocument> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" | "txt" => self.load_delimited(file_path),
            "xlsx" => self.load_workbook(file_path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }

    // ===== 分隔文本 =====
    fn load_delimited(&self, file_path: &Path) -> ImportResult<LoadedDocument> {
        let bytes = fs::read(file_path)?;
        let (text, decode_issue) = decode_text(&bytes, file_path);

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row_map);
        }

        // 单表文件: 按文件名归类（含 product/商品 → 商品表，否则型号表）
        let stem = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sheet")
            .to_string();
        let sheet = RawSheet {
            name: stem.clone(),
            headers,
            rows,
        };

        let mut doc = LoadedDocument::default();
        if let Some(issue) = decode_issue {
            doc.issues.push(issue);
        }
        if is_product_sheet_name(&stem) {
            doc.product_sheet = Some(sheet);
        } else {
            doc.variant_sheet = Some(sheet);
        }
        Ok(doc)
    }

    // ===== 多表工作簿 =====
    fn load_workbook(&self, file_path: &Path) -> ImportResult<LoadedDocument> {
        let mut workbook: Xlsx<_> = open_workbook(file_path)
            .map_err(|e: calamine::XlsxError| ImportError::WorkbookParseError(e.to_string()))?;

        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(ImportError::WorkbookParseError(
                "工作簿无工作表".to_string(),
            ));
        }

        // 表选择: 名称含 product（且不含 variant）→ 商品表；
        //         名称含 variant → 型号表；
        //         两者皆无命名约定时，第一个表视为型号表
        let product_name = sheet_names
            .iter()
            .find(|n| is_product_sheet_name(n))
            .cloned();
        let variant_name = sheet_names
            .iter()
            .find(|n| is_variant_sheet_name(n))
            .cloned();

        let mut doc = LoadedDocument::default();

        if let Some(name) = &product_name {
            doc.product_sheet = Some(self.read_sheet(&mut workbook, name)?);
        }
        if let Some(name) = &variant_name {
            doc.variant_sheet = Some(self.read_sheet(&mut workbook, name)?);
        }
        if product_name.is_none() && variant_name.is_none() {
            let first = sheet_names[0].clone();
            debug!(sheet = %first, "工作表无命名约定，首表按型号表处理");
            doc.variant_sheet = Some(self.read_sheet(&mut workbook, &first)?);
        }

        Ok(doc)
    }

    fn read_sheet<R: std::io::Read + std::io::Seek>(
        &self,
        workbook: &mut Xlsx<R>,
        sheet_name: &str,
    ) -> ImportResult<RawSheet> {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| ImportError::WorkbookParseError(e.to_string()))?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| ImportError::WorkbookParseError(format!("工作表无数据行: {sheet_name}")))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for data_row in rows_iter {
            let mut row_map = HashMap::new();

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), cell.to_string().trim().to_string());
                }
            }

            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row_map);
        }

        Ok(RawSheet {
            name: sheet_name.to_string(),
            headers,
            rows,
        })
    }
}

/// 按降序编码列表解码文本；全部失败时有损解码并返回 Info 级问题
fn decode_text(bytes: &[u8], file_path: &Path) -> (String, Option<ValidationIssue>) {
    // 1. UTF-8 严格
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), None);
    }

    // 2. GB18030 严格
    let (decoded, _, had_errors) = GB18030.decode(bytes);
    if !had_errors {
        debug!(file = %file_path.display(), "按 GB18030 解码");
        return (decoded.into_owned(), None);
    }

    // 3. 有损回落: 记录 Info 级问题，不硬失败
    warn!(file = %file_path.display(), "编码探测失败，执行有损 UTF-8 解码");
    let issue = ValidationIssue {
        row: None,
        column: String::new(),
        raw_value: String::new(),
        severity: IssueSeverity::Info,
        code: issue_codes::LOSSY_DECODE.to_string(),
        message: format!(
            "文件 {} 无法按 UTF-8/GB18030 解码，已执行有损解码，个别字符可能丢失",
            file_path.display()
        ),
        expected: None,
    };
    (String::from_utf8_lossy(bytes).into_owned(), Some(issue))
}

fn is_product_sheet_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    (lower.contains("product") && !lower.contains("variant")) || lower.contains("商品")
}

fn is_variant_sheet_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("variant") || lower.contains("型号")
}
