// ==========================================
// 商品目录批量导入系统 - 校验引擎
// ==========================================
// 流程: 建任务 → 加载文件 → 加载目录快照 →
//       行级校验 → 计数回写 → 快照编码落库 → 报告
// 红线: 快照落库成功后任务才进入 Pending；
//       存在阻断错误且未开启部分提交时任务直接 Failed
// ==========================================

use crate::config::ImportOptions;
use crate::domain::import::{
    ImportJob, SnapshotDocument, SnapshotRef, ValidationReport, CONTRACT_VERSION,
};
use crate::domain::types::{ImportJobStatus, ValidationStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::loader::{DocumentLoader, LoadedDocument, RawSheet};
use crate::importer::snapshot::encode_snapshot;
use crate::importer::validator::RowValidator;
use crate::repository::{
    AuditLogRepository, CatalogRepository, ImportJobRepository,
};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct ValidationEngine {
    catalog_repo: CatalogRepository,
    job_repo: ImportJobRepository,
    audit_repo: AuditLogRepository,
    loader: DocumentLoader,
}

impl ValidationEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            catalog_repo: CatalogRepository::from_shared(Arc::clone(&conn)),
            job_repo: ImportJobRepository::from_shared(Arc::clone(&conn)),
            audit_repo: AuditLogRepository::from_shared(conn),
            loader: DocumentLoader::default(),
        }
    }

    /// 执行单趟校验
    ///
    /// 文件不可读等结构性失败返回 FatalError 报告，
    /// 任务迁入 Failed；行级错误不会使本方法返回 Err
    pub async fn run(
        &self,
        files: &[PathBuf],
        options: &ImportOptions,
    ) -> ImportResult<ValidationReport> {
        let job_id = Uuid::new_v4().to_string();
        info!(job_id = %job_id, files = files.len(), mode = ?options.mode, "开始校验");

        // 步骤 1: 建任务（Validating）
        let source_files: Vec<String> = files
            .iter()
            .map(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown")
                    .to_string()
            })
            .collect();
        let now = Utc::now();
        let job = ImportJob {
            job_id: job_id.clone(),
            status: ImportJobStatus::Validating,
            actor: options.actor.clone(),
            source_files: source_files.clone(),
            total_rows: 0,
            accepted_products: 0,
            accepted_variants: 0,
            error_count: 0,
            warning_count: 0,
            snapshot_id: None,
            snapshot_digest: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.job_repo.insert_job(&job)?;

        // 步骤 2: 加载文件
        let loaded = match self.load_files(files) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "文件加载失败");
                self.job_repo.mark_failed(&job_id, &e.to_string())?;
                return Ok(fatal_report(&job_id, &e));
            }
        };
        debug!(
            job_id = %job_id,
            has_products = loaded.product_sheet.is_some(),
            has_variants = loaded.variant_sheet.is_some(),
            "文件加载完成"
        );

        // 步骤 3: 加载既有目录只读快照
        let lookup = self.catalog_repo.load_lookup()?;

        // 步骤 4: 行级校验
        let validator = RowValidator::new(&lookup, options);
        let outcome = validator.validate(
            loaded.product_sheet.as_ref(),
            loaded.variant_sheet.as_ref(),
            loaded.issues,
        );

        // 步骤 5: 计数回写
        self.job_repo.update_counters(
            &job_id,
            outcome.total_rows,
            outcome.products.len(),
            outcome.variants.len(),
            outcome.error_count(),
            outcome.warning_count(),
        )?;

        let status = outcome.status();
        let snapshot_eligible = outcome.error_count() == 0 || options.allow_partial;

        // 步骤 6: 快照编码落库（合格时任务进入 Pending）
        let snapshot = if snapshot_eligible {
            let doc = SnapshotDocument {
                contract_version: CONTRACT_VERSION,
                source_files: source_files.clone(),
                products: outcome.products.clone(),
                variants: outcome.variants.clone(),
                candidates: outcome.candidates.clone(),
                notes: outcome.notes.clone(),
            };
            let encoded = encode_snapshot(doc)?;
            let snapshot_id = Uuid::new_v4().to_string();
            self.job_repo
                .attach_snapshot(&job_id, &snapshot_id, &encoded.document, &encoded.digest)?;
            self.job_repo.transition(&job_id, ImportJobStatus::Pending)?;
            info!(job_id = %job_id, snapshot_id = %snapshot_id, digest = %encoded.digest, "快照落库，任务进入 Pending");
            Some(SnapshotRef {
                snapshot_id,
                digest: encoded.digest,
            })
        } else {
            warn!(job_id = %job_id, errors = outcome.error_count(), "存在阻断错误且未开启部分提交，任务失败");
            self.job_repo
                .mark_failed(&job_id, "校验存在阻断错误")?;
            None
        };

        // 步骤 7: 审计
        self.audit_repo.append(
            Some(&job_id),
            &options.actor,
            "validate",
            &json!({
                "total_rows": outcome.total_rows,
                "accepted_products": outcome.products.len(),
                "accepted_variants": outcome.variants.len(),
                "errors": outcome.error_count(),
                "warnings": outcome.warning_count(),
                "candidates": outcome.candidates.len(),
            }),
        )?;

        Ok(ValidationReport {
            job_id,
            status,
            total_rows: outcome.total_rows,
            accepted_products: outcome.products.len(),
            accepted_variants: outcome.variants.len(),
            error_count: outcome.error_count(),
            warning_count: outcome.warning_count(),
            issues: outcome.issues,
            candidates: outcome.candidates,
            notes: outcome.notes,
            snapshot,
        })
    }

    /// 加载并合并多文件（商品表 / 型号表各取首个出现者）
    fn load_files(&self, files: &[PathBuf]) -> ImportResult<LoadedDocument> {
        if files.is_empty() {
            return Err(ImportError::InternalError("未提供导入文件".to_string()));
        }

        let mut merged = LoadedDocument::default();
        for path in files {
            let loaded = self.loader.load(Path::new(path))?;
            merge_sheet(&mut merged.product_sheet, loaded.product_sheet, "product");
            merge_sheet(&mut merged.variant_sheet, loaded.variant_sheet, "variant");
            merged.issues.extend(loaded.issues);
        }
        Ok(merged)
    }
}

fn merge_sheet(slot: &mut Option<RawSheet>, incoming: Option<RawSheet>, label: &str) {
    match (slot.as_ref(), incoming) {
        (None, Some(sheet)) => *slot = Some(sheet),
        (Some(kept), Some(dropped)) => {
            warn!(
                kept = %kept.name,
                dropped = %dropped.name,
                kind = label,
                "多个文件提供同类表，保留首个"
            );
        }
        _ => {}
    }
}

fn fatal_report(job_id: &str, error: &ImportError) -> ValidationReport {
    ValidationReport {
        job_id: job_id.to_string(),
        status: ValidationStatus::FatalError,
        issues: vec![crate::domain::import::ValidationIssue::sheet_level(
            "",
            crate::domain::import::issue_codes::WORKBOOK_UNREADABLE,
            error.to_string(),
        )],
        candidates: vec![],
        notes: vec![],
        total_rows: 0,
        accepted_products: 0,
        accepted_variants: 0,
        error_count: 1,
        warning_count: 0,
        snapshot: None,
    }
}
