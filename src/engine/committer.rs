// ==========================================
// 商品目录批量导入系统 - 提交引擎
// ==========================================
// 流程: Pending 前置检查 → 摘要比对 → Running →
//       单事务依赖序重放 → 写后核验 → 终态判定
// 红线: 提交唯一输入为快照；摘要不一致拒绝提交；
//       核验未通过时终态必须为 Failed；
//       依赖序: 品牌/分类 → 系列 → 商品 → 型号
// ==========================================

use crate::config::ImportOptions;
use crate::domain::catalog::{ProductRow, VariantRow};
use crate::domain::import::{
    issue_codes, Candidate, CommitReport, CreatedRecord, EntityTally, SnapshotDocument,
    ValidationIssue,
};
use crate::domain::types::{CommitStatus, EntityKind, ImportJobStatus};
use crate::engine::verifier::WriteVerifier;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::snapshot::decode_snapshot;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::{AuditLogRepository, ImportJobRepository, RepositoryError};
use rusqlite::{Connection, Transaction};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub struct CommitEngine {
    catalog_repo: CatalogRepository,
    job_repo: ImportJobRepository,
    audit_repo: AuditLogRepository,
}

impl CommitEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            catalog_repo: CatalogRepository::from_shared(Arc::clone(&conn)),
            job_repo: ImportJobRepository::from_shared(Arc::clone(&conn)),
            audit_repo: AuditLogRepository::from_shared(conn),
        }
    }

    /// 提交一个 Pending 任务
    pub async fn commit(
        &self,
        job_id: &str,
        options: &ImportOptions,
    ) -> ImportResult<CommitReport> {
        info!(job_id = %job_id, "开始提交");

        // 步骤 1: 前置检查（仅 Pending 可提交）
        let job = self
            .job_repo
            .fetch_job(job_id)
            .map_err(|e| match e {
                RepositoryError::NotFound { .. } => ImportError::JobNotFound(job_id.to_string()),
                other => ImportError::Repository(other),
            })?;
        if job.status != ImportJobStatus::Pending {
            return Err(ImportError::JobNotCommittable {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
            });
        }
        let snapshot_id = job
            .snapshot_id
            .ok_or_else(|| ImportError::SnapshotNotFound(job_id.to_string()))?;
        let expected_digest = job
            .snapshot_digest
            .ok_or_else(|| ImportError::SnapshotNotFound(job_id.to_string()))?;

        // 步骤 2: 读取快照并比对摘要（任务行独立存储的摘要为准）
        let (document, _stored_digest) = self.job_repo.fetch_snapshot(&snapshot_id)?;
        let snapshot = match decode_snapshot(job_id, &document, &expected_digest) {
            Ok(doc) => doc,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "快照摘要比对失败，拒绝提交");
                self.job_repo.mark_failed(job_id, &e.to_string())?;
                return Err(e);
            }
        };
        debug!(
            job_id = %job_id,
            products = snapshot.products.len(),
            variants = snapshot.variants.len(),
            candidates = snapshot.candidates.len(),
            "快照解码完成"
        );

        // 步骤 3: Running
        self.job_repo.transition(job_id, ImportJobStatus::Running)?;

        // 步骤 4: 单事务依赖序重放
        let allow_partial = options.allow_partial;
        let replay = self.catalog_repo.with_transaction(|tx| {
            replay_snapshot(tx, &snapshot, allow_partial)
        });
        let outcome = match replay {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "提交事务回滚");
                self.job_repo.mark_failed(job_id, &e.to_string())?;
                return Err(ImportError::Repository(e));
            }
        };
        info!(
            job_id = %job_id,
            created = outcome.tally.created_total(),
            products_updated = outcome.tally.products_updated,
            variants_updated = outcome.tally.variants_updated,
            row_errors = outcome.row_errors.len(),
            "事务提交完成"
        );

        // 步骤 5: 写后核验（全新读取，先于终态判定）
        let verifier = WriteVerifier::new(&self.catalog_repo);
        let verification = verifier.verify(&outcome.created)?;

        // 步骤 6: 终态判定（核验未通过 ⇒ Failed）
        let status = if !verification.verified {
            error!(job_id = %job_id, missing = verification.missing.len(), "写后核验未通过");
            self.job_repo.transition(job_id, ImportJobStatus::Failed)?;
            self.job_repo_set_error(job_id, "写后核验未通过: 部分已报告创建的实体读回缺失")?;
            CommitStatus::Failed
        } else if !outcome.row_errors.is_empty() {
            self.job_repo.transition(job_id, ImportJobStatus::Partial)?;
            CommitStatus::Partial
        } else {
            self.job_repo.transition(job_id, ImportJobStatus::Success)?;
            CommitStatus::Success
        };

        // 步骤 7: 审计
        self.audit_repo.append(
            Some(job_id),
            &options.actor,
            "commit",
            &json!({
                "status": format!("{status:?}"),
                "brands_created": outcome.tally.brands_created,
                "categories_created": outcome.tally.categories_created,
                "series_created": outcome.tally.series_created,
                "products_created": outcome.tally.products_created,
                "products_updated": outcome.tally.products_updated,
                "variants_created": outcome.tally.variants_created,
                "variants_updated": outcome.tally.variants_updated,
                "row_errors": outcome.row_errors.len(),
                "verified": verification.verified,
            }),
        )?;

        Ok(CommitReport {
            job_id: job_id.to_string(),
            status,
            tally: outcome.tally,
            row_errors: outcome.row_errors,
            verification,
        })
    }

    fn job_repo_set_error(&self, job_id: &str, message: &str) -> ImportResult<()> {
        // 终态已到位，仅补记 last_error
        let conn = self.catalog_repo.shared_connection();
        let guard = conn
            .lock()
            .map_err(|e| ImportError::InternalError(e.to_string()))?;
        guard.execute(
            "UPDATE import_job SET last_error = ?2 WHERE job_id = ?1",
            rusqlite::params![job_id, message],
        )?;
        Ok(())
    }
}

// ==========================================
// 快照重放
// ==========================================

struct ReplayOutcome {
    tally: EntityTally,
    created: Vec<CreatedRecord>,
    row_errors: Vec<ValidationIssue>,
}

/// 在事务内按依赖序重放快照
///
/// 行级写入失败: allow_partial 时记为行错误并继续，
/// 否则整体回滚
fn replay_snapshot(
    tx: &Transaction,
    snapshot: &SnapshotDocument,
    allow_partial: bool,
) -> Result<ReplayOutcome, RepositoryError> {
    let names = CandidateNames::index(&snapshot.candidates);
    let mut tally = EntityTally::default();
    let mut created = Vec::new();
    let mut row_errors = Vec::new();
    // 本事务内已落库商品: slug → product_id
    let mut product_ids: HashMap<String, String> = HashMap::new();

    // ===== 商品行（品牌/分类 → 系列 → 商品） =====
    for row in &snapshot.products {
        match replay_product_row(tx, row, &names, &mut tally, &mut created) {
            Ok(product_id) => {
                product_ids.insert(row.slug.clone(), product_id);
            }
            Err(e) => {
                if !allow_partial {
                    return Err(RepositoryError::RowWriteError {
                        row: row.row_number,
                        message: e.to_string(),
                    });
                }
                warn!(row = row.row_number, error = %e, "商品行落库失败，部分提交模式下跳过");
                row_errors.push(ValidationIssue::row_error(
                    row.row_number,
                    "product",
                    &row.slug,
                    issue_codes::ROW_WRITE_FAILED,
                    e.to_string(),
                ));
            }
        }
    }

    // ===== 型号行 =====
    for row in &snapshot.variants {
        match replay_variant_row(tx, row, &product_ids, &mut tally, &mut created) {
            Ok(()) => {}
            Err(e) => {
                if !allow_partial {
                    return Err(RepositoryError::RowWriteError {
                        row: row.row_number,
                        message: e.to_string(),
                    });
                }
                warn!(row = row.row_number, error = %e, "型号行落库失败，部分提交模式下跳过");
                row_errors.push(ValidationIssue::row_error(
                    row.row_number,
                    "code",
                    &row.code,
                    issue_codes::ROW_WRITE_FAILED,
                    e.to_string(),
                ));
            }
        }
    }

    Ok(ReplayOutcome {
        tally,
        created,
        row_errors,
    })
}

fn replay_product_row(
    tx: &Transaction,
    row: &ProductRow,
    names: &CandidateNames,
    tally: &mut EntityTally,
    created: &mut Vec<CreatedRecord>,
) -> Result<String, RepositoryError> {
    // 品牌（可空）
    let brand_id = match &row.brand_slug {
        None => None,
        Some(slug) => {
            let name = names.brand(slug).unwrap_or(slug);
            let (id, was_created) = CatalogRepository::get_or_create_brand_tx(tx, slug, name)?;
            if was_created {
                tally.brands_created += 1;
                created.push(CreatedRecord {
                    kind: EntityKind::Brand,
                    key: slug.clone(),
                    id: id.clone(),
                });
            }
            Some(id)
        }
    };

    // 分类链（根 → 叶）
    let mut parent_id: Option<String> = None;
    let mut parent_slug: Option<&str> = None;
    for slug in &row.category_chain {
        let name = names.category(parent_slug, slug).unwrap_or(slug);
        let (id, was_created) =
            CatalogRepository::get_or_create_category_tx(tx, parent_id.as_deref(), slug, name)?;
        if was_created {
            tally.categories_created += 1;
            created.push(CreatedRecord {
                kind: EntityKind::Category,
                key: slug.clone(),
                id: id.clone(),
            });
        }
        parent_id = Some(id);
        parent_slug = Some(slug.as_str());
    }
    let category_id = parent_id.ok_or_else(|| RepositoryError::RowWriteError {
        row: row.row_number,
        message: "商品行缺少分类链".to_string(),
    })?;

    // 系列（全局 slug 优先复用既有系列，未命中则建在商品分类下）
    let series_id = match CatalogRepository::find_series_by_slug_tx(tx, &row.series_slug)? {
        Some((id, _series_category_id)) => id,
        None => {
            let name = names.series(&row.series_slug).unwrap_or(&row.series_slug);
            let (id, was_created) = CatalogRepository::get_or_create_series_tx(
                tx,
                &category_id,
                &row.series_slug,
                name,
            )?;
            if was_created {
                tally.series_created += 1;
                created.push(CreatedRecord {
                    kind: EntityKind::Series,
                    key: row.series_slug.clone(),
                    id: id.clone(),
                });
            }
            id
        }
    };

    // 商品 upsert
    let (product_id, was_created) =
        CatalogRepository::upsert_product_tx(tx, row, brand_id.as_deref(), &series_id, &category_id)?;
    if was_created {
        tally.products_created += 1;
        created.push(CreatedRecord {
            kind: EntityKind::Product,
            key: row.slug.clone(),
            id: product_id.clone(),
        });
    } else {
        tally.products_updated += 1;
    }

    Ok(product_id)
}

fn replay_variant_row(
    tx: &Transaction,
    row: &VariantRow,
    product_ids: &HashMap<String, String>,
    tally: &mut EntityTally,
    created: &mut Vec<CreatedRecord>,
) -> Result<(), RepositoryError> {
    // 商品引用: 本事务已落库者优先，否则查库
    let product_id = match product_ids.get(&row.product_slug) {
        Some(id) => id.clone(),
        None => CatalogRepository::find_product_by_slug_tx(tx, &row.product_slug)?.ok_or_else(
            || RepositoryError::RowWriteError {
                row: row.row_number,
                message: format!("型号引用的商品不存在: {}", row.product_slug),
            },
        )?,
    };

    let (variant_id, was_created) = CatalogRepository::upsert_variant_tx(tx, row, &product_id)?;
    if was_created {
        tally.variants_created += 1;
        created.push(CreatedRecord {
            kind: EntityKind::Variant,
            key: row.code.clone(),
            id: variant_id,
        });
    } else {
        tally.variants_updated += 1;
    }
    Ok(())
}

// ==========================================
// CandidateNames - 候选实体展示名索引
// ==========================================
// 快照行仅携带 slug，创建实体时的展示名取自候选记录
struct CandidateNames {
    brands: HashMap<String, String>,
    // (父分类 slug, slug) → 名称
    categories: HashMap<(Option<String>, String), String>,
    series: HashMap<String, String>,
}

impl CandidateNames {
    fn index(candidates: &[Candidate]) -> Self {
        let mut brands = HashMap::new();
        let mut categories = HashMap::new();
        let mut series = HashMap::new();
        for candidate in candidates {
            match candidate.kind {
                EntityKind::Brand => {
                    brands.insert(candidate.slug.clone(), candidate.name.clone());
                }
                EntityKind::Category => {
                    categories.insert(
                        (candidate.parent_scope.clone(), candidate.slug.clone()),
                        candidate.name.clone(),
                    );
                }
                EntityKind::Series => {
                    series.insert(candidate.slug.clone(), candidate.name.clone());
                }
                _ => {}
            }
        }
        Self {
            brands,
            categories,
            series,
        }
    }

    fn brand(&self, slug: &str) -> Option<&String> {
        self.brands.get(slug)
    }

    fn category(&self, parent_slug: Option<&str>, slug: &str) -> Option<&String> {
        self.categories
            .get(&(parent_slug.map(|s| s.to_string()), slug.to_string()))
    }

    fn series(&self, slug: &str) -> Option<&String> {
        self.series.get(slug)
    }
}
