// ==========================================
// 商品目录批量导入系统 - 写后核验器
// ==========================================
// 职责: 提交事务之外逐条读回"已报告创建"的实体
// 红线: 任一实体读回缺失 ⇒ verified=false，
//       调用方不得将总体结果展示为成功
// ==========================================

use crate::domain::import::{CreatedRecord, VerificationReport};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::RepositoryResult;
use tracing::{debug, error};

pub struct WriteVerifier<'a> {
    repo: &'a CatalogRepository,
}

impl<'a> WriteVerifier<'a> {
    pub fn new(repo: &'a CatalogRepository) -> Self {
        Self { repo }
    }

    /// 逐条读回核验
    pub fn verify(&self, created: &[CreatedRecord]) -> RepositoryResult<VerificationReport> {
        let mut missing = Vec::new();

        for record in created {
            if !self.repo.entity_exists(record.kind, &record.key, &record.id)? {
                error!(
                    kind = record.kind.as_str(),
                    key = %record.key,
                    id = %record.id,
                    "已报告创建的实体读回缺失"
                );
                missing.push(record.clone());
            }
        }

        let verified = missing.is_empty();
        debug!(checked = created.len(), missing = missing.len(), verified, "写后核验完成");
        Ok(VerificationReport {
            verified,
            checked: created.len(),
            missing,
        })
    }
}
