// ==========================================
// 目录导入端到端测试
// ==========================================
// 测试目标: 校验 → 提交全链路（层级分类 /
//           编码消歧 / 名称回落 / 审计）
// ==========================================


use catalog_import::config::ImportOptions;
use catalog_import::domain::types::{CommitStatus, ImportJobStatus, ValidationStatus};
use catalog_import::engine::{CommitEngine, ValidationEngine};
use catalog_import::logging;
use catalog_import::repository::{AuditLogRepository, CatalogRepository, ImportJobRepository};
use std::path::PathBuf;
use test_helpers::*;

#[tokio::test]
async fn test_hierarchy_import_end_to_end() {
    logging::init_test();
    let (_db_file, db_path) = create_test_db().unwrap();
    let products = write_products_csv(
        "Brand;Category Path;Series;Title;Slug;Status\n\
         Acme;Electronics/Computers/Laptops;Premium;Ultra Laptop;ultra-laptop;active\n",
    );
    let variants = write_variants_csv(
        "Product;Code;Name;Price;Stock;Spec:RAM\n\
         ultra-laptop;UL-100;;1.299,00;10;16GB\n\
         ultra-laptop;UL-100;;1.399,00;4;32GB\n\
         ultra-laptop;UL-100;;1.499,00;2;64GB\n",
    );
    let files = vec![
        PathBuf::from(products.path()),
        PathBuf::from(variants.path()),
    ];
    let options = ImportOptions {
        treat_delimiter_as_hierarchy: true,
        ..ImportOptions::permissive()
    };

    // ===== 校验 =====
    let validation = ValidationEngine::new(open_shared(&db_path));
    let report = validation.run(&files, &options).await.unwrap();

    // 重复编码仅产出警告
    assert_eq!(report.status, ValidationStatus::PassedWithWarnings);
    assert_eq!(report.accepted_products, 1);
    assert_eq!(report.accepted_variants, 3);
    // 层级路径: 三段全新 → 三个分类候选，父子链式衔接
    let categories: Vec<_> = report
        .candidates
        .iter()
        .filter(|c| c.kind == catalog_import::EntityKind::Category)
        .collect();
    assert_eq!(categories.len(), 3);
    assert!(categories
        .iter()
        .any(|c| c.slug == "computers" && c.parent_scope.as_deref() == Some("electronics")));
    assert!(categories
        .iter()
        .any(|c| c.slug == "laptops" && c.parent_scope.as_deref() == Some("computers")));
    // 编码改写备注: 第 2、3 次出现
    let rewrites: Vec<_> = report
        .notes
        .iter()
        .filter(|n| n.column == "code")
        .collect();
    assert_eq!(rewrites.len(), 2);
    assert_eq!(rewrites[0].replacement, "UL-100-2");
    assert_eq!(rewrites[1].replacement, "UL-100-3");

    // ===== 提交 =====
    let commit = CommitEngine::new(open_shared(&db_path));
    let commit_report = commit.commit(&report.job_id, &options).await.unwrap();

    assert_eq!(commit_report.status, CommitStatus::Success);
    assert_eq!(commit_report.tally.categories_created, 3);
    assert_eq!(commit_report.tally.variants_created, 3);
    assert!(commit_report.verification.verified);

    // ===== 读取端确认 =====
    let catalog = CatalogRepository::new(&db_path).unwrap();
    let lookup = catalog.load_lookup().unwrap();
    let leaf = lookup.find_category_by_slug("laptops").expect("laptops");
    let chain: Vec<_> = lookup
        .ancestor_chain(&leaf.id)
        .iter()
        .map(|n| n.slug.clone())
        .collect();
    assert_eq!(chain, vec!["electronics", "computers", "laptops"]);
    assert!(lookup.has_variant_code("UL-100"));
    assert!(lookup.has_variant_code("UL-100-2"));
    assert!(lookup.has_variant_code("UL-100-3"));

    // 型号名称回落商品标题
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM variant WHERE code = 'UL-100'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name.as_deref(), Some("Ultra Laptop"));
    let price: Option<f64> = conn
        .query_row(
            "SELECT price FROM variant WHERE code = 'UL-100'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(price, Some(1299.00));

    // ===== 审计与任务终态 =====
    let job_repo = ImportJobRepository::new(&db_path).unwrap();
    let job = job_repo.fetch_job(&report.job_id).unwrap();
    assert_eq!(job.status, ImportJobStatus::Success);

    let audit = AuditLogRepository::new(&db_path).unwrap();
    let entries = audit.list_by_job(&report.job_id).unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"validate"));
    assert!(actions.contains(&"commit"));
}

#[tokio::test]
async fn test_blank_brand_strict_commits_without_brand() {
    logging::init_test();
    let (_db_file, db_path) = create_test_db().unwrap();

    // 预置分类与系列，严格模式下全部引用可解析
    let catalog = CatalogRepository::new(&db_path).unwrap();
    catalog
        .with_transaction(|tx| {
            let (root, _) = CatalogRepository::get_or_create_category_tx(
                tx,
                None,
                "electronics",
                "Electronics",
            )?;
            CatalogRepository::get_or_create_series_tx(tx, &root, "premium", "Premium")
                .map(|_| ())
        })
        .unwrap();

    // Brand 列存在但值为空: 品牌可空，不构成引用错误
    let products = write_products_csv(
        "Brand;Category;Series;Title;Slug\n\
         ;electronics;premium;Unbranded Item;unbranded-item\n",
    );
    let files = vec![PathBuf::from(products.path())];
    let options = ImportOptions::strict();

    let validation = ValidationEngine::new(open_shared(&db_path));
    let report = validation.run(&files, &options).await.unwrap();
    assert_eq!(report.status, ValidationStatus::Passed);
    assert!(report.issues.is_empty(), "{:?}", report.issues);

    let commit = CommitEngine::new(open_shared(&db_path));
    let commit_report = commit.commit(&report.job_id, &options).await.unwrap();
    assert_eq!(commit_report.status, CommitStatus::Success);
    assert_eq!(commit_report.tally.brands_created, 0);
    assert_eq!(commit_report.tally.products_created, 1);

    // 落库商品无品牌引用
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let brand_id: Option<String> = conn
        .query_row(
            "SELECT brand_id FROM product WHERE slug = 'unbranded-item'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(brand_id.is_none());
}

#[tokio::test]
async fn test_series_reuse_against_existing_catalog() {
    logging::init_test();
    let (_db_file, db_path) = create_test_db().unwrap();

    // 预置目录: electronics → laptops，premium 绑定 electronics
    let catalog = CatalogRepository::new(&db_path).unwrap();
    catalog
        .with_transaction(|tx| {
            let (root, _) = CatalogRepository::get_or_create_category_tx(
                tx,
                None,
                "electronics",
                "Electronics",
            )?;
            CatalogRepository::get_or_create_category_tx(tx, Some(&root), "laptops", "Laptops")?;
            CatalogRepository::get_or_create_series_tx(tx, &root, "premium", "Premium")?;
            Ok(())
        })
        .unwrap();

    // 商品挂在 laptops 下，系列 premium 绑定其祖先 → 放行并复用
    let products = write_products_csv(
        "Category;Series;Title;Slug\n\
         laptops;premium;Workstation;workstation\n",
    );
    let files = vec![PathBuf::from(products.path())];
    let options = ImportOptions::permissive();

    let validation = ValidationEngine::new(open_shared(&db_path));
    let report = validation.run(&files, &options).await.unwrap();
    assert_eq!(report.status, ValidationStatus::Passed);
    assert!(report.candidates.is_empty());

    let commit = CommitEngine::new(open_shared(&db_path));
    let commit_report = commit.commit(&report.job_id, &options).await.unwrap();
    assert_eq!(commit_report.status, CommitStatus::Success);
    assert_eq!(commit_report.tally.series_created, 0);
    assert_eq!(commit_report.tally.categories_created, 0);
    assert_eq!(commit_report.tally.products_created, 1);
}
