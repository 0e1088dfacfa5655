// ==========================================
// 商品目录批量导入系统 - 命令行入口
// ==========================================
// 用法: catalog-import <db_path> <file...> [选项]
// 选项:
//   --strict            未知引用阻断行（默认宽容模式）
//   --hierarchy         分类字段分隔符按层级解析
//   --reject-duplicates 批内重复编码转为错误（默认改写）
//   --allow-partial     存在行错误时仍生成快照并允许部分提交
//   --commit            校验通过后立即提交
//   --actor <name>      操作者标识（审计用）
// ==========================================

use catalog_import::config::ImportOptions;
use catalog_import::db::{init_schema, open_sqlite_connection};
use catalog_import::domain::types::{DuplicateCodePolicy, ReferenceMode, ValidationStatus};
use catalog_import::engine::{CommitEngine, ValidationEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> ExitCode {
    catalog_import::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", catalog_import::APP_NAME);
    tracing::info!("系统版本: {}", catalog_import::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!("用法: catalog-import <db_path> <file...> [--strict] [--hierarchy] [--reject-duplicates] [--allow-partial] [--commit] [--actor <name>]");
            return ExitCode::FAILURE;
        }
    };

    match run(parsed).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("导入失败: {e}");
            ExitCode::FAILURE
        }
    }
}

struct CliArgs {
    db_path: String,
    files: Vec<PathBuf>,
    options: ImportOptions,
    commit: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut db_path: Option<String> = None;
    let mut files = Vec::new();
    let mut options = ImportOptions::default();
    let mut commit = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" => options.mode = ReferenceMode::Strict,
            "--hierarchy" => options.treat_delimiter_as_hierarchy = true,
            "--reject-duplicates" => {
                options.duplicate_code_policy = DuplicateCodePolicy::Reject
            }
            "--allow-partial" => options.allow_partial = true,
            "--commit" => commit = true,
            "--actor" => {
                options.actor = iter
                    .next()
                    .ok_or("--actor 需要一个参数")?
                    .to_string();
            }
            other if other.starts_with("--") => {
                return Err(format!("未知选项: {other}"));
            }
            other => {
                if db_path.is_none() {
                    db_path = Some(other.to_string());
                } else {
                    files.push(PathBuf::from(other));
                }
            }
        }
    }

    let db_path = db_path.ok_or("缺少数据库路径")?;
    if files.is_empty() {
        return Err("缺少导入文件".to_string());
    }

    Ok(CliArgs {
        db_path,
        files,
        options,
        commit,
    })
}

async fn run(args: CliArgs) -> catalog_import::ImportResult<ExitCode> {
    let conn = open_sqlite_connection(&args.db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let validation_engine = ValidationEngine::new(Arc::clone(&conn));
    let report = validation_engine.run(&args.files, &args.options).await?;

    tracing::info!("校验结果: {:?}", report.status);
    tracing::info!(
        "行数 {}，接受商品 {}，接受型号 {}，错误 {}，警告 {}，候选 {}",
        report.total_rows,
        report.accepted_products,
        report.accepted_variants,
        report.error_count,
        report.warning_count,
        report.candidates.len()
    );
    for issue in &report.issues {
        match issue.row {
            Some(row) => tracing::warn!(
                "[{:?}] 行 {} 列 {}: {} (原值: {:?})",
                issue.severity,
                row,
                issue.column,
                issue.message,
                issue.raw_value
            ),
            None => tracing::warn!("[{:?}] {}", issue.severity, issue.message),
        }
    }
    for candidate in &report.candidates {
        tracing::info!(
            "候选 {}: {} ({}，来源行 {:?})",
            candidate.kind.as_str(),
            candidate.slug,
            candidate.name,
            candidate.rows
        );
    }

    let committable = matches!(
        report.status,
        ValidationStatus::Passed | ValidationStatus::PassedWithWarnings
    ) || (args.options.allow_partial && report.snapshot.is_some());

    if !args.commit {
        return Ok(if committable {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }
    if !committable {
        tracing::error!("校验未通过，拒绝提交");
        return Ok(ExitCode::FAILURE);
    }

    let commit_engine = CommitEngine::new(conn);
    let commit_report = commit_engine.commit(&report.job_id, &args.options).await?;

    tracing::info!("提交结果: {:?}", commit_report.status);
    tracing::info!(
        "品牌 +{}，分类 +{}，系列 +{}，商品 +{}/~{}，型号 +{}/~{}，核验 {}/{} 通过",
        commit_report.tally.brands_created,
        commit_report.tally.categories_created,
        commit_report.tally.series_created,
        commit_report.tally.products_created,
        commit_report.tally.products_updated,
        commit_report.tally.variants_created,
        commit_report.tally.variants_updated,
        commit_report.verification.checked - commit_report.verification.missing.len(),
        commit_report.verification.checked
    );

    Ok(match commit_report.status {
        catalog_import::CommitStatus::Success | catalog_import::CommitStatus::Partial => {
            ExitCode::SUCCESS
        }
        catalog_import::CommitStatus::Failed => ExitCode::FAILURE,
    })
}
