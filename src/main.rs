use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image_quality_gate::orchestrator::{FileInput, PipelineRun, QualityPipeline};
use image_quality_gate::services::{
    ArchiveBundler, CredentialStore, Credentials, FileCredentialStore, FirstColumnParser,
    HeaderLinkParser, MemoryCredentialStore, SpreadsheetParser, UsageTracker, ZipBundler,
};
use image_quality_gate::utils::{logging, QualityReport};
use image_quality_gate::{Config, ProcessingProgress, SightengineClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 命令行入口
#[derive(Parser, Debug)]
#[command(name = "image-quality-gate")]
#[command(version)]
#[command(about = "批量评估图片质量，筛选高质量图片")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 评估本地图片文件
    Files {
        /// 图片路径
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// 把高质量图片打包成 zip
        #[arg(long)]
        zip: bool,
    },
    /// 评估一组图片链接
    Urls {
        /// 图片 URL
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long)]
        zip: bool,
    },
    /// 从表格中提取图片链接并评估
    Sheet {
        /// 表格文件路径（xlsx / xls / ods）
        path: PathBuf,
        /// 读取表头包含该文字的列中的超链接（默认读取第一列文字）
        #[arg(long)]
        header: Option<String>,
        /// 按配置中的 header_substring 读取超链接
        #[arg(long, conflicts_with = "header")]
        links: bool,
        #[arg(long)]
        zip: bool,
    },
    /// API 凭据管理
    Credentials(CredentialsCommands),
    /// 用量统计
    Usage(UsageCommands),
}

#[derive(Args, Debug)]
struct CredentialsCommands {
    #[command(subcommand)]
    action: CredentialsActions,
}

#[derive(Subcommand, Debug)]
enum CredentialsActions {
    /// 保存凭据
    Set { api_user: String, api_secret: String },
    /// 删除凭据
    Clear,
    /// 查看当前凭据
    Show,
}

#[derive(Args, Debug)]
struct UsageCommands {
    #[command(subcommand)]
    action: UsageActions,
}

#[derive(Subcommand, Debug)]
enum UsageActions {
    /// 查看本月用量与最近记录
    Show {
        /// 显示的历史条数
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// 清零本月用量
    Reset,
    /// 设置每月调用上限
    Limit { value: u64 },
    /// 清空历史记录
    ClearHistory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref()).context("加载配置失败")?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging)?;

    match cli.command {
        Commands::Files { paths, zip } => {
            let files = read_files(&paths).await?;
            let pipeline = build_pipeline(&config)?;
            let cancel = cancel_on_ctrl_c();
            let run = pipeline
                .assess_files(files, log_progress, Some(&cancel))
                .await?;
            finish(&config, &run, &[], zip).await?;
        }
        Commands::Urls { urls, zip } => {
            let pipeline = build_pipeline(&config)?;
            let cancel = cancel_on_ctrl_c();
            let run = pipeline
                .assess_urls(urls, log_progress, Some(&cancel))
                .await?;
            finish(&config, &run, &[], zip).await?;
        }
        Commands::Sheet {
            path,
            header,
            links,
            zip,
        } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("读取表格失败: {}", path.display()))?;
            let parser: Box<dyn SpreadsheetParser> = match (header, links) {
                (Some(substring), _) => Box::new(HeaderLinkParser::new(substring)),
                (None, true) => Box::new(HeaderLinkParser::new(config.header_substring.clone())),
                (None, false) => Box::new(FirstColumnParser::new()),
            };
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());

            let pipeline = build_pipeline(&config)?;
            let cancel = cancel_on_ctrl_c();
            let sheet_run = pipeline
                .assess_spreadsheet(
                    &bytes,
                    parser.as_ref(),
                    file_name.as_deref(),
                    log_progress,
                    Some(&cancel),
                )
                .await?;
            finish(&config, &sheet_run.run, &sheet_run.invalid_entries, zip).await?;
        }
        Commands::Credentials(cmd) => handle_credentials(&config, cmd.action)?,
        Commands::Usage(cmd) => handle_usage(&config, cmd.action)?,
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<QualityPipeline> {
    logging::log_startup(config.max_concurrent_requests, config.quality_threshold);

    let api = Arc::new(SightengineClient::new(config));
    let usage = Arc::new(UsageTracker::open(&config.usage_file, config.monthly_limit)?);
    Ok(QualityPipeline::new(
        config.clone(),
        api,
        credential_store(config),
        usage,
    ))
}

/// 优先使用凭据文件，没有时使用环境变量中的凭据
fn credential_store(config: &Config) -> Arc<dyn CredentialStore> {
    let file_store = FileCredentialStore::new(&config.credentials_file);
    if !file_store.has_credentials() {
        if let Some(credentials) = Credentials::from_env() {
            info!("使用环境变量中的 API 凭据");
            return Arc::new(MemoryCredentialStore::with_credentials(credentials));
        }
    }
    Arc::new(file_store)
}

/// Ctrl+C 后当前批次跑完即停止
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，当前批次完成后停止");
            token.cancel();
        }
    });
    cancel
}

fn log_progress(progress: &ProcessingProgress) {
    info!(
        "⏳ 进度: {}/{} ({:.0}%)",
        progress.completed_count,
        progress.total_items,
        progress.percent()
    );
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<FileInput>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("读取文件失败: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        files.push(FileInput::new(name, mime_type, bytes));
    }
    Ok(files)
}

/// 写报告、打印汇总，按需打包
async fn finish(config: &Config, run: &PipelineRun, invalid_entries: &[String], zip: bool) -> Result<()> {
    QualityReport::new(
        &run.result,
        config.quality_threshold,
        invalid_entries,
        run.usage.as_ref(),
    )
    .write_to(Path::new(&config.output_report_file))?;
    logging::print_final_stats(&run.result, &config.output_report_file);

    if !zip {
        return Ok(());
    }

    let items = run.archive_items();
    if items.is_empty() {
        warn!("没有高质量图片，跳过打包");
        return Ok(());
    }

    let bundler = ZipBundler::new(config.request_timeout());
    let archive = bundler.bundle(&items).await?;
    tokio::fs::write(&config.archive_file, archive)
        .await
        .with_context(|| format!("写入压缩包失败: {}", config.archive_file))?;
    info!("📦 已保存 {} 张高质量图片至 {}", items.len(), config.archive_file);
    Ok(())
}

fn handle_credentials(config: &Config, action: CredentialsActions) -> Result<()> {
    let store = FileCredentialStore::new(&config.credentials_file);
    match action {
        CredentialsActions::Set {
            api_user,
            api_secret,
        } => {
            store.set(Credentials::new(api_user, api_secret))?;
            println!("凭据已保存至 {}", store.path().display());
        }
        CredentialsActions::Clear => {
            store.clear()?;
            println!("凭据已删除");
        }
        CredentialsActions::Show => match store.get().or_else(Credentials::from_env) {
            Some(credentials) => {
                println!("API User: {}", credentials.api_user);
                println!("API Secret: {}", mask(&credentials.api_secret));
            }
            None => println!("未配置 API 凭据"),
        },
    }
    Ok(())
}

fn handle_usage(config: &Config, action: UsageActions) -> Result<()> {
    let tracker = UsageTracker::open(&config.usage_file, config.monthly_limit)?;
    match action {
        UsageActions::Show { limit } => {
            logging::print_usage(&tracker.stats());
            if tracker.is_limit_exceeded() {
                warn!("⚠️  本月调用次数已达上限");
            } else if tracker.is_approaching_limit() {
                warn!("⚠️  本月调用次数即将用完");
            }
            for record in tracker.history().iter().take(limit) {
                println!(
                    "{}  {:<12} 调用 {:>4}  图片 {:>4}  {}",
                    record
                        .timestamp
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S"),
                    record.source.as_str(),
                    record.api_calls_used,
                    record.items_processed,
                    record.file_name.as_deref().unwrap_or("")
                );
            }
        }
        UsageActions::Reset => {
            tracker.reset_monthly()?;
            println!("本月用量已清零");
        }
        UsageActions::Limit { value } => {
            tracker.set_monthly_limit(value)?;
            println!("每月调用上限已设为 {}", value);
        }
        UsageActions::ClearHistory => {
            tracker.clear_history()?;
            println!("历史记录已清空");
        }
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}{}", visible, "*".repeat(secret.chars().count().saturating_sub(4)))
}
