use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志初始化和批次汇总输出的辅助函数
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::models::{BatchResult, UsageStats};

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则 `verbose` 时为 debug，默认 info。
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("初始化日志失败")?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发数
/// - `threshold`: 高质量阈值
pub fn log_startup(max_concurrent: usize, threshold: f64) {
    info!("{}", "=".repeat(60));
    info!("🚀 图片质量评估启动");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🎯 高质量阈值: {}", threshold);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(result: &BatchResult, report_path: &str) {
    let summary = result.summary();
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 高质量: {}/{}", summary.high_quality, summary.total);
    info!("⬇️  低质量: {}", summary.low_quality);
    info!("❌ 失败: {}", summary.failed);
    info!("{}", "=".repeat(60));

    for outcome in result.sorted_by_score() {
        let label = match (outcome.score, outcome.error_message()) {
            (Some(score), _) => format!("{:.3}", score),
            (None, Some(message)) => format!("失败 - {}", message),
            (None, None) => "-".to_string(),
        };
        let marker = if outcome.is_high_quality { "✓" } else { " " };
        info!("{} {} {}", marker, truncate_text(&outcome.name, 48), label);
    }

    info!("\n报告已保存至: {}", report_path);
}

/// 打印用量
pub fn print_usage(stats: &UsageStats) {
    info!("{}", "─".repeat(60));
    info!(
        "📈 本月 API 调用: {}/{} (剩余 {})",
        stats.total_api_calls,
        stats.monthly_limit,
        stats.remaining_calls()
    );
    info!("🖼️  累计处理图片: {}", stats.total_items_processed);
    info!(
        "🔄 上次重置: {}",
        stats.last_reset.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
