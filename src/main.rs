use clap::{Parser, Subcommand};

use unicorn_trading::app::bootstrap;
use unicorn_trading::trading::task::{price_sync_job, trading_job};

#[derive(Parser)]
#[command(name = "unicorn_trading", version, about = "HM14 模拟盘 AI 交易服务")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 常驻运行：注册早晚场次定时任务并等待触发
    Daemon,
    /// 立即执行一场全量批处理
    RunAll {
        /// 触发来源，写入审计日志
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// 只对单个 AI 账户执行一次决策
    RunOne {
        #[arg(long)]
        user_id: String,
    },
    /// 同步一轮数据库参考价
    SyncPrices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    unicorn_trading::app_init().await?;

    match cli.command.unwrap_or(Command::Daemon) {
        Command::Daemon => bootstrap::run().await?,
        Command::RunAll { source } => {
            let ctx = bootstrap::build_context().await?;
            let report = trading_job::run_all(&ctx, &source).await?;
            ctx.audit.flush().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::RunOne { user_id } => {
            let ctx = bootstrap::build_context().await?;
            let report = trading_job::run_one(&ctx, &user_id).await?;
            ctx.audit.flush().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SyncPrices => {
            let ctx = bootstrap::build_context().await?;
            let report =
                price_sync_job::sync_reference_prices(ctx.store.as_ref(), ctx.prices.as_ref())
                    .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
