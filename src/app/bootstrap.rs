use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app_config::env::{env_is_true, env_or_default};
use crate::job::task_scheduler;
use crate::time_util;
use crate::trading::market::price_cache::QuoteCache;
use crate::trading::market_calendar;
use crate::trading::openai::get_openai_client;
use crate::trading::services::audit_service::AuditService;
use crate::trading::store::mysql_store::MysqlLedgerStore;
use crate::trading::task::trading_job::TradingContext;
use crate::trading::task::{price_sync_job, trading_job};

/// 组装全部运行时依赖：账本、行情、AI 补全、审计
pub async fn build_context() -> anyhow::Result<Arc<TradingContext>> {
    let store: Arc<MysqlLedgerStore> = Arc::new(MysqlLedgerStore::new().await);
    let prices = Arc::new(QuoteCache::from_env());
    let completions = Arc::new(get_openai_client());
    let audit = Arc::new(AuditService::start(store.clone()));

    Ok(Arc::new(TradingContext {
        store,
        prices,
        completions,
        audit,
    }))
}

/// 运行基于环境变量控制的各个启动模式（参考价同步 / 启动即跑一场）
pub async fn run_modes(ctx: &Arc<TradingContext>) -> anyhow::Result<()> {
    // 1) 启动时同步一轮数据库参考价，行情断供时兜底用
    if env_is_true("IS_RUN_SYNC_PRICES", false) {
        match price_sync_job::sync_reference_prices(ctx.store.as_ref(), ctx.prices.as_ref()).await {
            Ok(report) => info!(
                "参考价同步完成: 共{} 更新{} 失败{}",
                report.total, report.updated, report.failed
            ),
            Err(e) => error!("run sync [reference price] job error: {}", e),
        }
    }

    // 2) 启动即执行一场批处理（调试与补跑用，正常走 cron）
    if env_is_true("IS_RUN_BATCH_ON_START", false) {
        info!("IS_RUN_BATCH_ON_START 已启用");
        match trading_job::run_all(ctx, "manual").await {
            Ok(report) => info!(
                "启动批处理完成: {}",
                serde_json::to_string(&report).unwrap_or_default()
            ),
            Err(e) => error!("启动批处理失败: {}", e),
        }
    }

    Ok(())
}

/// 应用入口总编排：初始化/运行模式/定时注册/心跳/信号/优雅关闭
pub async fn run() -> anyhow::Result<()> {
    // 初始化并启动调度器
    if let Err(e) = crate::init_scheduler().await {
        error!("初始化任务调度器失败: {}", e);
        return Err(anyhow!("初始化任务调度器失败: {}", e));
    }

    let ctx = build_context().await?;

    // 非本地环境打印一次时钟与开闭市状态，便于核对场次触发点
    let app_env = env_or_default("APP_ENV", crate::ENVIRONMENT_LOCAL);
    if app_env != crate::ENVIRONMENT_LOCAL {
        let eastern = time_util::eastern_now();
        match market_calendar::market_closed_reason(eastern.date_naive()) {
            Some(reason) => info!("当前美东时间 {}，今日休市: {}", eastern, reason),
            None => info!("当前美东时间 {}，今日开市", eastern),
        }
    }

    // 运行模式编排（参考价同步 / 启动即跑）
    run_modes(&ctx).await?;

    // 注册早晚场次定时任务并启动调度器
    task_scheduler::register_session_jobs(Arc::clone(&ctx)).await?;
    crate::start_scheduler().await?;

    // 启动心跳任务，定期输出程序运行状态
    let heartbeat_handle = tokio::spawn(async {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let (date, session) = time_util::current_slot(chrono::Utc::now());
            info!(
                "💓 程序正在运行中，等待交易场次... (当前 {} {})",
                date,
                session.as_str()
            );
        }
    });

    // 增强的信号处理 - 支持多种退出信号
    let shutdown_signal = setup_shutdown_signals();
    let signal_name = shutdown_signal.await;

    // 停止心跳任务
    heartbeat_handle.abort();

    // 优雅关闭流程
    info!("接收到 {} 信号，开始优雅关闭...", signal_name);

    // 创建优雅关闭配置
    let shutdown_config = crate::GracefulShutdownConfig {
        total_timeout_secs: 30,
        audit_flush_timeout_secs: 10,
        scheduler_shutdown_timeout_secs: 5,
        db_cleanup_timeout_secs: 5,
    };

    // 1. 刷掉积压的审计记录（带超时）
    let flush_result = tokio::time::timeout(
        Duration::from_secs(shutdown_config.audit_flush_timeout_secs),
        ctx.audit.flush(),
    )
    .await;
    match flush_result {
        Ok(()) => info!("审计记录已全部落库"),
        Err(_) => error!(
            "审计记录刷新超时 ({}秒)",
            shutdown_config.audit_flush_timeout_secs
        ),
    }

    // 2. 执行优雅关闭
    if let Err(e) = crate::graceful_shutdown_with_config(shutdown_config).await {
        error!("优雅关闭失败: {}", e);
        std::process::exit(1);
    }

    info!("应用已优雅退出");
    Ok(())
}

/// 设置多种退出信号处理
async fn setup_shutdown_signals() -> &'static str {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");
        let mut sigquit = signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("Failed to register SIGQUIT handler");

        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sigquit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
        "CTRL+C"
    }
}
