#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(unused_mut)]
#![allow(unused_assignments)]
#![allow(unused_must_use)]

use std::time::Duration;

use dotenv::dotenv;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};

pub mod app;
pub mod app_config;
pub mod error;
pub mod job;
pub mod time_util;
pub mod trading;

/// 本地环境标识，和 APP_ENV 比对
pub const ENVIRONMENT_LOCAL: &str = "LOCAL";

/// 全局任务调度器，init_scheduler 之后可用
pub static SCHEDULER: Lazy<Mutex<Option<JobScheduler>>> = Lazy::new(|| Mutex::new(None));

/// 基础初始化：环境变量、日志、数据库连接池
pub async fn app_init() -> anyhow::Result<()> {
    dotenv().ok();
    app_config::log::setup_logging().await?;
    app_config::db::init_db().await;
    Ok(())
}

/// 创建全局调度器实例
pub async fn init_scheduler() -> anyhow::Result<()> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("创建任务调度器失败: {}", e))?;
    let mut guard = SCHEDULER.lock().await;
    *guard = Some(scheduler);
    info!("任务调度器初始化完成");
    Ok(())
}

/// 启动全局调度器，开始触发已注册任务
pub async fn start_scheduler() -> anyhow::Result<()> {
    let mut guard = SCHEDULER.lock().await;
    let scheduler = guard
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("调度器未初始化"))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("启动任务调度器失败: {}", e))?;
    info!("任务调度器已启动");
    Ok(())
}

/// 停止并移除全局调度器
pub async fn shutdown_scheduler() -> anyhow::Result<()> {
    let mut guard = SCHEDULER.lock().await;
    if let Some(mut scheduler) = guard.take() {
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("关闭任务调度器失败: {}", e))?;
        info!("任务调度器已停止");
    }
    Ok(())
}

/// 优雅关闭各阶段的超时配置（秒）
#[derive(Debug, Clone)]
pub struct GracefulShutdownConfig {
    pub total_timeout_secs: u64,
    pub audit_flush_timeout_secs: u64,
    pub scheduler_shutdown_timeout_secs: u64,
    pub db_cleanup_timeout_secs: u64,
}

/// 按配置执行关闭流程：停调度器、等数据库在途请求归还
pub async fn graceful_shutdown_with_config(config: GracefulShutdownConfig) -> anyhow::Result<()> {
    let total = Duration::from_secs(config.total_timeout_secs);

    let shutdown_flow = async {
        // 1. 关闭调度器（带超时）
        let scheduler_result = tokio::time::timeout(
            Duration::from_secs(config.scheduler_shutdown_timeout_secs),
            shutdown_scheduler(),
        )
        .await;
        match scheduler_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("关闭调度器失败: {}", e),
            Err(_) => error!(
                "关闭调度器超时 ({}秒)",
                config.scheduler_shutdown_timeout_secs
            ),
        }

        // 2. 预留数据库在途请求的归还窗口，连接池随进程退出释放
        let db_grace =
            Duration::from_millis(500).min(Duration::from_secs(config.db_cleanup_timeout_secs));
        tokio::time::sleep(db_grace).await;

        Ok::<(), anyhow::Error>(())
    };

    match tokio::time::timeout(total, shutdown_flow).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "优雅关闭总超时 ({}秒)",
            config.total_timeout_secs
        )),
    }
}
