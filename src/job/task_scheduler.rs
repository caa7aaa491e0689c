//! 场次定时调度
//!
//! 与具体交易流程解耦：这里只负责把两个场次的批处理任务
//! 挂到全局调度器上，含注册重试与错误处理。

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::Job;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_config::env::env_or_default;
use crate::trading::task::trading_job::{self, TradingContext};

/// 调度错误类型
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("调度器未初始化")]
    NotInitialized,

    #[error("任务创建失败: {reason}")]
    JobCreationFailed { reason: String },

    #[error("任务注册失败: {reason}")]
    JobRegistrationFailed { reason: String },
}

/// 两个交易场次的默认触发点(UTC)，对应美东 9:30 与 15:30
pub const MORNING_CRON: &str = "0 30 14 * * *";
pub const AFTERNOON_CRON: &str = "0 30 20 * * *";

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// 创建一个场次任务
pub fn create_session_job(
    label: &'static str,
    cron: String,
    ctx: Arc<TradingContext>,
) -> Result<Job, SchedulerError> {
    debug!("创建场次任务: label={} cron={}", label, cron);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            match trading_job::run_all(&ctx, "cron").await {
                Ok(_) => {
                    info!("场次任务执行完成: {}", label);
                }
                Err(e) => {
                    error!("场次任务执行失败: {} 错误: {}", label, e);
                }
            }
        })
    })
    .map_err(|e| SchedulerError::JobCreationFailed {
        reason: format!("创建场次任务失败: {}", e),
    })?;
    debug!("场次任务创建成功: {}", job.guid());
    Ok(job)
}

/// 注册任务到调度器（带重试机制）
pub async fn register_job(job: Job) -> Result<Uuid, SchedulerError> {
    let job_id = job.guid();

    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match try_register_job(job.clone()).await {
            Ok(_) => {
                info!("任务注册成功: {} (尝试次数: {})", job_id, attempt);
                return Ok(job_id);
            }
            Err(e) if attempt < MAX_RETRY_ATTEMPTS => {
                warn!("任务注册失败，第{}次重试: {}", attempt, e);
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
            }
            Err(e) => {
                error!("任务注册最终失败: {}", e);
                return Err(e);
            }
        }
    }

    Err(SchedulerError::JobRegistrationFailed {
        reason: "达到最大重试次数".to_string(),
    })
}

async fn try_register_job(job: Job) -> Result<(), SchedulerError> {
    let scheduler_guard = crate::SCHEDULER.lock().await;
    let scheduler = scheduler_guard
        .as_ref()
        .ok_or(SchedulerError::NotInitialized)?;

    scheduler
        .add(job)
        .await
        .map_err(|e| SchedulerError::JobRegistrationFailed {
            reason: format!("添加任务到调度器失败: {}", e),
        })?;

    Ok(())
}

/// 注册早晚两个场次的定时任务，cron 表达式可用环境变量覆盖
pub async fn register_session_jobs(ctx: Arc<TradingContext>) -> anyhow::Result<()> {
    let morning_cron = env_or_default("TRADING_CRON_MORNING", MORNING_CRON);
    let afternoon_cron = env_or_default("TRADING_CRON_AFTERNOON", AFTERNOON_CRON);

    let morning = create_session_job("morning", morning_cron, Arc::clone(&ctx))?;
    register_job(morning).await?;
    let afternoon = create_session_job("afternoon", afternoon_cron, ctx)?;
    register_job(afternoon).await?;

    info!("场次定时任务注册完成");
    Ok(())
}
