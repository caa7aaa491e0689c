use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_config::env::env_parse;
use crate::error::AppError;
use crate::time_util;
use crate::trading::market::price_cache::PriceSource;
use crate::trading::market::snapshot::build_snapshot;
use crate::trading::market_calendar;
use crate::trading::model::account::AccountEntity;
use crate::trading::model::instrument::InstrumentEntity;
use crate::trading::openai::CompletionProvider;
use crate::trading::persona::decision;
use crate::trading::services::audit_service::{make_trading_log, AuditService};
use crate::trading::services::trade_service::{TradeOutcome, TradeService};
use crate::trading::store::LedgerStore;

/// 相邻角色之间的默认间隔毫秒数，压低模型与行情接口的瞬时压力
pub const DEFAULT_PERSONA_DELAY_MS: u64 = 500;
/// 整批默认预算秒数，超时放弃剩余角色，场次按部分完成收尾
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 55;

/// 批处理依赖集合，全部按接口注入
pub struct TradingContext {
    pub store: Arc<dyn LedgerStore>,
    pub prices: Arc<dyn PriceSource>,
    pub completions: Arc<dyn CompletionProvider>,
    pub audit: Arc<AuditService>,
}

/// 单个角色的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct PersonaReport {
    pub investor: String,
    /// BUY | SELL | HOLD，角色级硬错误时为 None
    pub action: Option<String>,
    pub ticker: Option<String>,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// 一个场次批处理的汇总
#[derive(Debug, Serialize)]
pub enum BatchReport {
    /// 休市或场次已被执行过
    Skipped { reason: String },
    Completed {
        run_id: i64,
        run_date: String,
        session: String,
        completed: i64,
        failed: i64,
        results: Vec<PersonaReport>,
    },
}

/// 执行一个完整交易场次
///
/// 流程: 休市预检 -> 场次认领 -> 逐角色"重读余额/快照/决策/执行/审计"。
/// 认领成功后无论中途发生什么都会给场次行一个终态，
/// 只要有任何一次决策走完执行就按 DONE 收尾，全军覆没才记 FAILED。
pub async fn run_all(ctx: &TradingContext, triggered_by: &str) -> anyhow::Result<BatchReport> {
    let (date, session) = time_util::current_slot(Utc::now());
    if let Some(holiday) = market_calendar::market_closed_reason(date) {
        info!("[AI Trading] Skipping - US market closed for {}", holiday);
        return Ok(BatchReport::Skipped { reason: format!("US market closed: {}", holiday) });
    }

    let run_date = date.format("%Y-%m-%d").to_string();
    let run_id = match ctx.store.begin_slot(&run_date, session.as_str()).await? {
        Some(id) => id,
        None => {
            info!("[AI Trading] 场次已执行过 {} {}", run_date, session.as_str());
            return Ok(BatchReport::Skipped {
                reason: format!("slot {} {} already executed", run_date, session.as_str()),
            });
        }
    };

    let batch_id = Uuid::new_v4();
    info!(
        "[AI Trading] ===== 场次开始 batch_id={} run_id={} {} {} triggered_by={} =====",
        batch_id,
        run_id,
        run_date,
        session.as_str(),
        triggered_by
    );

    match run_batch(ctx, triggered_by).await {
        Ok((results, completed, failed)) => {
            let slot_error = if completed == 0 && failed > 0 {
                Some(format!("all {} persona attempts failed", failed))
            } else {
                None
            };
            ctx.store
                .complete_slot(run_id, completed, slot_error.as_deref())
                .await?;
            info!(
                "[AI Trading] ===== 场次结束 run_id={} completed={} failed={} =====",
                run_id, completed, failed
            );
            Ok(BatchReport::Completed {
                run_id,
                run_date,
                session: session.as_str().to_string(),
                completed,
                failed,
                results,
            })
        }
        Err(e) => {
            // 角色循环之外的故障，场次记 FAILED 后原样上抛
            let msg = format!("batch aborted: {}", e);
            if let Err(complete_err) = ctx.store.complete_slot(run_id, 0, Some(&msg)).await {
                error!("场次收尾失败 run_id={}: {}", run_id, complete_err);
            }
            Err(e)
        }
    }
}

async fn run_batch(
    ctx: &TradingContext,
    triggered_by: &str,
) -> anyhow::Result<(Vec<PersonaReport>, i64, i64)> {
    let instruments = ctx.store.tradable_instruments().await?;
    if instruments.is_empty() {
        return Err(AppError::BizError("没有可交易标的".to_string()).into());
    }
    let accounts = ctx.store.active_ai_accounts().await?;
    info!(
        "[AI Trading] 本场次角色数={} 标的数={}",
        accounts.len(),
        instruments.len()
    );

    let trade_service = TradeService::new(ctx.store.clone(), ctx.prices.clone());
    let delay_ms = env_parse("PERSONA_DELAY_MS", DEFAULT_PERSONA_DELAY_MS);
    let timeout_secs = env_parse("BATCH_TIMEOUT_SECS", DEFAULT_BATCH_TIMEOUT_SECS);
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    let mut results = Vec::with_capacity(accounts.len());
    let mut completed: i64 = 0;
    let mut failed: i64 = 0;

    for (idx, account) in accounts.iter().enumerate() {
        if Instant::now() >= deadline {
            warn!(
                "[AI Trading] 批处理超出 {}s 预算，剩余 {} 个角色顺延到下一场次",
                timeout_secs,
                accounts.len() - idx
            );
            break;
        }

        match process_persona(ctx, &trade_service, account, &instruments, triggered_by).await {
            Ok((report, executed)) => {
                if executed {
                    completed += 1;
                } else {
                    failed += 1;
                }
                results.push(report);
            }
            Err(e) => {
                // 单角色失败只记报告，不拖垮整批
                error!("[AI Trading] Error processing {}: {}", account.display_name, e);
                failed += 1;
                results.push(PersonaReport {
                    investor: account.display_name.clone(),
                    action: None,
                    ticker: None,
                    success: false,
                    message: e.to_string(),
                    error: Some(e.to_string()),
                });
            }
        }

        if idx + 1 < accounts.len() {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Ok((results, completed, failed))
}

/// 处理单个角色，返回 (报告, 决策是否走完执行)
///
/// 模型调用失败的 HOLD 不进入执行，记作失败且不计入场次完成数。
async fn process_persona(
    ctx: &TradingContext,
    trade_service: &TradeService,
    account: &AccountEntity,
    instruments: &[InstrumentEntity],
    triggered_by: &str,
) -> anyhow::Result<(PersonaReport, bool)> {
    info!("[AI Trading] Processing: {} ({})", account.display_name, account.user_id);

    // 决策前重读余额，同场次内更早的成交必须反映进提示词
    let fresh = ctx
        .store
        .account_by_user_id(&account.user_id)
        .await?
        .ok_or_else(|| AppError::BizError(format!("账户 {} 不存在", account.user_id)))?;
    let holdings = ctx.store.open_holdings(&fresh.user_id).await?;
    let snapshot = build_snapshot(&fresh, instruments, &holdings, ctx.prices.as_ref()).await;
    info!(
        "[AI Trading] {} fresh balance: ${:.2}, holdings value: ${:.2}",
        fresh.display_name, fresh.available_tokens, snapshot.holdings_value
    );

    let outcome = decision::decide(&fresh, &snapshot, ctx.completions.as_ref()).await;
    let executed = !outcome.provider_failed;
    let result = if outcome.provider_failed {
        info!(
            "[AI Trading] {} decision: {} (API ERROR)",
            fresh.display_name,
            outcome.decision.action_str()
        );
        TradeOutcome {
            success: false,
            message: outcome.decision.rationale().to_string(),
            balance_before: fresh.available_tokens,
            balance_after: fresh.available_tokens,
            price_used: None,
            amount: None,
            realized_gain: None,
        }
    } else {
        info!("[AI Trading] {} decision: {}", fresh.display_name, outcome.decision.action_str());
        trade_service.execute(&fresh, &outcome.decision, &snapshot).await?
    };

    info!(
        "[AI Trading] {} result: {} - {}",
        fresh.display_name,
        if result.success { "SUCCESS" } else { "FAILED" },
        result.message
    );
    ctx.audit
        .record(make_trading_log(&fresh, snapshot.holdings_value, &outcome, &result, triggered_by));

    let ticker = outcome
        .decision
        .pitch_id()
        .and_then(|id| snapshot.quoted(id).map(|q| q.info.ticker.clone()));
    let report = PersonaReport {
        investor: fresh.display_name.clone(),
        action: Some(outcome.decision.action_str().to_string()),
        ticker,
        success: result.success,
        message: result.message.clone(),
        error: if result.success { None } else { Some(result.message) },
    };
    Ok((report, executed))
}

/// 只跑单个 AI 账户，手动验证用，不走场次认领也不做休市预检
pub async fn run_one(ctx: &TradingContext, user_id: &str) -> anyhow::Result<PersonaReport> {
    let account = ctx
        .store
        .account_by_user_id(user_id)
        .await?
        .ok_or_else(|| AppError::BizError(format!("账户 {} 不存在", user_id)))?;
    if account.is_ai_investor != 1 {
        return Err(AppError::BizError(format!("账户 {} 不是 AI 角色", user_id)).into());
    }
    let instruments = ctx.store.tradable_instruments().await?;
    if instruments.is_empty() {
        return Err(AppError::BizError("没有可交易标的".to_string()).into());
    }
    let trade_service = TradeService::new(ctx.store.clone(), ctx.prices.clone());
    let (report, _) = process_persona(ctx, &trade_service, &account, &instruments, "manual").await?;
    Ok(report)
}
