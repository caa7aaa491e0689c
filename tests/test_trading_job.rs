mod common;

use std::sync::Arc;

use common::{ai_account, holding, instrument, FakePrices, ScriptedCompletion};
use unicorn_trading::trading::services::audit_service::AuditService;
use unicorn_trading::trading::store::memory_store::MemoryLedgerStore;
use unicorn_trading::trading::store::LedgerStore;
use unicorn_trading::trading::task::trading_job::{self, BatchReport, TradingContext};

fn context_with(
    store: Arc<MemoryLedgerStore>,
    prices: FakePrices,
    completions: Arc<ScriptedCompletion>,
) -> TradingContext {
    TradingContext {
        store: store.clone(),
        prices: Arc::new(prices),
        completions,
        audit: Arc::new(AuditService::start(store)),
    }
}

#[tokio::test]
async fn test_run_one_executes_buy_and_audits() {
    let store = Arc::new(MemoryLedgerStore::new());
    store
        .seed_account(ai_account("ai_1", "YOLO Kid", "ALL_IN", 10_000.0))
        .await;
    store
        .seed_instrument(instrument(1, "Meta Platforms", "META", 50.0))
        .await;
    let completions = Arc::new(ScriptedCompletion::new().with_response(
        r#"{"action": "BUY", "pitch_id": 1, "shares": 20, "reasoning": "Strong fundamentals"}"#,
    ));
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("META", 50.0),
        completions.clone(),
    );

    let report = trading_job::run_one(&ctx, "ai_1").await.unwrap();
    ctx.audit.flush().await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.investor, "YOLO Kid");
    assert_eq!(report.action.as_deref(), Some("BUY"));
    assert_eq!(report.ticker.as_deref(), Some("META"));
    assert!(report.message.contains("bought 20.00 shares"), "{}", report.message);

    // 账本落账
    let account = store.account_snapshot("ai_1").await.unwrap();
    assert_eq!(account.available_tokens, 9_000.0);
    let position = store.holding_snapshot("ai_1", 1).await.unwrap();
    assert_eq!(position.shares_owned, 20.0);

    // 审计行带完整提示词与原始应答
    let logs = store.logs_of("ai_1").await;
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.decision_action, "BUY");
    assert_eq!(log.decision_pitch_id, Some(1));
    assert_eq!(log.decision_shares, Some(20.0));
    assert_eq!(log.execution_success, 1);
    assert!(log.execution_error.is_none());
    assert_eq!(log.triggered_by, "manual");
    assert!(log.openai_prompt.contains("[Pitch ID: 1]"), "prompt was not captured");
    assert!(log.openai_response_raw.contains("Strong fundamentals"));

    // 模型收到的正是入库的那份提示词
    let prompts = completions.captured_user_prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], log.openai_prompt);
}

#[tokio::test]
async fn test_provider_failure_becomes_hold_and_is_audited() {
    let store = Arc::new(MemoryLedgerStore::new());
    store
        .seed_account(ai_account("ai_2", "The Boomer", "CONSERVATIVE", 5_000.0))
        .await;
    store
        .seed_instrument(instrument(1, "Meta Platforms", "META", 50.0))
        .await;
    let completions = Arc::new(ScriptedCompletion::new().with_failure("HTTP 500 from provider"));
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("META", 50.0),
        completions,
    );

    let report = trading_job::run_one(&ctx, "ai_2").await.unwrap();
    ctx.audit.flush().await;

    // 模型失败兜底为 HOLD，且按失败上报
    assert!(!report.success);
    assert_eq!(report.action.as_deref(), Some("HOLD"));
    assert!(report.message.contains("Technical difficulties"), "{}", report.message);

    // 不产生任何交易
    assert!(store.transactions_of("ai_2").await.is_empty());
    let account = store.account_snapshot("ai_2").await.unwrap();
    assert_eq!(account.available_tokens, 5_000.0);

    // 审计行记录失败与错误原文
    let logs = store.logs_of("ai_2").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].decision_action, "HOLD");
    assert_eq!(logs[0].execution_success, 0);
    assert!(logs[0].openai_response_raw.contains("HTTP 500 from provider"));
    assert!(logs[0].execution_error.is_some());
}

#[tokio::test]
async fn test_buy_without_shares_converts_to_hold() {
    let store = Arc::new(MemoryLedgerStore::new());
    store
        .seed_account(ai_account("ai_3", "Momentum Mike", "MOMENTUM", 5_000.0))
        .await;
    store
        .seed_instrument(instrument(1, "Meta Platforms", "META", 50.0))
        .await;
    let completions = Arc::new(ScriptedCompletion::new().with_response(
        r#"{"action": "BUY", "pitch_id": 1, "reasoning": "Buy it all"}"#,
    ));
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("META", 50.0),
        completions,
    );

    let report = trading_job::run_one(&ctx, "ai_3").await.unwrap();
    ctx.audit.flush().await;

    // 缺 shares 的 BUY 清洗为 HOLD，保留转换说明
    assert!(report.success);
    assert_eq!(report.action.as_deref(), Some("HOLD"));
    assert_eq!(report.message, "Holding position");

    let logs = store.logs_of("ai_3").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].decision_action, "HOLD");
    assert!(
        logs[0]
            .decision_reasoning
            .contains("(Converted from BUY - no shares specified)"),
        "{}",
        logs[0].decision_reasoning
    );
    assert!(store.transactions_of("ai_3").await.is_empty());
}

#[tokio::test]
async fn test_sell_pipeline_realizes_gain() {
    let store = Arc::new(MemoryLedgerStore::new());
    let mut account = ai_account("ai_4", "Steady Eddie", "MODERATE", 1_000.0);
    account.total_invested = 5_000.0;
    store.seed_account(account).await;
    store
        .seed_instrument(instrument(3, "Airbnb", "ABNB", 55.0))
        .await;
    store.seed_holding(holding("ai_4", 3, 100.0, 5_000.0)).await;
    let completions = Arc::new(ScriptedCompletion::new().with_response(
        r#"{"action": "SELL", "pitch_id": 3, "shares": 40, "reasoning": "Take profits"}"#,
    ));
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("ABNB", 60.0),
        completions,
    );

    let report = trading_job::run_one(&ctx, "ai_4").await.unwrap();
    ctx.audit.flush().await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.action.as_deref(), Some("SELL"));
    assert!(report.message.contains("sold 40.00 shares"), "{}", report.message);

    let account = store.account_snapshot("ai_4").await.unwrap();
    assert_eq!(account.available_tokens, 3_400.0);
    assert_eq!(account.total_invested, 3_000.0);

    let logs = store.logs_of("ai_4").await;
    assert_eq!(logs[0].decision_action, "SELL");
    assert_eq!(logs[0].decision_shares, Some(40.0));
    // 决策时的持仓市值 = 100 股 * $60
    assert_eq!(logs[0].portfolio_value_before, 6_000.0);
}

/// run_all 以真实时钟推导场次，用例按当天开闭市各验证一条路径：
/// 交易日第一场完成、第二场必须跳过；休市日两场都跳过且不留场次行。
#[tokio::test]
async fn test_run_all_never_executes_same_slot_twice() {
    let store = Arc::new(MemoryLedgerStore::new());
    store
        .seed_account(ai_account("ai_a", "YOLO Kid", "ALL_IN", 5_000.0))
        .await;
    store
        .seed_instrument(instrument(1, "Meta Platforms", "META", 50.0))
        .await;
    let completions = Arc::new(
        ScriptedCompletion::new().with_response(r#"{"action": "HOLD", "reasoning": "waiting"}"#),
    );
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("META", 50.0),
        completions,
    );

    let first = trading_job::run_all(&ctx, "cron").await.unwrap();
    let second = trading_job::run_all(&ctx, "cron").await.unwrap();

    match first {
        BatchReport::Skipped { ref reason } => {
            assert!(reason.contains("US market closed"), "{}", reason);
            assert!(store.slot_rows().await.is_empty());
            assert!(matches!(second, BatchReport::Skipped { .. }));
        }
        BatchReport::Completed { completed, failed, .. } => {
            assert_eq!(completed, 1);
            assert_eq!(failed, 0);
            match second {
                BatchReport::Skipped { reason } => {
                    assert!(reason.contains("already executed"), "{}", reason);
                }
                other => panic!("second run must be skipped: {:?}", other),
            }
            let rows = store.slot_rows().await;
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].status, "DONE");
            assert_eq!(rows[0].trade_count, 1);
        }
    }
}

#[tokio::test]
async fn test_run_one_rejects_non_ai_account() {
    let store = Arc::new(MemoryLedgerStore::new());
    let mut human = ai_account("human_1", "Real Person", "MODERATE", 1_000.0);
    human.is_ai_investor = 0;
    store.seed_account(human).await;
    store
        .seed_instrument(instrument(1, "Meta Platforms", "META", 50.0))
        .await;
    let ctx = context_with(
        store.clone(),
        FakePrices::new().with("META", 50.0),
        Arc::new(ScriptedCompletion::new()),
    );

    let err = trading_job::run_one(&ctx, "human_1").await;
    assert!(err.is_err());

    let err = trading_job::run_one(&ctx, "nobody").await;
    assert!(err.is_err());
}
