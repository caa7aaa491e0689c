use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use crate::trading::model::account::AccountEntity;
use crate::trading::model::trading_log::TradingLogEntity;
use crate::trading::persona::decision::DecisionOutcome;
use crate::trading::services::trade_service::TradeOutcome;
use crate::trading::store::LedgerStore;

/// 审计队列长度，满了丢弃并告警，不阻塞交易主流程
pub const AUDIT_QUEUE_SIZE: usize = 64;

enum AuditMsg {
    Entry(TradingLogEntity),
    Flush(oneshot::Sender<()>),
}

/// 异步审计服务
///
/// 决策与执行记录经有界队列由后台任务落库，写库失败只告警，
/// 审计永远不反过来影响交易结果。
pub struct AuditService {
    tx: mpsc::Sender<AuditMsg>,
}

impl AuditService {
    pub fn start(store: Arc<dyn LedgerStore>) -> AuditService {
        let (tx, mut rx) = mpsc::channel::<AuditMsg>(AUDIT_QUEUE_SIZE);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    AuditMsg::Entry(entry) => {
                        if let Err(e) = store.append_trading_log(entry).await {
                            error!("审计日志写入失败: {}", e);
                        }
                    }
                    AuditMsg::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    /// 非阻塞入队，队列满或后台任务已退出时丢弃该条并告警
    pub fn record(&self, entry: TradingLogEntity) {
        if self.tx.try_send(AuditMsg::Entry(entry)).is_err() {
            warn!("审计队列不可用，丢弃一条审计记录");
        }
    }

    /// 等待此前入队的记录全部落库，收尾与测试用
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(AuditMsg::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// 把一次"决策 + 执行"压成一行审计记录
pub fn make_trading_log(
    account: &AccountEntity,
    portfolio_value_before: f64,
    outcome: &DecisionOutcome,
    result: &TradeOutcome,
    triggered_by: &str,
) -> TradingLogEntity {
    TradingLogEntity {
        id: None,
        user_id: account.user_id.clone(),
        display_name: account.display_name.clone(),
        ai_strategy: account.ai_strategy.clone(),
        cash_before: account.available_tokens,
        portfolio_value_before,
        openai_prompt: outcome.prompt.clone(),
        openai_response_raw: outcome.raw_response.clone(),
        decision_action: outcome.decision.action_str().to_string(),
        decision_pitch_id: outcome.decision.pitch_id(),
        decision_shares: outcome.decision.shares(),
        decision_reasoning: outcome.decision.rationale().to_string(),
        execution_success: if result.success { 1 } else { 0 },
        execution_error: if result.success { None } else { Some(result.message.clone()) },
        execution_message: result.message.clone(),
        triggered_by: triggered_by.to_string(),
        created_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::persona::decision::TradeDecision;
    use crate::trading::store::memory_store::MemoryLedgerStore;

    fn sample_log(user_id: &str) -> TradingLogEntity {
        TradingLogEntity {
            id: None,
            user_id: user_id.to_string(),
            display_name: "tester".to_string(),
            ai_strategy: Some("MODERATE".to_string()),
            cash_before: 1000.0,
            portfolio_value_before: 0.0,
            openai_prompt: "p".to_string(),
            openai_response_raw: "{}".to_string(),
            decision_action: "HOLD".to_string(),
            decision_pitch_id: None,
            decision_shares: None,
            decision_reasoning: String::new(),
            execution_success: 1,
            execution_error: None,
            execution_message: "Holding position".to_string(),
            triggered_by: "manual".to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_records_drain_to_store_after_flush() {
        let store = Arc::new(MemoryLedgerStore::new());
        let audit = AuditService::start(store.clone());
        audit.record(sample_log("ai_a"));
        audit.record(sample_log("ai_a"));
        audit.flush().await;
        assert_eq!(store.logs_of("ai_a").await.len(), 2);
    }

    #[test]
    fn test_make_trading_log_maps_failure_to_error_column() {
        let account = AccountEntity {
            id: None,
            user_id: "ai_b".to_string(),
            user_email: None,
            display_name: "B".to_string(),
            is_ai_investor: 1,
            is_active: 1,
            ai_strategy: Some("ALL_IN".to_string()),
            ai_catchphrase: None,
            ai_personality_prompt: None,
            total_tokens: 1000.0,
            available_tokens: 400.0,
            total_invested: 600.0,
        };
        let outcome = DecisionOutcome {
            decision: TradeDecision::Buy {
                pitch_id: 3,
                shares: 10.0,
                rationale: "go big".to_string(),
            },
            prompt: "prompt".to_string(),
            raw_response: "{\"action\":\"BUY\"}".to_string(),
            provider_failed: false,
        };
        let result = TradeOutcome {
            success: false,
            message: "B tried to overspend".to_string(),
            balance_before: 400.0,
            balance_after: 400.0,
            price_used: Some(50.0),
            amount: Some(500.0),
            realized_gain: None,
        };
        let log = make_trading_log(&account, 600.0, &outcome, &result, "cron");
        assert_eq!(log.execution_success, 0);
        assert_eq!(log.execution_error.as_deref(), Some("B tried to overspend"));
        assert_eq!(log.decision_action, "BUY");
        assert_eq!(log.decision_pitch_id, Some(3));
        assert_eq!(log.triggered_by, "cron");

        // 成功时 execution_error 置空
        let ok = TradeOutcome { success: true, ..result };
        let log = make_trading_log(&account, 600.0, &outcome, &ok, "cron");
        assert_eq!(log.execution_success, 1);
        assert!(log.execution_error.is_none());
    }
}
