use async_trait::async_trait;
use rbatis::rbdc::datetime::DateTime;
use tokio::sync::Mutex;

use crate::trading::model::account::AccountEntity;
use crate::trading::model::holding::HoldingEntity;
use crate::trading::model::instrument::InstrumentEntity;
use crate::trading::model::run_slot::RunSlotEntity;
use crate::trading::model::trading_log::TradingLogEntity;
use crate::trading::model::transaction::TransactionRecordEntity;
use crate::trading::store::{LedgerStore, TradeApplied, TradeRequest, TradeType};

#[derive(Default)]
struct LedgerState {
    accounts: Vec<AccountEntity>,
    instruments: Vec<InstrumentEntity>,
    holdings: Vec<HoldingEntity>,
    transactions: Vec<TransactionRecordEntity>,
    logs: Vec<TradingLogEntity>,
    slots: Vec<RunSlotEntity>,
    next_id: i64,
}

/// 内存账本，校验与落账语义对齐 MySQL 存储过程
///
/// 整个状态压在一把锁下，一次 execute_trade 就是一个原子单元，
/// 并发下先到先得，余额不会被透支。测试与演练环境使用。
pub struct MemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> MemoryLedgerStore {
        Self {
            state: Mutex::new(LedgerState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub async fn seed_account(&self, account: AccountEntity) {
        self.state.lock().await.accounts.push(account);
    }

    pub async fn seed_instrument(&self, instrument: InstrumentEntity) {
        self.state.lock().await.instruments.push(instrument);
    }

    pub async fn seed_holding(&self, holding: HoldingEntity) {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let mut holding = holding;
        if holding.id.is_none() {
            holding.id = Some(id);
        }
        state.holdings.push(holding);
    }

    pub async fn account_snapshot(&self, user_id: &str) -> Option<AccountEntity> {
        self.state
            .lock()
            .await
            .accounts
            .iter()
            .find(|a| a.user_id == user_id)
            .cloned()
    }

    pub async fn holding_snapshot(&self, user_id: &str, pitch_id: i64) -> Option<HoldingEntity> {
        self.state
            .lock()
            .await
            .holdings
            .iter()
            .find(|h| h.user_id == user_id && h.pitch_id == pitch_id)
            .cloned()
    }

    pub async fn transactions_of(&self, user_id: &str) -> Vec<TransactionRecordEntity> {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn logs_of(&self, user_id: &str) -> Vec<TradingLogEntity> {
        self.state
            .lock()
            .await
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn slot_rows(&self) -> Vec<RunSlotEntity> {
        self.state.lock().await.slots.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn active_ai_accounts(&self) -> anyhow::Result<Vec<AccountEntity>> {
        let mut list: Vec<AccountEntity> = self
            .state
            .lock()
            .await
            .accounts
            .iter()
            .filter(|a| a.is_ai_investor == 1 && a.is_active == 1)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(list)
    }

    async fn account_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<AccountEntity>> {
        Ok(self.account_snapshot(user_id).await)
    }

    async fn tradable_instruments(&self) -> anyhow::Result<Vec<InstrumentEntity>> {
        let mut list = self.state.lock().await.instruments.clone();
        list.sort_by_key(|i| i.pitch_id);
        Ok(list)
    }

    async fn open_holdings(&self, user_id: &str) -> anyhow::Result<Vec<HoldingEntity>> {
        let mut list: Vec<HoldingEntity> = self
            .state
            .lock()
            .await
            .holdings
            .iter()
            .filter(|h| h.user_id == user_id && h.shares_owned > 0.0)
            .cloned()
            .collect();
        list.sort_by_key(|h| h.pitch_id);
        Ok(list)
    }

    async fn holding_for(
        &self,
        user_id: &str,
        pitch_id: i64,
    ) -> anyhow::Result<Option<HoldingEntity>> {
        Ok(self.holding_snapshot(user_id, pitch_id).await)
    }

    async fn execute_trade(&self, request: &TradeRequest) -> anyhow::Result<TradeApplied> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let account = match state
            .accounts
            .iter_mut()
            .find(|a| a.user_id == request.user_id)
        {
            Some(a) => a,
            None => {
                return Ok(TradeApplied {
                    success: false,
                    new_balance: 0.0,
                    cost_basis_removed: 0.0,
                    error_message: Some(format!("Account not found: {}", request.user_id)),
                })
            }
        };

        match request.trade_type {
            TradeType::Buy => {
                let cost = request.shares * request.price;
                let balance_before = account.available_tokens;
                if cost > balance_before {
                    return Ok(TradeApplied {
                        success: false,
                        new_balance: balance_before,
                        cost_basis_removed: 0.0,
                        error_message: Some(format!(
                            "Insufficient funds: cost {:.2} exceeds balance {:.2}",
                            cost, balance_before
                        )),
                    });
                }
                account.available_tokens -= cost;
                account.total_invested += cost;
                let balance_after = account.available_tokens;

                if let Some(holding) = state
                    .holdings
                    .iter_mut()
                    .find(|h| h.user_id == request.user_id && h.pitch_id == request.pitch_id)
                {
                    holding.shares_owned += request.shares;
                    holding.total_invested += cost;
                    holding.avg_purchase_price = holding.total_invested / holding.shares_owned;
                } else {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.holdings.push(HoldingEntity {
                        id: Some(id),
                        user_id: request.user_id.clone(),
                        pitch_id: request.pitch_id,
                        shares_owned: request.shares,
                        total_invested: cost,
                        avg_purchase_price: request.price,
                    });
                }

                let id = state.next_id;
                state.next_id += 1;
                state.transactions.push(TransactionRecordEntity {
                    id: Some(id),
                    user_id: request.user_id.clone(),
                    pitch_id: request.pitch_id,
                    transaction_type: "BUY".to_string(),
                    shares: request.shares,
                    price_per_share: request.price,
                    total_amount: cost,
                    balance_before,
                    balance_after,
                    timestamp: Some(DateTime::now()),
                });

                Ok(TradeApplied {
                    success: true,
                    new_balance: balance_after,
                    cost_basis_removed: 0.0,
                    error_message: None,
                })
            }
            TradeType::Sell => {
                let balance_before = account.available_tokens;
                let position = state
                    .holdings
                    .iter()
                    .position(|h| h.user_id == request.user_id && h.pitch_id == request.pitch_id);
                let position = match position {
                    Some(p) if state.holdings[p].shares_owned >= request.shares => p,
                    other => {
                        let held = other.map(|p| state.holdings[p].shares_owned).unwrap_or(0.0);
                        return Ok(TradeApplied {
                            success: false,
                            new_balance: balance_before,
                            cost_basis_removed: 0.0,
                            error_message: Some(format!(
                                "Insufficient shares: has {}, tried to sell {}",
                                held, request.shares
                            )),
                        });
                    }
                };

                let proceeds = request.shares * request.price;
                let sold_portion = request.shares / state.holdings[position].shares_owned;
                let basis_removed = state.holdings[position].total_invested * sold_portion;

                account.available_tokens += proceeds;
                account.total_invested -= basis_removed;
                let balance_after = account.available_tokens;

                let remaining = state.holdings[position].shares_owned - request.shares;
                if remaining > 0.0 {
                    let holding = &mut state.holdings[position];
                    holding.shares_owned = remaining;
                    holding.total_invested -= basis_removed;
                } else {
                    // 清仓删行，0 股残行不保留
                    state.holdings.remove(position);
                }

                let id = state.next_id;
                state.next_id += 1;
                state.transactions.push(TransactionRecordEntity {
                    id: Some(id),
                    user_id: request.user_id.clone(),
                    pitch_id: request.pitch_id,
                    transaction_type: "SELL".to_string(),
                    shares: request.shares,
                    price_per_share: request.price,
                    total_amount: proceeds,
                    balance_before,
                    balance_after,
                    timestamp: Some(DateTime::now()),
                });

                Ok(TradeApplied {
                    success: true,
                    new_balance: balance_after,
                    cost_basis_removed: basis_removed,
                    error_message: None,
                })
            }
        }
    }

    async fn begin_slot(&self, run_date: &str, session: &str) -> anyhow::Result<Option<i64>> {
        let mut state = self.state.lock().await;
        if state
            .slots
            .iter()
            .any(|s| s.run_date == run_date && s.session == session)
        {
            return Ok(None);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.slots.push(RunSlotEntity {
            id: Some(id),
            run_date: run_date.to_string(),
            session: session.to_string(),
            status: "RUNNING".to_string(),
            trade_count: 0,
            error_message: None,
            started_at: Some(DateTime::now()),
            finished_at: None,
        });
        Ok(Some(id))
    }

    async fn complete_slot(
        &self,
        run_id: i64,
        trade_count: i64,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .slots
            .iter_mut()
            .find(|s| s.id == Some(run_id))
            .ok_or_else(|| anyhow::anyhow!("run slot {} 不存在", run_id))?;
        slot.status = if trade_count == 0 && error.is_some() {
            "FAILED".to_string()
        } else {
            "DONE".to_string()
        };
        slot.trade_count = trade_count;
        slot.error_message = error.map(|e| e.to_string());
        slot.finished_at = Some(DateTime::now());
        Ok(())
    }

    async fn append_trading_log(&self, entry: TradingLogEntity) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let mut entry = entry;
        entry.id = Some(id);
        if entry.created_at.is_none() {
            entry.created_at = Some(DateTime::now());
        }
        state.logs.push(entry);
        Ok(())
    }

    async fn update_reference_price(&self, pitch_id: i64, price: f64) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(instrument) = state.instruments.iter_mut().find(|i| i.pitch_id == pitch_id) {
            instrument.current_price = price;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_account(user_id: &str, cash: f64) -> AccountEntity {
        AccountEntity {
            id: None,
            user_id: user_id.to_string(),
            user_email: None,
            display_name: user_id.to_string(),
            is_ai_investor: 1,
            is_active: 1,
            ai_strategy: Some("MODERATE".to_string()),
            ai_catchphrase: None,
            ai_personality_prompt: None,
            total_tokens: cash,
            available_tokens: cash,
            total_invested: 0.0,
        }
    }

    #[tokio::test]
    async fn test_buy_then_full_sell_removes_row() {
        let store = MemoryLedgerStore::new();
        store.seed_account(ai_account("ai_1", 10_000.0)).await;

        let applied = store
            .execute_trade(&TradeRequest {
                user_id: "ai_1".to_string(),
                pitch_id: 7,
                trade_type: TradeType::Buy,
                shares: 10.0,
                price: 100.0,
            })
            .await
            .unwrap();
        assert!(applied.success);
        assert_eq!(applied.new_balance, 9_000.0);

        let applied = store
            .execute_trade(&TradeRequest {
                user_id: "ai_1".to_string(),
                pitch_id: 7,
                trade_type: TradeType::Sell,
                shares: 10.0,
                price: 110.0,
            })
            .await
            .unwrap();
        assert!(applied.success);
        assert_eq!(applied.new_balance, 10_100.0);
        assert_eq!(applied.cost_basis_removed, 1_000.0);
        // 清仓后持仓行被删除
        assert!(store.holding_snapshot("ai_1", 7).await.is_none());
        let account = store.account_snapshot("ai_1").await.unwrap();
        assert_eq!(account.total_invested, 0.0);
    }

    #[tokio::test]
    async fn test_slot_claim_is_idempotent() {
        let store = MemoryLedgerStore::new();
        let first = store.begin_slot("2026-03-02", "morning").await.unwrap();
        assert!(first.is_some());
        let second = store.begin_slot("2026-03-02", "morning").await.unwrap();
        assert!(second.is_none());
        // 另一场次可以正常认领
        let afternoon = store.begin_slot("2026-03-02", "afternoon").await.unwrap();
        assert!(afternoon.is_some());
    }
}
