use std::sync::Arc;

use tracing::{error, info};

use crate::trading::market::price_cache::PriceSource;
use crate::trading::market::snapshot::MarketSnapshot;
use crate::trading::model::account::AccountEntity;
use crate::trading::persona::decision::TradeDecision;
use crate::trading::store::{LedgerStore, TradeRequest, TradeType};

/// 单笔交易的执行结果
///
/// 余额不足、持仓不足这类拒绝是结构化结果(success=false)而不是错误，
/// 行情解析失败才以 Err 上抛，由批处理按单个角色隔离。
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub success: bool,
    pub message: String,
    pub balance_before: f64,
    pub balance_after: f64,
    pub price_used: Option<f64>,
    /// BUY 为成交花费，SELL 为回款金额
    pub amount: Option<f64>,
    /// SELL 成交时的已实现盈亏 = 回款 - 按比例移出的成本
    pub realized_gain: Option<f64>,
}

impl TradeOutcome {
    fn held(balance: f64) -> TradeOutcome {
        TradeOutcome {
            success: true,
            message: "Holding position".to_string(),
            balance_before: balance,
            balance_after: balance,
            price_used: None,
            amount: None,
            realized_gain: None,
        }
    }

    fn rejected(message: String, balance: f64) -> TradeOutcome {
        TradeOutcome {
            success: false,
            message,
            balance_before: balance,
            balance_after: balance,
            price_used: None,
            amount: None,
            realized_gain: None,
        }
    }
}

/// 交易执行引擎: 校验 -> 账本原子落账 -> 汇报
pub struct TradeService {
    store: Arc<dyn LedgerStore>,
    prices: Arc<dyn PriceSource>,
}

impl TradeService {
    pub fn new(store: Arc<dyn LedgerStore>, prices: Arc<dyn PriceSource>) -> TradeService {
        Self { store, prices }
    }

    /// 执行一笔已清洗的决策
    ///
    /// 校验分两层: 这里按读到的余额与持仓先拦一遍并生成可读拒绝文案，
    /// 账本内部再按锁后实况复核，并发下以账本结果为准。
    pub async fn execute(
        &self,
        account: &AccountEntity,
        decision: &TradeDecision,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<TradeOutcome> {
        match decision {
            TradeDecision::Hold { .. } => Ok(TradeOutcome::held(account.available_tokens)),
            TradeDecision::Buy { pitch_id, shares, .. } => {
                self.execute_buy(account, *pitch_id, *shares, snapshot).await
            }
            TradeDecision::Sell { pitch_id, shares, .. } => {
                self.execute_sell(account, *pitch_id, *shares, snapshot).await
            }
        }
    }

    async fn execute_buy(
        &self,
        account: &AccountEntity,
        pitch_id: i64,
        shares: f64,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<TradeOutcome> {
        let balance_before = account.available_tokens;
        let quoted = match snapshot.quoted(pitch_id) {
            Some(q) => q,
            None => {
                return Ok(TradeOutcome::rejected(
                    format!("Invalid pitch_id {} - not found in available pitches", pitch_id),
                    balance_before,
                ))
            }
        };

        // 执行价重新解析，快照价最长可能滞后一个缓存周期
        let reference = if quoted.info.current_price > 0.0 {
            Some(quoted.info.current_price)
        } else {
            None
        };
        let quote = self.prices.resolve(&quoted.info.ticker, reference).await?;
        let price = quote.price;
        let cost = shares * price;

        if cost > balance_before {
            let max_shares = (balance_before / price * 100.0).floor() / 100.0;
            error!(
                "[AI Trading] {} OVERSPENDING BLOCKED: tried ${:.2} but only has ${:.2}",
                account.display_name, cost, balance_before
            );
            return Ok(TradeOutcome {
                success: false,
                message: format!(
                    "{} tried to overspend: wanted {} shares of {} @ ${} = ${:.2} but only has ${:.2}. Max affordable: {} shares",
                    account.display_name,
                    shares,
                    quoted.info.company_name,
                    price,
                    cost,
                    balance_before,
                    max_shares
                ),
                balance_before,
                balance_after: balance_before,
                price_used: Some(price),
                amount: Some(cost),
                realized_gain: None,
            });
        }
        if cost > account.total_tokens {
            error!("[AI Trading] {} INVALID TRADE: cost exceeds total portfolio", account.display_name);
            return Ok(TradeOutcome {
                success: false,
                message: format!(
                    "{} invalid trade: ${:.2} exceeds total portfolio ${:.2}",
                    account.display_name, cost, account.total_tokens
                ),
                balance_before,
                balance_after: balance_before,
                price_used: Some(price),
                amount: Some(cost),
                realized_gain: None,
            });
        }

        let applied = self
            .store
            .execute_trade(&TradeRequest {
                user_id: account.user_id.clone(),
                pitch_id,
                trade_type: TradeType::Buy,
                shares,
                price,
            })
            .await?;
        if !applied.success {
            return Ok(TradeOutcome {
                success: false,
                message: applied
                    .error_message
                    .unwrap_or_else(|| "Trade rejected by ledger".to_string()),
                balance_before,
                balance_after: applied.new_balance,
                price_used: Some(price),
                amount: Some(cost),
                realized_gain: None,
            });
        }

        let message = format!(
            "{} bought {:.2} shares of {} ({}) for ${:.2} MTK",
            account.display_name, shares, quoted.info.company_name, quoted.info.ticker, cost
        );
        info!("[AI Trading] {}", message);
        Ok(TradeOutcome {
            success: true,
            message,
            balance_before,
            balance_after: applied.new_balance,
            price_used: Some(price),
            amount: Some(cost),
            realized_gain: None,
        })
    }

    async fn execute_sell(
        &self,
        account: &AccountEntity,
        pitch_id: i64,
        shares: f64,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<TradeOutcome> {
        let balance_before = account.available_tokens;
        let quoted = match snapshot.quoted(pitch_id) {
            Some(q) => q,
            None => {
                return Ok(TradeOutcome::rejected(
                    format!("Invalid pitch_id {} for SELL - not found in available pitches", pitch_id),
                    balance_before,
                ))
            }
        };

        // 持仓现查现用，提示词组装后到现在可能已被别的场次改过
        let holding = self.store.holding_for(&account.user_id, pitch_id).await?;
        let held = holding.as_ref().map(|h| h.shares_owned).unwrap_or(0.0);
        if held < shares {
            return Ok(TradeOutcome::rejected(
                format!("Insufficient shares: has {}, tried to sell {}", held, shares),
                balance_before,
            ));
        }

        let reference = if quoted.info.current_price > 0.0 {
            Some(quoted.info.current_price)
        } else {
            None
        };
        let quote = self.prices.resolve(&quoted.info.ticker, reference).await?;
        let price = quote.price;
        let proceeds = shares * price;

        let applied = self
            .store
            .execute_trade(&TradeRequest {
                user_id: account.user_id.clone(),
                pitch_id,
                trade_type: TradeType::Sell,
                shares,
                price,
            })
            .await?;
        if !applied.success {
            return Ok(TradeOutcome {
                success: false,
                message: applied
                    .error_message
                    .unwrap_or_else(|| "Trade rejected by ledger".to_string()),
                balance_before,
                balance_after: applied.new_balance,
                price_used: Some(price),
                amount: Some(proceeds),
                realized_gain: None,
            });
        }

        let realized = proceeds - applied.cost_basis_removed;
        let message = format!(
            "{} sold {:.2} shares of {} ({}) for ${:.2} MTK",
            account.display_name, shares, quoted.info.company_name, quoted.info.ticker, proceeds
        );
        info!("[AI Trading] {} realized={:.2}", message, realized);
        Ok(TradeOutcome {
            success: true,
            message,
            balance_before,
            balance_after: applied.new_balance,
            price_used: Some(price),
            amount: Some(proceeds),
            realized_gain: Some(realized),
        })
    }
}
