use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::trading::market::price_cache::{PriceSource, QuoteOrigin};
use crate::trading::model::account::AccountEntity;
use crate::trading::model::holding::HoldingEntity;
use crate::trading::model::instrument::InstrumentEntity;

/// 带实时价的标的
#[derive(Clone, Debug)]
pub struct QuotedInstrument {
    pub info: InstrumentEntity,
    pub price: f64,
    pub price_origin: QuoteOrigin,
}

/// 持仓视图：市值与盈亏一律现算，不落库
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HoldingView {
    pub pitch_id: i64,
    pub ticker: String,
    pub company_name: String,
    pub shares_owned: f64,
    pub cost_basis: f64,
    pub price: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
    /// 价格链全线失败时置 false，市值按 0 上报并标记，不得用错价估值
    pub price_resolved: bool,
}

/// 单个角色一次决策所需的市场快照
#[derive(Clone, Debug)]
pub struct MarketSnapshot {
    /// 展示顺序每次随机打散，消除提示词位置偏置
    pub instruments: Vec<QuotedInstrument>,
    pub holdings: Vec<HoldingView>,
    pub holdings_value: f64,
    pub cash_percent: f64,
    pub holdings_percent: f64,
}

impl MarketSnapshot {
    pub fn quoted(&self, pitch_id: i64) -> Option<&QuotedInstrument> {
        self.instruments.iter().find(|q| q.info.pitch_id == pitch_id)
    }
}

/// 组装市场快照：逐标的解析价格，持仓按实时价重算市值与盈亏
pub async fn build_snapshot(
    account: &AccountEntity,
    instruments: &[InstrumentEntity],
    holdings: &[HoldingEntity],
    prices: &dyn PriceSource,
) -> MarketSnapshot {
    let mut quoted: Vec<QuotedInstrument> = Vec::with_capacity(instruments.len());
    for inst in instruments {
        let reference = if inst.current_price > 0.0 {
            Some(inst.current_price)
        } else {
            None
        };
        match prices.resolve(&inst.ticker, reference).await {
            Ok(resolved) => quoted.push(QuotedInstrument {
                info: inst.clone(),
                price: resolved.price,
                price_origin: resolved.origin,
            }),
            Err(e) => {
                //连参考价都没有的标的无法交易，本轮不进快照
                warn!("标的价格解析失败，跳过 {}: {}", inst.ticker, e);
            }
        }
    }

    let mut holding_views: Vec<HoldingView> = Vec::with_capacity(holdings.len());
    let mut holdings_value = 0.0;
    for h in holdings {
        let inst = instruments.iter().find(|i| i.pitch_id == h.pitch_id);
        let price = quoted
            .iter()
            .find(|q| q.info.pitch_id == h.pitch_id)
            .map(|q| q.price);
        let (ticker, company_name) = match inst {
            Some(i) => (i.ticker.clone(), i.company_name.clone()),
            None => (String::new(), String::new()),
        };
        match price {
            Some(price) => {
                let current_value = h.shares_owned * price;
                let gain_loss = current_value - h.total_invested;
                let gain_loss_percent = if h.total_invested > 0.0 {
                    gain_loss / h.total_invested * 100.0
                } else {
                    0.0
                };
                holdings_value += current_value;
                holding_views.push(HoldingView {
                    pitch_id: h.pitch_id,
                    ticker,
                    company_name,
                    shares_owned: h.shares_owned,
                    cost_basis: h.total_invested,
                    price,
                    current_value,
                    gain_loss,
                    gain_loss_percent,
                    price_resolved: true,
                });
            }
            None => {
                warn!(
                    "持仓标的价格未解析，市值按 0 标记 user_id={} pitch_id={}",
                    h.user_id, h.pitch_id
                );
                holding_views.push(HoldingView {
                    pitch_id: h.pitch_id,
                    ticker,
                    company_name,
                    shares_owned: h.shares_owned,
                    cost_basis: h.total_invested,
                    price: 0.0,
                    current_value: 0.0,
                    gain_loss: 0.0,
                    gain_loss_percent: 0.0,
                    price_resolved: false,
                });
            }
        }
    }

    quoted.shuffle(&mut thread_rng());

    let total_value = account.available_tokens + holdings_value;
    let (cash_percent, holdings_percent) = if total_value > 0.0 {
        (
            account.available_tokens / total_value * 100.0,
            holdings_value / total_value * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    MarketSnapshot {
        instruments: quoted,
        holdings: holding_views,
        holdings_value,
        cash_percent,
        holdings_percent,
    }
}
