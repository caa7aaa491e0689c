pub mod memory_store;
pub mod mysql_store;

use async_trait::async_trait;

use crate::trading::model::account::AccountEntity;
use crate::trading::model::holding::HoldingEntity;
use crate::trading::model::instrument::InstrumentEntity;
use crate::trading::model::trading_log::TradingLogEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

/// 提交给账本的落账请求，价格由执行层解析后传入
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub user_id: String,
    pub pitch_id: i64,
    pub trade_type: TradeType,
    pub shares: f64,
    pub price: f64,
}

/// 账本落账结果
///
/// success=false 表示余额或持仓校验未过，属于业务拒绝而非基础设施错误。
#[derive(Debug, Clone)]
pub struct TradeApplied {
    pub success: bool,
    pub new_balance: f64,
    /// SELL 按比例移出的成本，BUY 恒为 0，用于上层算已实现盈亏
    pub cost_basis_removed: f64,
    pub error_message: Option<String>,
}

/// 交易账本的统一读写口
///
/// 资金与持仓的变更只允许通过 execute_trade 单点进出，
/// 余额校验、持仓增减、流水落库在账本内部一个原子单元里完成。
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn active_ai_accounts(&self) -> anyhow::Result<Vec<AccountEntity>>;

    async fn account_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<AccountEntity>>;

    async fn tradable_instruments(&self) -> anyhow::Result<Vec<InstrumentEntity>>;

    async fn open_holdings(&self, user_id: &str) -> anyhow::Result<Vec<HoldingEntity>>;

    async fn holding_for(
        &self,
        user_id: &str,
        pitch_id: i64,
    ) -> anyhow::Result<Option<HoldingEntity>>;

    /// 原子落账，内部重新校验余额与持仓，并发下以账本内的结果为准
    async fn execute_trade(&self, request: &TradeRequest) -> anyhow::Result<TradeApplied>;

    /// 认领一个交易场次，返回 run_id；场次已被占用时返回 None
    async fn begin_slot(&self, run_date: &str, session: &str) -> anyhow::Result<Option<i64>>;

    /// 场次收尾。trade_count 为 0 且带错误信息时记 FAILED，否则记 DONE
    async fn complete_slot(
        &self,
        run_id: i64,
        trade_count: i64,
        error: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn append_trading_log(&self, entry: TradingLogEntity) -> anyhow::Result<()>;

    async fn update_reference_price(&self, pitch_id: i64, price: f64) -> anyhow::Result<()>;
}
