use anyhow::anyhow;
use async_trait::async_trait;
use rbatis::RBatis;
use serde::Deserialize;
use tracing::{debug, info};

use crate::app_config::db;
use crate::error::AppError;
use crate::trading::model::account::{AccountEntity, AccountModel};
use crate::trading::model::holding::{HoldingEntity, HoldingModel};
use crate::trading::model::instrument::{InstrumentEntity, InstrumentModel};
use crate::trading::model::run_slot::RunSlotModel;
use crate::trading::model::trading_log::{TradingLogEntity, TradingLogModel};
use crate::trading::store::{LedgerStore, TradeApplied, TradeRequest};

/// MySQL 账本
///
/// 资金与持仓变更全部走 execute_trade 存储过程，过程内部对账户行加锁
/// 重新校验，应用层读到的余额只用于展示，不参与扣减。
pub struct MysqlLedgerStore {
    db: &'static RBatis,
    accounts: AccountModel,
    instruments: InstrumentModel,
    holdings: HoldingModel,
    runs: RunSlotModel,
    logs: TradingLogModel,
}

#[derive(Debug, Deserialize)]
struct TradeProcRow {
    success: i32,
    new_balance: f64,
    cost_basis_removed: f64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimProcRow {
    claimed: i32,
    run_id: i64,
}

impl MysqlLedgerStore {
    pub async fn new() -> MysqlLedgerStore {
        Self {
            db: db::get_db_client(),
            accounts: AccountModel::new().await,
            instruments: InstrumentModel::new().await,
            holdings: HoldingModel::new().await,
            runs: RunSlotModel::new().await,
            logs: TradingLogModel::new().await,
        }
    }
}

#[async_trait]
impl LedgerStore for MysqlLedgerStore {
    async fn active_ai_accounts(&self) -> anyhow::Result<Vec<AccountEntity>> {
        self.accounts.get_active_ai_investors().await
    }

    async fn account_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<AccountEntity>> {
        self.accounts.get_by_user_id(user_id).await
    }

    async fn tradable_instruments(&self) -> anyhow::Result<Vec<InstrumentEntity>> {
        self.instruments.get_tradable().await
    }

    async fn open_holdings(&self, user_id: &str) -> anyhow::Result<Vec<HoldingEntity>> {
        self.holdings.get_open_by_user(user_id).await
    }

    async fn holding_for(
        &self,
        user_id: &str,
        pitch_id: i64,
    ) -> anyhow::Result<Option<HoldingEntity>> {
        self.holdings.get_by_user_and_pitch(user_id, pitch_id).await
    }

    async fn execute_trade(&self, request: &TradeRequest) -> anyhow::Result<TradeApplied> {
        let rows: Vec<TradeProcRow> = self
            .db
            .query_decode(
                "call execute_trade(?, ?, ?, ?, ?)",
                vec![
                    request.user_id.clone().into(),
                    request.pitch_id.into(),
                    request.shares.into(),
                    request.price.into(),
                    request.trade_type.as_str().into(),
                ],
            )
            .await
            .map_err(AppError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("execute_trade 存储过程未返回结果行"))?;
        info!(
            "账本落账 user_id={} pitch_id={} type={} shares={} price={} success={}",
            request.user_id,
            request.pitch_id,
            request.trade_type.as_str(),
            request.shares,
            request.price,
            row.success
        );
        Ok(TradeApplied {
            success: row.success == 1,
            new_balance: row.new_balance,
            cost_basis_removed: row.cost_basis_removed,
            error_message: row.error_message,
        })
    }

    async fn begin_slot(&self, run_date: &str, session: &str) -> anyhow::Result<Option<i64>> {
        // 场次行已存在就不进存储过程，竞态下仍以过程内的唯一键为准
        if let Some(existing) = self.runs.get_by_slot(run_date, session).await? {
            debug!(
                "场次已被认领 run_date={} session={} status={}",
                run_date, session, existing.status
            );
            return Ok(None);
        }
        let rows: Vec<ClaimProcRow> = self
            .db
            .query_decode(
                "call start_cron_run(?, ?)",
                vec![run_date.into(), session.into()],
            )
            .await
            .map_err(AppError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("start_cron_run 存储过程未返回结果行"))?;
        if row.claimed == 1 {
            info!("认领交易场次 run_date={} session={} run_id={}", run_date, session, row.run_id);
            Ok(Some(row.run_id))
        } else {
            Ok(None)
        }
    }

    async fn complete_slot(
        &self,
        run_id: i64,
        trade_count: i64,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        let error_value = match error {
            Some(e) => e.into(),
            None => rbs::Value::Null,
        };
        self.db
            .exec(
                "call complete_cron_run(?, ?, ?)",
                vec![run_id.into(), trade_count.into(), error_value],
            )
            .await
            .map_err(AppError::from)?;
        info!("场次收尾 run_id={} trade_count={} error={:?}", run_id, trade_count, error);
        Ok(())
    }

    async fn append_trading_log(&self, entry: TradingLogEntity) -> anyhow::Result<()> {
        self.logs.add(entry).await?;
        Ok(())
    }

    async fn update_reference_price(&self, pitch_id: i64, price: f64) -> anyhow::Result<()> {
        self.instruments.update_reference_price(pitch_id, price).await?;
        Ok(())
    }
}
