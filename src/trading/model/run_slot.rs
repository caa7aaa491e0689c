use crate::app_config::db;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// 执行槽位表 ai_trading_runs：(run_date, session) 唯一，支撑幂等调度
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSlotEntity {
    pub id: Option<i64>,
    /// 美东日历日期 YYYY-MM-DD
    pub run_date: String,
    /// morning | afternoon
    pub session: String,
    /// RUNNING | DONE | FAILED
    pub status: String,
    pub trade_count: i64,
    pub error_message: Option<String>,
    pub started_at: Option<rbatis::rbdc::datetime::DateTime>,
    pub finished_at: Option<rbatis::rbdc::datetime::DateTime>,
}

crud!(RunSlotEntity {}, "ai_trading_runs");
impl_select!(RunSlotEntity{select_by_slot(run_date:&str,session:&str) -> Option =>
    "`where run_date = #{run_date} and session = #{session} limit 1`"},"ai_trading_runs");

pub struct RunSlotModel {
    db: &'static RBatis,
}

impl RunSlotModel {
    pub async fn new() -> RunSlotModel {
        Self {
            db: db::get_db_client(),
        }
    }

    pub async fn get_by_slot(
        &self,
        run_date: &str,
        session: &str,
    ) -> anyhow::Result<Option<RunSlotEntity>> {
        let data = RunSlotEntity::select_by_slot(self.db, run_date, session).await?;
        debug!("query run slot result:{}", json!(data));
        Ok(data)
    }
}
