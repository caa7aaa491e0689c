use crate::app_config::db;
use rbatis::rbdc::db::ExecResult;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// 决策审计表 ai_trading_logs：每次"决策 + 执行"落一行，含完整提示词与原始应答
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradingLogEntity {
    pub id: Option<i64>,
    pub user_id: String,
    pub display_name: String,
    pub ai_strategy: Option<String>,
    pub cash_before: f64,
    pub portfolio_value_before: f64,
    pub openai_prompt: String,
    pub openai_response_raw: String,
    /// BUY | SELL | HOLD
    pub decision_action: String,
    pub decision_pitch_id: Option<i64>,
    pub decision_shares: Option<f64>,
    pub decision_reasoning: String,
    pub execution_success: i32,
    pub execution_error: Option<String>,
    pub execution_message: String,
    /// cron | manual | batch
    pub triggered_by: String,
    pub created_at: Option<rbatis::rbdc::datetime::DateTime>,
}

crud!(TradingLogEntity {}, "ai_trading_logs");
impl_select!(TradingLogEntity{select_recent_by_user(user_id:&str,limit:i64) =>
    "`where user_id = #{user_id} order by id desc limit #{limit}`"},"ai_trading_logs");

pub struct TradingLogModel {
    db: &'static RBatis,
}

impl TradingLogModel {
    pub async fn new() -> TradingLogModel {
        Self {
            db: db::get_db_client(),
        }
    }

    pub async fn add(&self, log: TradingLogEntity) -> anyhow::Result<ExecResult> {
        let data = TradingLogEntity::insert(self.db, &log).await?;
        debug!("insert trading log result = {}", json!(data));
        Ok(data)
    }
}
