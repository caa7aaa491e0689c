use crate::app_config::db;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// 持仓表 user_investments：每个 (user_id, pitch_id) 至多一行在持记录
///
/// 清仓时整行删除，不保留 0 股的残行；唯一约束由建表语句保证。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HoldingEntity {
    pub id: Option<i64>,
    pub user_id: String,
    pub pitch_id: i64,
    /// 在持股数，始终 > 0
    pub shares_owned: f64,
    /// 持仓成本（部分卖出时按比例扣减）
    pub total_invested: f64,
    /// 成本均价 = total_invested / shares_owned，每次买入后重算
    pub avg_purchase_price: f64,
}

crud!(HoldingEntity {}, "user_investments");
impl_select!(HoldingEntity{select_open_by_user(user_id:&str) =>
    "`where user_id = #{user_id} and shares_owned > 0 order by pitch_id`"},"user_investments");
impl_select!(HoldingEntity{select_by_user_and_pitch(user_id:&str,pitch_id:i64) -> Option =>
    "`where user_id = #{user_id} and pitch_id = #{pitch_id} limit 1`"},"user_investments");

pub struct HoldingModel {
    db: &'static RBatis,
}

impl HoldingModel {
    pub async fn new() -> HoldingModel {
        Self {
            db: db::get_db_client(),
        }
    }

    pub async fn get_open_by_user(&self, user_id: &str) -> anyhow::Result<Vec<HoldingEntity>> {
        let data = HoldingEntity::select_open_by_user(self.db, user_id).await?;
        debug!("query holdings user_id={} count={}", user_id, data.len());
        Ok(data)
    }

    pub async fn get_by_user_and_pitch(
        &self,
        user_id: &str,
        pitch_id: i64,
    ) -> anyhow::Result<Option<HoldingEntity>> {
        let data = HoldingEntity::select_by_user_and_pitch(self.db, user_id, pitch_id).await?;
        debug!("query holding result:{}", json!(data));
        Ok(data)
    }
}
