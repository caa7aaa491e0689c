use crate::app_config::db;
use rbatis::rbdc::db::ExecResult;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 可交易标的（ai_readable_pitches 视图：pitch 叙事 + pitch_market_data 行情的联合读取面）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstrumentEntity {
    pub pitch_id: i64,
    pub company_name: String,
    pub ticker: String,
    pub category: Option<String>,
    pub elevator_pitch: Option<String>,
    pub founder_story: Option<String>,
    pub fun_fact: Option<String>,
    /// 数据库留存参考价，实时价不可得时的最后兜底
    pub current_price: f64,
    pub price_change_24h: f64,
}

crud!(InstrumentEntity {}, "ai_readable_pitches");
impl_select!(InstrumentEntity{select_tradable() =>
    "`where ticker is not null order by pitch_id`"},"ai_readable_pitches");

pub struct InstrumentModel {
    db: &'static RBatis,
}

impl InstrumentModel {
    pub async fn new() -> InstrumentModel {
        Self {
            db: db::get_db_client(),
        }
    }

    pub async fn get_tradable(&self) -> anyhow::Result<Vec<InstrumentEntity>> {
        let data = InstrumentEntity::select_tradable(self.db).await?;
        debug!("query tradable instruments count:{}", data.len());
        Ok(data)
    }

    /// 回写参考价到 pitch_market_data（价格同步任务使用）
    pub async fn update_reference_price(
        &self,
        pitch_id: i64,
        price: f64,
    ) -> anyhow::Result<ExecResult> {
        let res = self
            .db
            .exec(
                "update pitch_market_data set current_price = ?, updated_at = now() where pitch_id = ?",
                vec![price.into(), pitch_id.into()],
            )
            .await?;
        debug!("update reference price pitch_id={} price={}", pitch_id, price);
        Ok(res)
    }
}
