use rbatis::{crud, impl_select};
use serde::{Deserialize, Serialize};

/// 成交流水表 investment_transactions：仅追加，不修改不删除
///
/// 写入只发生在 execute_trade 存储过程内部，应用侧不单独插流水。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecordEntity {
    pub id: Option<i64>,
    pub user_id: String,
    pub pitch_id: i64,
    /// BUY | SELL
    pub transaction_type: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub timestamp: Option<rbatis::rbdc::datetime::DateTime>,
}

crud!(TransactionRecordEntity {}, "investment_transactions");
impl_select!(TransactionRecordEntity{select_recent_by_user(user_id:&str,limit:i64) =>
    "`where user_id = #{user_id} order by timestamp desc limit #{limit}`"},"investment_transactions");
