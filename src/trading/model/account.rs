use crate::app_config::db;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// 账户表 user_token_balances：真人与 AI 角色各占一行
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountEntity {
    pub id: Option<i64>,
    pub user_id: String,
    pub user_email: Option<String>,
    pub display_name: String,
    pub is_ai_investor: i32,
    pub is_active: i32,
    pub ai_strategy: Option<String>,
    pub ai_catchphrase: Option<String>,
    pub ai_personality_prompt: Option<String>,
    /// 账户资金基线，仅用于报表
    pub total_tokens: f64,
    /// 可用现金，恒 >= 0
    pub available_tokens: f64,
    /// 持仓成本合计，等于全部在持仓位的 cost basis 之和
    pub total_invested: f64,
}

crud!(AccountEntity {}, "user_token_balances");
impl_select!(AccountEntity{select_active_ai_investors() =>
    "`where is_ai_investor = 1 and is_active = 1 order by user_id`"},"user_token_balances");
impl_select!(AccountEntity{select_by_user_id(user_id:&str) =>
    "`where user_id = #{user_id} limit 1`"},"user_token_balances");

pub struct AccountModel {
    db: &'static RBatis,
}

impl AccountModel {
    pub async fn new() -> AccountModel {
        Self {
            db: db::get_db_client(),
        }
    }

    pub async fn get_active_ai_investors(&self) -> anyhow::Result<Vec<AccountEntity>> {
        let data = AccountEntity::select_active_ai_investors(self.db).await?;
        debug!("query active ai investors count:{}", data.len());
        Ok(data)
    }

    pub async fn get_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<AccountEntity>> {
        let data = AccountEntity::select_by_user_id(self.db, user_id).await?;
        debug!("query account result:{}", json!(data));
        Ok(data.into_iter().next())
    }
}
