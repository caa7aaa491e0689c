use std::env;

use once_cell::sync::OnceCell;
use rbatis::RBatis;
use rbdc_mysql::MysqlDriver;

use crate::app_config::env::env_parse;

static DB_CLIENT: OnceCell<RBatis> = OnceCell::new();

pub async fn init_db() -> &'static RBatis {
    let rb = RBatis::new();
    rb.link(MysqlDriver {}, &*env::var("DB_HOST").expect("DB_HOST config is none"))
        .await
        .expect("Failed to connect db");
    //交易写路径走行级锁事务，连接数不宜过小
    let max_conns = env_parse("DB_MAX_OPEN_CONNS", 100u64);
    rb.get_pool().unwrap().set_max_open_conns(max_conns).await;

    DB_CLIENT.set(rb).expect("Failed to set DB_CLIENT");
    DB_CLIENT.get().expect("DB_CLIENT is not initialized")
}

pub fn get_db_client() -> &'static RBatis {
    DB_CLIENT.get().expect("DB_CLIENT is not initialized")
}
