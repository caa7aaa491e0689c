use std::env;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app_config::env::{env_or_default, env_parse};
use crate::error::AppError;
use crate::time_util;
use crate::trading::market::price_cache::QuoteFetcher;

/// finnhub /quote 应答，c 为最新价
#[derive(Serialize, Deserialize, Debug)]
pub struct FinnhubQuote {
    pub c: f64,
    /// 当日涨跌幅（百分比）
    pub dp: Option<f64>,
    pub pc: Option<f64>,
    pub t: Option<i64>,
}

pub struct FinnhubClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl FinnhubClient {
    pub fn new(api_key: String) -> Self {
        FinnhubClient {
            client: Client::new(),
            api_key,
            base_url: env_or_default("FINNHUB_BASE_URL", "https://finnhub.io/api/v1"),
            timeout: Duration::from_secs(env_parse("QUOTE_TIMEOUT_SECS", 5u64)),
        }
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<FinnhubQuote, AppError> {
        //带毫秒时间戳参数与 no-cache 头，绕开中间层缓存
        let url = format!(
            "{}/quote?symbol={}&token={}&_={}",
            self.base_url,
            symbol,
            self.api_key,
            time_util::now_millis()
        );

        let response = self
            .client
            .get(&url)
            .header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("Expires", "0")
            .timeout(self.timeout)
            .send()
            .await?;

        let status_code = response.status();
        let response_body = response.text().await?;
        debug!("symbol:{},finnhub_response: {}", symbol, response_body);

        if status_code == StatusCode::OK {
            let quote: FinnhubQuote = serde_json::from_str(&response_body)
                .map_err(|e| AppError::QuoteApiError(e.to_string()))?;
            Ok(quote)
        } else {
            Err(AppError::QuoteApiError(format!(
                "行情请求失败: {} status={}",
                symbol, status_code
            )))
        }
    }
}

#[async_trait]
impl QuoteFetcher for FinnhubClient {
    async fn fetch_quote(&self, ticker: &str) -> Result<f64> {
        let quote = self.get_quote(ticker).await?;
        if quote.c > 0.0 {
            Ok(quote.c)
        } else {
            warn!("finnhub 返回无效报价 {}: {}", ticker, quote.c);
            Err(AppError::QuoteApiError(format!("invalid quote for {}: {}", ticker, quote.c)).into())
        }
    }
}

pub fn get_finnhub_client() -> FinnhubClient {
    let api_key = env::var("STOCK_API_KEY").expect("STOCK_API_KEY config is none");
    FinnhubClient::new(api_key)
}
