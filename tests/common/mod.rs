#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use unicorn_trading::trading::market::price_cache::{
    PriceSource, QuoteError, QuoteOrigin, ResolvedQuote,
};
use unicorn_trading::trading::model::account::AccountEntity;
use unicorn_trading::trading::model::holding::HoldingEntity;
use unicorn_trading::trading::model::instrument::InstrumentEntity;
use unicorn_trading::trading::openai::CompletionProvider;

pub fn ai_account(user_id: &str, display_name: &str, strategy: &str, cash: f64) -> AccountEntity {
    AccountEntity {
        id: None,
        user_id: user_id.to_string(),
        user_email: None,
        display_name: display_name.to_string(),
        is_ai_investor: 1,
        is_active: 1,
        ai_strategy: Some(strategy.to_string()),
        ai_catchphrase: Some("To the moon!".to_string()),
        ai_personality_prompt: None,
        total_tokens: cash,
        available_tokens: cash,
        total_invested: 0.0,
    }
}

pub fn instrument(pitch_id: i64, company: &str, ticker: &str, reference: f64) -> InstrumentEntity {
    InstrumentEntity {
        pitch_id,
        company_name: company.to_string(),
        ticker: ticker.to_string(),
        category: Some("Tech".to_string()),
        elevator_pitch: Some(format!("{} changes everything", company)),
        founder_story: Some("Two friends and a whiteboard".to_string()),
        fun_fact: Some("The office has a slide".to_string()),
        current_price: reference,
        price_change_24h: 0.0,
    }
}

pub fn holding(user_id: &str, pitch_id: i64, shares: f64, invested: f64) -> HoldingEntity {
    HoldingEntity {
        id: None,
        user_id: user_id.to_string(),
        pitch_id,
        shares_owned: shares,
        total_invested: invested,
        avg_purchase_price: if shares > 0.0 { invested / shares } else { 0.0 },
    }
}

/// 固定价目表，未配置的 ticker 按真实缓存的约定退参考价再报错
pub struct FakePrices {
    map: HashMap<String, f64>,
}

impl FakePrices {
    pub fn new() -> FakePrices {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn with(mut self, ticker: &str, price: f64) -> FakePrices {
        self.map.insert(ticker.to_string(), price);
        self
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn resolve(
        &self,
        ticker: &str,
        reference: Option<f64>,
    ) -> Result<ResolvedQuote, QuoteError> {
        if let Some(price) = self.map.get(ticker) {
            return Ok(ResolvedQuote {
                ticker: ticker.to_string(),
                price: *price,
                origin: QuoteOrigin::Live,
            });
        }
        match reference {
            Some(price) if price > 0.0 => Ok(ResolvedQuote {
                ticker: ticker.to_string(),
                price,
                origin: QuoteOrigin::Reference,
            }),
            _ => Err(QuoteError::Unavailable {
                ticker: ticker.to_string(),
                reason: "no quote scripted".to_string(),
            }),
        }
    }
}

/// 按脚本逐次吐应答的模型替身，同时记录收到的提示词
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new() -> ScriptedCompletion {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, body: &str) -> ScriptedCompletion {
        self.responses.lock().unwrap().push_back(Ok(body.to_string()));
        self
    }

    pub fn with_failure(self, reason: &str) -> ScriptedCompletion {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
        self
    }

    pub fn captured_user_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, user)| user.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete_json(&self, system: &str, user: &str) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(anyhow::anyhow!("{}", reason)),
            None => Err(anyhow::anyhow!("no scripted response left")),
        }
    }
}
