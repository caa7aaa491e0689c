use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::trading::market::snapshot::MarketSnapshot;
use crate::trading::model::account::AccountEntity;
use crate::trading::openai::CompletionProvider;
use crate::trading::persona::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::trading::persona::strategy::PersonaStrategy;

/// 模型返回的原始决策，字段全部可缺省
///
/// shares 与 pitch_id 用 Value 接住，模型偶尔会回字符串或小数，
/// 类型不符在清洗阶段统一处理而不是让整条响应解析失败。
#[derive(Debug, Default, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub pitch_id: Option<Value>,
    #[serde(default)]
    pub shares: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// 清洗后的交易决策
#[derive(Debug, Clone, PartialEq)]
pub enum TradeDecision {
    Buy { pitch_id: i64, shares: f64, rationale: String },
    Sell { pitch_id: i64, shares: f64, rationale: String },
    Hold { rationale: String },
}

impl TradeDecision {
    pub fn action_str(&self) -> &'static str {
        match self {
            TradeDecision::Buy { .. } => "BUY",
            TradeDecision::Sell { .. } => "SELL",
            TradeDecision::Hold { .. } => "HOLD",
        }
    }

    pub fn pitch_id(&self) -> Option<i64> {
        match self {
            TradeDecision::Buy { pitch_id, .. } | TradeDecision::Sell { pitch_id, .. } => {
                Some(*pitch_id)
            }
            TradeDecision::Hold { .. } => None,
        }
    }

    pub fn shares(&self) -> Option<f64> {
        match self {
            TradeDecision::Buy { shares, .. } | TradeDecision::Sell { shares, .. } => Some(*shares),
            TradeDecision::Hold { .. } => None,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            TradeDecision::Buy { rationale, .. }
            | TradeDecision::Sell { rationale, .. }
            | TradeDecision::Hold { rationale } => rationale,
        }
    }
}

/// 一次决策的完整产物，提示词与原始响应都保留用于审计
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: TradeDecision,
    pub prompt: String,
    pub raw_response: String,
    /// 模型调用失败(超时/非法 JSON/网络错误)，这类 HOLD 不会进入执行
    pub provider_failed: bool,
}

/// 决策清洗，规则按顺序执行:
/// 1. action 不是 BUY/SELL/HOLD 三者之一，降级为 HOLD
/// 2. BUY/SELL 未给 shares，降级为 HOLD 并在理由前加注
/// 3. shares 不是正的有限数值，同样降级并把原值写进理由
pub fn sanitize(raw: &RawDecision, display_name: &str) -> TradeDecision {
    let reasoning = raw.reasoning.clone().unwrap_or_default();

    let action = match raw.action.as_deref() {
        Some(a @ ("BUY" | "SELL" | "HOLD")) => a,
        other => {
            warn!("[AI Trading] {} 返回非法 action {:?}, 降级为 HOLD", display_name, other);
            return TradeDecision::Hold { rationale: reasoning };
        }
    };

    if action == "HOLD" {
        return TradeDecision::Hold { rationale: reasoning };
    }

    let shares = match &raw.shares {
        None | Some(Value::Null) => {
            warn!("[AI Trading] {} {} 未给出 shares, 降级为 HOLD", display_name, action);
            return TradeDecision::Hold {
                rationale: format!("(Converted from {} - no shares specified) {}", action, reasoning),
            };
        }
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => n,
            _ => {
                warn!("[AI Trading] {} shares 非法: {}, 降级为 HOLD", display_name, v);
                return TradeDecision::Hold {
                    rationale: format!("(Converted - invalid shares: {}) {}", v, reasoning),
                };
            }
        },
    };

    // pitch_id 不可解析时置 0，交给执行层按未知标的拒绝
    let pitch_id = raw.pitch_id.as_ref().and_then(Value::as_i64).unwrap_or(0);

    if action == "BUY" {
        TradeDecision::Buy { pitch_id, shares, rationale: reasoning }
    } else {
        TradeDecision::Sell { pitch_id, shares, rationale: reasoning }
    }
}

/// 跑一轮角色决策: 组提示词, 调模型, 清洗返回
///
/// 模型侧任何失败都折算成带 "Technical difficulties" 理由的 HOLD,
/// raw_response 写入错误体, 调用方据 provider_failed 跳过执行。
pub async fn decide(
    account: &AccountEntity,
    snapshot: &MarketSnapshot,
    provider: &dyn CompletionProvider,
) -> DecisionOutcome {
    let strategy = PersonaStrategy::from_code(account.ai_strategy.as_deref().unwrap_or(""));
    let prompt = build_user_prompt(account, snapshot, strategy);

    match provider.complete_json(SYSTEM_PROMPT, &prompt).await {
        Ok(raw) => match serde_json::from_str::<RawDecision>(&raw) {
            Ok(parsed) => {
                let decision = sanitize(&parsed, &account.display_name);
                DecisionOutcome { decision, prompt, raw_response: raw, provider_failed: false }
            }
            Err(e) => {
                warn!("[AI Trading] {} 响应不是合法 JSON: {}", account.display_name, e);
                DecisionOutcome {
                    decision: TradeDecision::Hold {
                        rationale: format!("Technical difficulties: {}", e),
                    },
                    raw_response: json!({ "error": e.to_string() }).to_string(),
                    prompt,
                    provider_failed: true,
                }
            }
        },
        Err(e) => {
            warn!("[AI Trading] {} 模型调用失败: {}", account.display_name, e);
            DecisionOutcome {
                decision: TradeDecision::Hold {
                    rationale: format!("Technical difficulties: {}", e),
                },
                raw_response: json!({ "error": e.to_string() }).to_string(),
                prompt,
                provider_failed: true,
            }
        }
    }
}
