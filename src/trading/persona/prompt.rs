use crate::trading::market::snapshot::MarketSnapshot;
use crate::trading::model::account::AccountEntity;
use crate::trading::persona::strategy::PersonaStrategy;

/// 系统提示词，所有角色共用
pub const SYSTEM_PROMPT: &str = "You are an AI investor analyzing both business fundamentals and market data. Always respond with valid JSON only.";

/// 整数千分位格式化，取整规则与展示层保持一致(向下取整)
fn format_mtk(value: f64) -> String {
    let n = value.floor() as i64;
    let digits = n.abs().to_string();
    let mut out = String::new();
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn portfolio_summary(snapshot: &MarketSnapshot) -> String {
    if snapshot.holdings.is_empty() {
        return "No current holdings - 100% cash!".to_string();
    }
    snapshot
        .holdings
        .iter()
        .map(|h| {
            let indicator = if h.gain_loss_percent >= 0.0 {
                format!("📈 +{:.1}%", h.gain_loss_percent)
            } else {
                format!("📉 {:.1}%", h.gain_loss_percent)
            };
            let sign = if h.gain_loss >= 0.0 { "+" } else { "" };
            format!(
                "{} ({}): {:.2} shares @ ${:.2}\n      Cost basis: ${:.2} MTK | Current value: ${:.2} MTK | {} (${}{:.2})",
                h.company_name,
                h.ticker,
                h.shares_owned,
                h.price,
                h.cost_basis,
                h.current_value,
                indicator,
                sign,
                h.gain_loss
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 浮盈超过 3% 或浮亏超过 2% 的持仓单独列出，促使模型考虑卖出
fn sell_opportunities(snapshot: &MarketSnapshot) -> String {
    let candidates: Vec<String> = snapshot
        .holdings
        .iter()
        .filter(|h| h.gain_loss_percent > 3.0 || h.gain_loss_percent < -2.0)
        .map(|h| {
            let sign = if h.gain_loss_percent >= 0.0 { "+" } else { "" };
            let hint = if h.gain_loss_percent >= 3.0 {
                "💰 TAKE PROFITS?"
            } else {
                "🚨 CUT LOSSES?"
            };
            format!(
                "- {}: {}{:.1}% | {:.0} shares | Value: ${:.0} ({})",
                h.ticker, sign, h.gain_loss_percent, h.shares_owned, h.current_value, hint
            )
        })
        .collect();
    if candidates.is_empty() {
        String::new()
    } else {
        format!("\n🎯 SELL CANDIDATES (Review these!):\n{}", candidates.join("\n"))
    }
}

fn market_data(snapshot: &MarketSnapshot) -> String {
    snapshot
        .instruments
        .iter()
        .map(|q| {
            let p = &q.info;
            let change_sign = if p.price_change_24h >= 0.0 { "+" } else { "" };
            format!(
                "[Pitch ID: {}] {} ({}) - {}\n    Price: ${:.2} ({}{:.2}% today)\n    Pitch: \"{}\"\n    Story: {}\n    Fun Fact: {}",
                p.pitch_id,
                p.company_name,
                p.ticker,
                p.category.as_deref().unwrap_or(""),
                q.price,
                change_sign,
                p.price_change_24h,
                p.elevator_pitch.as_deref().unwrap_or(""),
                p.founder_story.as_deref().unwrap_or(""),
                p.fun_fact.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 组装完整用户提示词
///
/// 角色卡来自账户行，行情与持仓来自快照。自定义人格提示词优先于内置文案。
pub fn build_user_prompt(
    account: &AccountEntity,
    snapshot: &MarketSnapshot,
    strategy: PersonaStrategy,
) -> String {
    let cash = account.available_tokens;
    let holdings_value = snapshot.holdings_value;
    let total_value = cash + holdings_value;

    let total_invested: f64 = snapshot.holdings.iter().map(|h| h.cost_basis).sum();
    let overall_gain = holdings_value - total_invested;
    let overall_gain_percent = if total_invested > 0.0 {
        overall_gain / total_invested * 100.0
    } else {
        0.0
    };

    let (band_lo, band_hi) = strategy.band();
    let budget_min = (cash * band_lo).floor();
    let budget_max = (cash * band_hi).floor();

    let strategy_code = account.ai_strategy.as_deref().unwrap_or_else(|| strategy.code());
    let catchphrase = account.ai_catchphrase.as_deref().unwrap_or("");
    let personality = account
        .ai_personality_prompt
        .as_deref()
        .unwrap_or_else(|| strategy.guidelines());

    let mut valid_ids: Vec<i64> = snapshot.instruments.iter().map(|q| q.info.pitch_id).collect();
    valid_ids.sort_unstable();
    let valid_ids = valid_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let gain_sign = if overall_gain >= 0.0 { "+" } else { "" };
    let gain_pct_sign = if overall_gain_percent >= 0.0 { "+" } else { "" };

    let mut p = format!(
        "You are \"{}\", an AI investor with the {} strategy.\nYour catchphrase: \"{}\"\n\n⚡ CRITICAL: STAY IN CHARACTER! Be EXTREME and TRUE to your personality!\n\n",
        account.display_name, strategy_code, catchphrase
    );
    p.push_str(&format!(
        "📊 CURRENT STATUS:\n- Available Cash: ${} MTK ({:.1}% of total)\n- Holdings Value: ${} MTK ({:.1}% of total)\n- TOTAL Portfolio: ${} MTK\n- Overall P&L: {}${} ({}{:.1}%)\n\n",
        format_mtk(cash),
        snapshot.cash_percent,
        format_mtk(holdings_value),
        snapshot.holdings_percent,
        format_mtk(total_value),
        gain_sign,
        format_mtk(overall_gain),
        gain_pct_sign,
        overall_gain_percent
    ));
    p.push_str(&format!(
        "📈 YOUR PORTFOLIO (with gain/loss):\n{}\n{}\n\n",
        portfolio_summary(snapshot),
        sell_opportunities(snapshot)
    ));
    p.push_str(&format!(
        "INVESTMENT OPPORTUNITIES (HM14 - Harvard Magnificent Companies):\n{}\n\n",
        market_data(snapshot)
    ));
    p.push_str(&format!(
        "🎭 YOUR PERSONALITY & TRADING GUIDELINES:\n{}\n\n🔴 WHEN TO SELL (YOUR STRATEGY):\n{}\n\n",
        personality,
        strategy.sell_triggers()
    ));
    p.push_str(&format!(
        "💰 TRADING RULES FOR YOU:\n- Trade sizes: {}\n- Budget for this trade: ${} - ${} MTK\n- Make BOLD moves that match your personality!\n- REVIEW your holdings: positions with big gains might be time to TAKE PROFITS\n- REVIEW your holdings: positions with big losses might need to be CUT\n- BUY if you see opportunities that match YOUR strategy\n\n",
        strategy.band_suggestion(),
        format_mtk(budget_min),
        format_mtk(budget_max)
    ));

    // 动量型角色现金太多时插入强制交易告警
    if strategy == PersonaStrategy::Momentum && snapshot.cash_percent > 40.0 {
        p.push_str(&format!(
            "\n🚨🚨🚨 EMERGENCY ALERT 🚨🚨🚨\nYOU HAVE {:.1}% CASH! This is UNACCEPTABLE for a MOMENTUM trader!\nYOUR RULE: >40% cash is FORBIDDEN! You MUST trade NOW!\nLook for ANY stock up even 1%+ today and BUY IMMEDIATELY!\nIf NOTHING is up, buy the LEAST negative stock!\nDO NOT HOLD! FOMO Masters are ALWAYS in the market!\n\n",
            snapshot.cash_percent
        ));
    }
    if let Some(rule) = strategy.special_rule() {
        p.push_str(rule);
        p.push_str("\n\n");
    }

    p.push_str(&format!(
        "Make ONE bold trade decision. Respond with valid JSON only:\n{{\n  \"action\": \"BUY\" | \"SELL\" | \"HOLD\",\n  \"pitch_id\": number (valid IDs: {}),\n  \"shares\": number (calculate from your budget / stock price),\n  \"reasoning\": \"Brief explanation showing your personality and referencing specific pitch details or price action\"\n}}\n\n",
        valid_ids
    ));
    p.push_str(&format!(
        "⚠️ CRITICAL CALCULATION RULES:\n- ALWAYS calculate shares as: (your chosen budget in MTK) / (stock's current price)\n- Example: To invest $100,000 MTK in a stock at $65.00/share: shares = 100000 / 65 = 1538.46\n- NEVER exceed your available cash of ${} MTK\n- Double-check: (shares × price) must be ≤ your available cash\n- Use ONLY the Pitch IDs listed above in the INVESTMENT OPPORTUNITIES section\n\n",
        format_mtk(cash)
    ));
    p.push_str(
        "🎯 DIFFERENTIATION RULES - READ THIS CAREFULLY:\n1. AVOID THE OBVIOUS: Don't just pick the biggest brand or highest price\n2. DIG DEEPER: Analyze the fun fact, founder story, and unique pitch angle\n3. FIND HIDDEN VALUE: Look for companies solving unique problems or unconventional approaches\n4. MISSION MATTERS: Consider what makes each company's mission different from others\n5. FOUNDER PERSONA: Does the founder's background reveal something special?\n6. BE CONTRARIAN (if it fits your strategy): The most popular choice isn't always the best\n\n",
    );
    p.push_str(
        "💡 SMART INVESTOR TIP:\nInstead of gravitating to familiar names, ask yourself:\n- Which pitch reveals the most UNIQUE founder insight?\n- Which fun fact shows the most UNCONVENTIONAL approach?\n- Which company is solving a problem NO ONE ELSE is addressing?\n- Which mission statement resonates most with YOUR strategy?\n\n",
    );
    p.push_str(&format!(
        "Important: \n- Reference the pitch content or founder story in your reasoning\n- Show your personality in the reasoning - make it CLEAR you're {}!\n- Explain WHY this company's unique angle matches YOUR specific strategy\n- If you have TOO MUCH cash for your strategy, you MUST trade!",
        account.display_name
    ));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::market::price_cache::QuoteOrigin;
    use crate::trading::market::snapshot::{HoldingView, QuotedInstrument};
    use crate::trading::model::instrument::InstrumentEntity;

    fn sample_account(strategy: &str) -> AccountEntity {
        AccountEntity {
            id: Some(1),
            user_id: "ai_test".to_string(),
            user_email: None,
            display_name: "YOLO Kid".to_string(),
            is_ai_investor: 1,
            is_active: 1,
            ai_strategy: Some(strategy.to_string()),
            ai_catchphrase: Some("To the moon!".to_string()),
            ai_personality_prompt: None,
            total_tokens: 1_000_000.0,
            available_tokens: 600_000.0,
            total_invested: 400_000.0,
        }
    }

    fn sample_instrument(pitch_id: i64, ticker: &str) -> QuotedInstrument {
        QuotedInstrument {
            info: InstrumentEntity {
                pitch_id,
                company_name: format!("Company {}", ticker),
                ticker: ticker.to_string(),
                category: Some("Enterprise".to_string()),
                elevator_pitch: Some("We sell software".to_string()),
                founder_story: Some("Started in a garage".to_string()),
                fun_fact: Some("The logo is a cat".to_string()),
                current_price: 100.0,
                price_change_24h: 1.5,
            },
            price: 100.0,
            price_origin: QuoteOrigin::Live,
        }
    }

    fn sample_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            instruments: vec![sample_instrument(2, "NET"), sample_instrument(1, "META")],
            holdings: vec![HoldingView {
                pitch_id: 1,
                ticker: "META".to_string(),
                company_name: "Company META".to_string(),
                shares_owned: 100.0,
                cost_basis: 9_000.0,
                price: 100.0,
                current_value: 10_000.0,
                gain_loss: 1_000.0,
                gain_loss_percent: 11.11,
                price_resolved: true,
            }],
            holdings_value: 10_000.0,
            cash_percent: 98.4,
            holdings_percent: 1.6,
        }
    }

    #[test]
    fn test_prompt_contains_status_and_sorted_ids() {
        let account = sample_account("ALL_IN");
        let snapshot = sample_snapshot();
        let prompt = build_user_prompt(&account, &snapshot, PersonaStrategy::AllIn);
        // 现金取整加千分位
        assert!(prompt.contains("- Available Cash: $600,000 MTK"));
        // id 列表升序，与打散后的展示顺序无关
        assert!(prompt.contains("valid IDs: 1, 2"));
        assert!(prompt.contains("🎲 YOLO KID RULE"));
        assert!(prompt.contains("💰 TAKE PROFITS?"));
        assert!(prompt.contains("You are \"YOLO Kid\", an AI investor with the ALL_IN strategy."));
    }

    #[test]
    fn test_momentum_emergency_block_only_when_cash_heavy() {
        let account = sample_account("MOMENTUM");
        let mut snapshot = sample_snapshot();
        snapshot.cash_percent = 55.0;
        let prompt = build_user_prompt(&account, &snapshot, PersonaStrategy::Momentum);
        assert!(prompt.contains("🚨🚨🚨 EMERGENCY ALERT 🚨🚨🚨"));
        assert!(prompt.contains("YOU HAVE 55.0% CASH!"));

        snapshot.cash_percent = 20.0;
        let prompt = build_user_prompt(&account, &snapshot, PersonaStrategy::Momentum);
        assert!(!prompt.contains("EMERGENCY ALERT"));
        // 策略硬规则不受现金比例影响
        assert!(prompt.contains("🚨 FOMO MASTER RULES"));
    }

    #[test]
    fn test_personality_override_takes_precedence() {
        let mut account = sample_account("CONSERVATIVE");
        account.ai_personality_prompt = Some("Custom persona: only invest on Tuesdays.".to_string());
        let prompt = build_user_prompt(&account, &sample_snapshot(), PersonaStrategy::Conservative);
        assert!(prompt.contains("Custom persona: only invest on Tuesdays."));
        assert!(!prompt.contains("The Boomer:"));
    }

    #[test]
    fn test_empty_portfolio_text() {
        let account = sample_account("DIVERSIFIED");
        let mut snapshot = sample_snapshot();
        snapshot.holdings.clear();
        snapshot.holdings_value = 0.0;
        let prompt = build_user_prompt(&account, &snapshot, PersonaStrategy::Diversified);
        assert!(prompt.contains("No current holdings - 100% cash!"));
        assert!(!prompt.contains("SELL CANDIDATES"));
    }

    #[test]
    fn test_format_mtk_thousands() {
        assert_eq!(format_mtk(1_234_567.9), "1,234,567");
        assert_eq!(format_mtk(999.0), "999");
        assert_eq!(format_mtk(0.0), "0");
        assert_eq!(format_mtk(-1_234.5), "-1,235");
    }
}
