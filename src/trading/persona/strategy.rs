/// AI 角色策略档案：每个策略一组仓位区间与行为文案
///
/// 未识别的策略码一律落到 Moderate，给 20-30% 的温和区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaStrategy {
    Conservative,
    Diversified,
    AllIn,
    HoldForever,
    TechOnly,
    SaasOnly,
    Momentum,
    TrendFollow,
    Contrarian,
    PerfectTiming,
    Moderate,
}

impl PersonaStrategy {
    pub fn from_code(code: &str) -> Self {
        match code {
            "CONSERVATIVE" => PersonaStrategy::Conservative,
            "DIVERSIFIED" => PersonaStrategy::Diversified,
            "ALL_IN" => PersonaStrategy::AllIn,
            "HOLD_FOREVER" => PersonaStrategy::HoldForever,
            "TECH_ONLY" => PersonaStrategy::TechOnly,
            "SAAS_ONLY" => PersonaStrategy::SaasOnly,
            "MOMENTUM" => PersonaStrategy::Momentum,
            "TREND_FOLLOW" => PersonaStrategy::TrendFollow,
            "CONTRARIAN" => PersonaStrategy::Contrarian,
            "PERFECT_TIMING" => PersonaStrategy::PerfectTiming,
            _ => PersonaStrategy::Moderate,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PersonaStrategy::Conservative => "CONSERVATIVE",
            PersonaStrategy::Diversified => "DIVERSIFIED",
            PersonaStrategy::AllIn => "ALL_IN",
            PersonaStrategy::HoldForever => "HOLD_FOREVER",
            PersonaStrategy::TechOnly => "TECH_ONLY",
            PersonaStrategy::SaasOnly => "SAAS_ONLY",
            PersonaStrategy::Momentum => "MOMENTUM",
            PersonaStrategy::TrendFollow => "TREND_FOLLOW",
            PersonaStrategy::Contrarian => "CONTRARIAN",
            PersonaStrategy::PerfectTiming => "PERFECT_TIMING",
            PersonaStrategy::Moderate => "MODERATE",
        }
    }

    /// 单笔预算区间，可用现金的百分比下上限
    pub fn band(&self) -> (f64, f64) {
        match self {
            PersonaStrategy::Conservative => (0.05, 0.15),
            PersonaStrategy::Diversified => (0.15, 0.25),
            PersonaStrategy::AllIn => (0.80, 0.95),
            PersonaStrategy::HoldForever => (0.30, 0.50),
            PersonaStrategy::TechOnly => (0.25, 0.45),
            PersonaStrategy::SaasOnly => (0.30, 0.50),
            PersonaStrategy::Momentum => (0.60, 0.90),
            PersonaStrategy::TrendFollow => (0.30, 0.60),
            PersonaStrategy::Contrarian => (0.25, 0.55),
            PersonaStrategy::PerfectTiming => (0.20, 0.45),
            PersonaStrategy::Moderate => (0.20, 0.30),
        }
    }

    pub fn band_suggestion(&self) -> &'static str {
        match self {
            PersonaStrategy::Conservative => "5-15% per trade (small, cautious positions)",
            PersonaStrategy::Diversified => "15-25% per trade (balanced approach)",
            PersonaStrategy::AllIn => "80-95% all at once (GO BIG!)",
            PersonaStrategy::HoldForever => "30-50% when buying (then NEVER sell)",
            PersonaStrategy::TechOnly => "25-45% per tech stock",
            PersonaStrategy::SaasOnly => "30-50% per SaaS play",
            PersonaStrategy::Momentum => "60-90% FOMO HARD - can't miss this!",
            PersonaStrategy::TrendFollow => "30-60% follow the momentum",
            PersonaStrategy::Contrarian => "25-55% buy the dip aggressively",
            PersonaStrategy::PerfectTiming => "20-45% precise entries/exits",
            PersonaStrategy::Moderate => "20-30% moderate position",
        }
    }

    pub fn guidelines(&self) -> &'static str {
        match self {
            PersonaStrategy::Conservative => "The Boomer: ONLY invest in established, proven companies. Prefer companies with strong fundamentals and track records. Avoid risky startups. Small positions. Prefer holding over frequent trading. You lived through dot-com crash - never again!",
            PersonaStrategy::Diversified => "Steady Eddie: MUST spread investments across at least 4 different companies. Balance growth vs stability. Regular rebalancing. Never go all-in on one stock.",
            PersonaStrategy::AllIn => "YOLO Kid: Pick ONE stock you believe in and BET BIG (80-95%). High risk = high reward. Fortune favors the bold! No half measures!",
            PersonaStrategy::HoldForever => "Diamond Hands: Buy quality and NEVER EVER SELL. Long-term value investing. Ignore ALL short-term volatility. Paper hands lose, diamond hands WIN. 💎🙌",
            PersonaStrategy::TechOnly => "Silicon Brain: ONLY companies categorized as \"Enterprise\" (business software, enterprise tech). NO consumer products, NO social impact. Filter companies by category=\"Enterprise\" ONLY. If no Enterprise companies are attractive, HOLD - never compromise your standards!",
            PersonaStrategy::SaasOnly => "Cloud Surfer: ONLY companies categorized as \"Enterprise\" (cloud software, SaaS with recurring revenue). Filter companies by category=\"Enterprise\" ONLY. Consumer/social impact are NOT enterprise SaaS. If no Enterprise companies fit, HOLD - never violate the B2B rule!",
            PersonaStrategy::Momentum => "FOMO Master: You HATE missing gains! Buy stocks rising 1%+. Stock falling 1%+? SELL IT NOW! Sitting on >40% cash is UNACCEPTABLE - you MUST be in the market!",
            PersonaStrategy::TrendFollow => "Hype Train: Ride trends. Buy stocks with positive momentum. Sell losers down even 1-2% quickly. Follow the crowd to profits!",
            PersonaStrategy::Contrarian => "The Contrarian: Buy when others panic-sell (falling stocks). SELL when others FOMO-buy (rising stocks 2%+). Go against the herd ALWAYS. If position is UP, consider SELLING!",
            PersonaStrategy::PerfectTiming => "The Oracle: Buy low, sell high. Look for oversold opportunities (down 2%+). Exit overbought peaks (up 3%+). Precision timing wins.",
            PersonaStrategy::Moderate => "Follow your instincts.",
        }
    }

    pub fn sell_triggers(&self) -> &'static str {
        match self {
            PersonaStrategy::Conservative => "SELL positions that have gained 5%+ to lock in profits. SELL losers down 3%+ to cut losses. Protect capital!",
            PersonaStrategy::Diversified => "SELL to rebalance - no single position should exceed 25% of portfolio. SELL positions up 5%+ or down 3%+.",
            PersonaStrategy::AllIn => "SELL everything in current position to go ALL-IN on a better opportunity. One position at a time!",
            PersonaStrategy::HoldForever => "NEVER SELL. Diamond hands means HOLDING through ALL volatility. Selling is for paper hands!",
            PersonaStrategy::TechOnly => "SELL any non-Enterprise/B2B positions immediately! SELL tech stocks down 3%+ or up 8%+.",
            PersonaStrategy::SaasOnly => "SELL any non-Enterprise positions immediately! SELL SaaS stocks down 3%+ or if better SaaS opportunity exists.",
            PersonaStrategy::Momentum => "SELL IMMEDIATELY if position drops 1%+ from purchase! SELL winners up 3%+ to catch the next wave. Stay nimble!",
            PersonaStrategy::TrendFollow => "SELL when momentum reverses - if stock was up and now falling, EXIT! Any position down 2%+ must go!",
            PersonaStrategy::Contrarian => "SELL when everyone is buying! If a stock rises 3%+ and gets hyped, time to take profits and go against the crowd.",
            PersonaStrategy::PerfectTiming => "SELL at peaks! Position up 3%+? Lock profits. Position down 3%+? Cut losses. Timing is everything.",
            PersonaStrategy::Moderate => "Consider selling positions that no longer fit your strategy.",
        }
    }

    /// 附加在提示词尾部的策略专属硬规则
    pub fn special_rule(&self) -> Option<&'static str> {
        match self {
            PersonaStrategy::Momentum => Some("🚨 FOMO MASTER RULES: Stock up 2%+? BUY NOW! Stock down 2%+? Consider SELLING! You HATE missing opportunities!"),
            PersonaStrategy::HoldForever => Some("💎 DIAMOND HANDS RULE: You can BUY but NEVER SELL. Selling is for paper hands!"),
            PersonaStrategy::AllIn => Some("🎲 YOLO KID RULE: Go MASSIVE (80-95% of balance) or go home! Small positions are FORBIDDEN!"),
            PersonaStrategy::Contrarian => Some("🔄 CONTRARIAN RULE: Stock rising? Consider SELLING. Stock falling? Time to BUY!"),
            PersonaStrategy::TechOnly => Some("🖥️ ENTERPRISE TECH RULE: ONLY companies with category=\"Enterprise/B2B\" allowed! Filter by category field. Consumer and Social Impact are FORBIDDEN!"),
            PersonaStrategy::SaasOnly => Some("☁️ ENTERPRISE B2B RULE: ONLY companies with category=\"Enterprise/B2B\" allowed! Filter by category field. Consumer and Social Impact categories FORBIDDEN!"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_known_strategies() {
        assert_eq!(PersonaStrategy::from_code("ALL_IN"), PersonaStrategy::AllIn);
        assert_eq!(PersonaStrategy::from_code("MOMENTUM"), PersonaStrategy::Momentum);
        assert_eq!(
            PersonaStrategy::from_code("PERFECT_TIMING"),
            PersonaStrategy::PerfectTiming
        );
    }

    #[test]
    fn test_unknown_code_falls_back_to_moderate() {
        assert_eq!(PersonaStrategy::from_code("WSB_DEGEN"), PersonaStrategy::Moderate);
        assert_eq!(PersonaStrategy::from_code(""), PersonaStrategy::Moderate);
        assert_eq!(PersonaStrategy::Moderate.band(), (0.20, 0.30));
    }

    #[test]
    fn test_bands_are_ordered_fractions() {
        let all = [
            PersonaStrategy::Conservative,
            PersonaStrategy::Diversified,
            PersonaStrategy::AllIn,
            PersonaStrategy::HoldForever,
            PersonaStrategy::TechOnly,
            PersonaStrategy::SaasOnly,
            PersonaStrategy::Momentum,
            PersonaStrategy::TrendFollow,
            PersonaStrategy::Contrarian,
            PersonaStrategy::PerfectTiming,
            PersonaStrategy::Moderate,
        ];
        for s in all {
            let (lo, hi) = s.band();
            assert!(lo > 0.0 && hi <= 0.95 && lo < hi, "bad band for {:?}", s);
        }
        assert_eq!(PersonaStrategy::AllIn.band(), (0.80, 0.95));
        assert_eq!(PersonaStrategy::Conservative.band(), (0.05, 0.15));
    }
}
