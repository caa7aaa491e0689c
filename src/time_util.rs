use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

/// 美东时间固定按 UTC-5 处理（与线上结算口径一致，不随夏令时切换）
pub fn eastern_offset() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).expect("valid fixed offset")
}

/// UTC 时间转美东时间
pub fn to_eastern(utc: DateTime<Utc>) -> DateTime<FixedOffset> {
    utc.with_timezone(&eastern_offset())
}

/// 当前美东时间
pub fn eastern_now() -> DateTime<FixedOffset> {
    to_eastern(Utc::now())
}

/// 当前毫秒时间戳（行情请求的防缓存参数）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 交易场次：每个交易日上下午各一场
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingSession {
    Morning,
    Afternoon,
}

impl TradingSession {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingSession::Morning => "morning",
            TradingSession::Afternoon => "afternoon",
        }
    }
}

/// 按美东时间划分场次：12:00 前为 morning，其后为 afternoon
pub fn session_for(eastern: DateTime<FixedOffset>) -> TradingSession {
    if eastern.hour() < 12 {
        TradingSession::Morning
    } else {
        TradingSession::Afternoon
    }
}

/// 计算执行槽位：(美东日历日期, 场次)
pub fn current_slot(utc: DateTime<Utc>) -> (NaiveDate, TradingSession) {
    let eastern = to_eastern(utc);
    (eastern.date_naive(), session_for(eastern))
}
