use chrono::{Datelike, NaiveDate, Weekday};

/// 美股休市日历（2025-2026 固定节假日表，周末恒为休市）
///
/// 返回休市原因，开市日返回 None。
pub fn market_closed_reason(date: NaiveDate) -> Option<&'static str> {
    match date.weekday() {
        Weekday::Sat => return Some("Saturday"),
        Weekday::Sun => return Some("Sunday"),
        _ => {}
    }

    let name = match (date.year(), date.month(), date.day()) {
        // 2025
        (2025, 1, 1) => "New Year's Day",
        (2025, 1, 20) => "Martin Luther King Jr. Day",
        (2025, 2, 17) => "Presidents' Day",
        (2025, 4, 18) => "Good Friday",
        (2025, 5, 26) => "Memorial Day",
        (2025, 6, 19) => "Juneteenth",
        (2025, 7, 4) => "Independence Day",
        (2025, 9, 1) => "Labor Day",
        (2025, 11, 27) => "Thanksgiving Day",
        (2025, 12, 25) => "Christmas Day",
        // 2026
        (2026, 1, 1) => "New Year's Day",
        (2026, 1, 19) => "Martin Luther King Jr. Day",
        (2026, 2, 16) => "Presidents' Day",
        (2026, 4, 3) => "Good Friday",
        (2026, 5, 25) => "Memorial Day",
        (2026, 6, 19) => "Juneteenth",
        (2026, 7, 3) => "Independence Day (observed)",
        (2026, 9, 7) => "Labor Day",
        (2026, 11, 26) => "Thanksgiving Day",
        (2026, 12, 25) => "Christmas Day",
        _ => return None,
    };
    Some(name)
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    market_closed_reason(date).is_none()
}
