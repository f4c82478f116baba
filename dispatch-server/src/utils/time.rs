//! 时间工具函数: 业务时区与每日窗口解析

use chrono::NaiveTime;
use chrono_tz::Tz;

/// 解析 `HH:MM`，失败返回 `fallback` 并告警
pub fn parse_hhmm(value: &str, fallback: NaiveTime) -> NaiveTime {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").unwrap_or_else(|e| {
        tracing::warn!(
            "Failed to parse time '{}': {}, falling back to {}",
            value,
            e,
            fallback.format("%H:%M")
        );
        fallback
    })
}

/// 解析 IANA 时区名，失败返回 `fallback` 并告警
pub fn parse_timezone(value: &str, fallback: Tz) -> Tz {
    value.trim().parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!("Unknown timezone '{}', falling back to {}", value, fallback);
        fallback
    })
}

/// 业务时区下的当前日期时间 (RFC 3339)，用于健康检查输出
pub fn local_now_rfc3339(tz: Tz) -> String {
    chrono::Utc::now().with_timezone(&tz).to_rfc3339()
}
