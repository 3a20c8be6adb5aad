//! FILETIME 时间戳解码
//!
//! Everything 的日期字段统一是 FILETIME：自 1601-01-01 起的 100 纳秒刻度数。

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// FILETIME 纪元
fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// ISO-8601 四位年份能表示的最后一刻
fn latest() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
        .unwrap_or(NaiveDateTime::MAX)
}

/// 解码 FILETIME 刻度
///
/// `0` 表示没有时间戳，返回 `None`；超出 9999 年的值同样返回 `None`，不会 panic。
pub fn decode(ticks: u64) -> Option<NaiveDateTime> {
    if ticks == 0 {
        return None;
    }
    let micros = i64::try_from(ticks / 10).ok()?;
    let decoded = epoch().checked_add_signed(TimeDelta::microseconds(micros))?;
    (decoded <= latest()).then_some(decoded)
}

/// FILETIME 的高低两个 DWORD 合成刻度
pub fn ticks_from_parts(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// 由 FILETIME 的高低两个 DWORD 解码
pub fn decode_parts(low: u32, high: u32) -> Option<NaiveDateTime> {
    decode(ticks_from_parts(low, high))
}

/// es.exe 在 `-date-format 2` 下输出的十进制刻度；非数字返回 `None`
pub fn decode_text(raw: &str) -> Option<NaiveDateTime> {
    raw.trim().parse::<u64>().ok().and_then(decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1601-01-01 到 1970-01-01 的秒数
    const UNIX_OFFSET_SECS: u64 = 11_644_473_600;

    fn ticks_for(date: NaiveDateTime) -> u64 {
        (date.and_utc().timestamp() as u64 + UNIX_OFFSET_SECS) * 10_000_000
    }

    #[test]
    fn zero_is_absent() {
        assert_eq!(decode(0), None);
        assert_eq!(decode_parts(0, 0), None);
    }

    #[test]
    fn new_year_2024() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ticks = ticks_for(expected);
        assert_eq!(ticks, 133_485_408_000_000_000);
        assert_eq!(decode(ticks), Some(expected));
    }

    #[test]
    fn sub_microsecond_ticks_are_truncated() {
        let base = 133_485_408_000_000_000u64;
        assert_eq!(decode(base + 9), decode(base));
        let with_micro = decode(base + 10).unwrap();
        assert_eq!(with_micro.and_utc().timestamp_subsec_micros(), 1);
    }

    #[test]
    fn out_of_range_is_absent() {
        assert_eq!(decode(u64::MAX), None);
        assert_eq!(decode_parts(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn split_dwords_match_whole_value() {
        let ticks = 133_485_408_000_000_000u64;
        let low = (ticks & 0xFFFF_FFFF) as u32;
        let high = (ticks >> 32) as u32;
        assert_eq!(ticks_from_parts(low, high), ticks);
        assert_eq!(decode_parts(low, high), decode(ticks));
    }

    #[test]
    fn text_ticks() {
        assert!(decode_text(" 133485408000000000 ").is_some());
        assert_eq!(decode_text("2024-01-01 00:00"), None);
        assert_eq!(decode_text("0"), None);
    }
}
