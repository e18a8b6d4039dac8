// スケジュールフィールドのパース
//
// 設定ストア・環境変数由来のスケジュール値（実行時刻、UTCオフセット、
// 開催日）を型安全な値に変換するドメイン層コンポーネント。
// 不正な入力はNoneを返し、呼び出し側でフォールバックを選択する。

use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};

/// "HH:MM"形式の実行時刻をパース
///
/// # Returns
/// 有効な場合は`Some(NaiveTime)`、形式不正の場合は`None`
pub fn parse_run_at(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// "YYYY-MM-DD"形式の開催日をパース
pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// 固定UTCオフセットをパース
///
/// 受理する形式: `+09:00` / `-05:30` / `+9` / `UTC` / `Z`
/// IANAゾーン名は受理しない（オフセット算術で開催日判定には十分）。
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return None;
    };

    let (hours_part, minutes_part) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };

    let hours: i32 = hours_part.parse().ok()?;
    let minutes: i32 = minutes_part.parse().ok()?;

    // UTCオフセットの実在範囲は±14:00
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// 指定オフセットにおける今日の日付を返す（オフセット未指定時はUTC）
pub fn today_with_offset(offset: Option<FixedOffset>) -> NaiveDate {
    match offset {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}
