// 通知可否の判定
//
// 次回開催日・最終通知日・今日の日付から、開催通知を送るべきかを
// 判定する純粋ロジック。スケジューラーが同日に複数回トリガーしても
// 通知が一度しか送られないことをこの判定が保証する。

/// 開催通知の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementDecision {
    /// 本日が開催日で、まだ通知していない
    Announce,
    /// 本日分はすでに通知済み
    AlreadyAnnounced,
    /// 開催予定が登録されていない
    NoEventScheduled,
    /// 開催日が本日ではない
    EventNotToday,
}

/// 通知可否を判定する
///
/// # 引数
/// * `next_event_date` - 登録されている次回開催日
/// * `last_announced` - 最後に通知を送った日付
/// * `today` - Botのタイムゾーンにおける今日の日付
pub fn evaluate(
    next_event_date: Option<chrono::NaiveDate>,
    last_announced: Option<chrono::NaiveDate>,
    today: chrono::NaiveDate,
) -> AnnouncementDecision {
    let Some(event_date) = next_event_date else {
        return AnnouncementDecision::NoEventScheduled;
    };

    if event_date != today {
        return AnnouncementDecision::EventNotToday;
    }

    match last_announced {
        Some(date) if date == today => AnnouncementDecision::AlreadyAnnounced,
        _ => AnnouncementDecision::Announce,
    }
}
