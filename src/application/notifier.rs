// 通知ジョブ
//
// スケジューラーからトリガーされる開催日通知ジョブの契約と本番実装。
// ジョブはBot資格情報と設定ストアハンドルのみを受け取り、
// 必要な設定はすべてストアから読み出す。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::announcement_policy::{self, AnnouncementDecision};
use crate::domain::schedule::{parse_event_date, parse_utc_offset, today_with_offset};
use crate::infrastructure::discord_api::{DiscordApiClient, DiscordApiError, DiscordPoster};
use crate::infrastructure::settings_store::{SettingsStore, SettingsStoreError};

/// 設定キー: 通知先チャンネルID
pub const SETTING_ANNOUNCE_CHANNEL: &str = "announce_channel_id";

/// 設定キー: 次回イベント名
pub const SETTING_NEXT_EVENT_NAME: &str = "next_event_name";

/// 設定キー: 次回開催日（YYYY-MM-DD）
pub const SETTING_NEXT_EVENT_DATE: &str = "next_event_date";

/// 設定キー: タイムゾーンオフセット（+09:00等）
pub const SETTING_TIMEZONE_OFFSET: &str = "timezone_offset";

/// 設定キー: 最終通知日（YYYY-MM-DD）
pub const SETTING_LAST_ANNOUNCED: &str = "last_announced_date";

/// 通知ジョブに渡される実行環境
///
/// ブリッジ済み構成サーフェスから構築される。Bot資格情報が
/// 欠落していた場合は空文字列になる（ジョブ側で検知する）。
#[derive(Clone)]
pub struct NotifierEnv {
    /// Bot認証トークン
    pub bot_token: String,
    /// 設定ストアハンドル
    pub settings_store: Option<Arc<dyn SettingsStore>>,
}

impl std::fmt::Debug for NotifierEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierEnv")
            .field("bot_token_set", &!self.bot_token.is_empty())
            .field("settings_store_set", &self.settings_store.is_some())
            .finish()
    }
}

/// 通知ジョブのエラー型
///
/// 失敗メッセージはcronトリガーのレスポンス封筒にそのまま載るため、
/// 内部の型情報を漏らさない閉じた種別で表現する。
#[derive(Debug, Error)]
pub enum NotifierError {
    /// 実行に必要な構成が欠けている
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// 設定ストア操作の失敗
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),

    /// Discord API呼び出しの失敗
    #[error(transparent)]
    Discord(#[from] DiscordApiError),

    /// メッセージを伴う実行失敗
    #[error("{0}")]
    Failed(String),

    /// 原因を分類できない失敗
    #[error("Unknown error")]
    Unknown,
}

/// 通知ジョブの契約
///
/// 正常終了で`Ok(())`、失敗で`Err(NotifierError)`を返す。
/// 再試行はこの層では行わない（トリガー元スケジューラーの責務）。
#[async_trait]
pub trait NotifierJob: Send + Sync {
    async fn run(&self, env: &NotifierEnv) -> Result<(), NotifierError>;
}

/// 開催日通知ジョブの本番実装
///
/// 設定ストアに登録された次回開催日が「今日」（設定オフセット基準）で
/// あれば通知チャンネルへ一度だけ告知し、通知日を記録する。
/// 同日に複数回トリガーされても記録済みの通知日により二重送信しない。
pub struct FightNightNotifier {
    /// メッセージ送信クライアント
    discord: Arc<dyn DiscordPoster>,
}

impl FightNightNotifier {
    /// 本番のDiscord APIクライアントで作成
    pub fn new() -> Self {
        Self {
            discord: Arc::new(DiscordApiClient::new()),
        }
    }

    /// 送信クライアントを差し替えて作成（テスト用）
    pub fn with_poster(discord: Arc<dyn DiscordPoster>) -> Self {
        Self { discord }
    }
}

impl Default for FightNightNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotifierJob for FightNightNotifier {
    async fn run(&self, env: &NotifierEnv) -> Result<(), NotifierError> {
        let store = env.settings_store.as_ref().ok_or_else(|| {
            NotifierError::ConfigurationMissing("settings store handle".to_string())
        })?;

        if env.bot_token.is_empty() {
            return Err(NotifierError::ConfigurationMissing("bot token".to_string()));
        }

        let Some(channel_id) = store.get(SETTING_ANNOUNCE_CHANNEL).await? else {
            info!("通知チャンネル未設定のためスキップ");
            return Ok(());
        };

        // タイムゾーンオフセットが不正な場合はUTCとして扱う
        let offset = match store.get(SETTING_TIMEZONE_OFFSET).await? {
            Some(raw) => {
                let parsed = parse_utc_offset(&raw);
                if parsed.is_none() {
                    warn!(value = %raw, "timezone_offsetが不正、UTCとして扱う");
                }
                parsed
            }
            None => None,
        };
        let today = today_with_offset(offset);

        let next_event_date = match store.get(SETTING_NEXT_EVENT_DATE).await? {
            Some(raw) => match parse_event_date(&raw) {
                Some(date) => Some(date),
                None => {
                    return Err(NotifierError::Failed(format!(
                        "invalid next_event_date: {raw}"
                    )));
                }
            },
            None => None,
        };

        let last_announced = store
            .get(SETTING_LAST_ANNOUNCED)
            .await?
            .and_then(|raw| parse_event_date(&raw));

        let decision = announcement_policy::evaluate(next_event_date, last_announced, today);

        match decision {
            AnnouncementDecision::Announce => {
                let event_name = store
                    .get(SETTING_NEXT_EVENT_NAME)
                    .await?
                    .unwrap_or_else(|| "Fight night".to_string());
                let content = format!("🥊 **{event_name}** is tonight! Tune in for the card.");

                self.discord
                    .post_message(&env.bot_token, &channel_id, &content)
                    .await?;

                let today_value = today.format("%Y-%m-%d").to_string();
                store.put(SETTING_LAST_ANNOUNCED, &today_value).await?;

                info!(channel_id = %channel_id, event_name = %event_name, "開催日通知を送信");
            }
            AnnouncementDecision::AlreadyAnnounced => {
                info!("本日分は通知済み");
            }
            AnnouncementDecision::NoEventScheduled => {
                info!("開催予定が未登録");
            }
            AnnouncementDecision::EventNotToday => {
                info!("本日は開催日ではない");
            }
        }

        Ok(())
    }
}
