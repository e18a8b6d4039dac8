// Discord REST APIクライアント
//
// 通知ジョブがチャンネルへメッセージを投稿するための送信クライアント。
// 指数バックオフによる再試行機能を持つ。

use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// 最大再試行回数
const MAX_RETRIES: u32 = 3;

/// リクエストタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 接続タイムアウト（秒）
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Discord REST APIベースURL
const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Discordが要求する形式のUser-Agent
const DEFAULT_USER_AGENT: &str = "DiscordBot (fight-night-bot, 0.1.0)";

/// Discord API呼び出しのエラー型
#[derive(Debug, Error)]
pub enum DiscordApiError {
    /// APIエラーレスポンス（ステータスコード付き）
    #[error("Discord APIエラー: status={status}, message={message}")]
    Api {
        /// HTTPステータスコード
        status: u16,
        /// エラーレスポンス本文
        message: String,
    },

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),
}

/// チャンネルメッセージ送信の抽象化（テスト用）
#[async_trait]
pub trait DiscordPoster: Send + Sync {
    /// チャンネルにメッセージを投稿する
    ///
    /// # 引数
    /// * `bot_token` - Bot認証トークン
    /// * `channel_id` - 投稿先チャンネルID
    /// * `content` - メッセージ本文
    async fn post_message(
        &self,
        bot_token: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<(), DiscordApiError>;
}

/// 実際のDiscord REST APIを使用する送信クライアント
///
/// トークンは保持せず、呼び出しごとに受け取る。
#[derive(Clone)]
pub struct DiscordApiClient {
    /// HTTPクライアント（再試行ミドルウェア付き）
    client: ClientWithMiddleware,
    /// APIベースURL
    base_url: String,
    /// User-Agentヘッダー値
    user_agent: String,
}

impl std::fmt::Debug for DiscordApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DiscordApiClient {
    /// 新しいクライアントを作成
    pub fn new() -> Self {
        let base_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .expect("HTTPクライアントの構築に失敗");

        // 指数バックオフ再試行ポリシー
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// ベースURLを差し替える（テスト用）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// User-Agentを差し替える
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// チャンネルメッセージ投稿エンドポイントURLを構築
    fn messages_url(&self, channel_id: &str) -> String {
        format!(
            "{}/channels/{}/messages",
            self.base_url.trim_end_matches('/'),
            channel_id
        )
    }
}

impl Default for DiscordApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscordPoster for DiscordApiClient {
    async fn post_message(
        &self,
        bot_token: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<(), DiscordApiError> {
        let url = self.messages_url(channel_id);
        debug!(channel_id = %channel_id, "チャンネルメッセージを投稿");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {bot_token}"))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| DiscordApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        error!(
            status = status.as_u16(),
            channel_id = %channel_id,
            "Discord APIがエラーを返却"
        );
        Err(DiscordApiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
