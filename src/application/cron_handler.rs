// cronトリガーハンドラー
//
// スケジューラーからのHTTPトリガーを認証し、環境ブリッジ実行後に
// 通知ジョブを起動して結果を固定のレスポンス契約へ写像する。
// 認証はブリッジ・ジョブ起動を含むあらゆる副作用より前に行う
// （フェイルクローズド）。

use lambda_http::http::header::{AUTHORIZATION, CONTENT_TYPE};
use lambda_http::{Body, Request, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::application::notifier::{NotifierEnv, NotifierJob};
use crate::infrastructure::env_bridge::{ConfigSurface, EnvKey, InvocationEnv};

/// 認証失敗時のレスポンス本文（プレーンテキスト）
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";

/// ジョブ正常終了時のメッセージ
pub const SUCCESS_MESSAGE: &str = "Notifier executed";

/// cronトリガーのJSONレスポンス封筒
///
/// 成功時は`{"success":true,"message":...}`、
/// 失敗時は`{"success":false,"error":...}`の形になる。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronResponseBody {
    /// ジョブが正常終了したか
    pub success: bool,
    /// 成功メッセージ（成功時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 失敗メッセージ（失敗時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CronResponseBody {
    /// 成功封筒を作成
    pub fn executed() -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            error: None,
        }
    }

    /// 失敗封筒を作成
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// cronトリガーを処理する
///
/// # 処理フロー
/// 1. 共有シークレットによる認証（失敗時は即401、副作用なし）
/// 2. 環境ブリッジで構成サーフェスを再構築
/// 3. ブリッジ済みサーフェスからNotifierEnvを構築してジョブを起動
/// 4. 結果を固定のJSON封筒へ写像（200 / 500）
///
/// ジョブ失敗はここで捕捉してログに残し、再スローしない。
/// 再試行はトリガー元スケジューラーの責務。
pub async fn handle_cron_trigger<J: NotifierJob>(
    request: &Request,
    env: &InvocationEnv,
    job: &J,
) -> Response<Body> {
    if !authorization_matches(request, env.cron_secret.as_deref()) {
        warn!("cronトリガーの認証に失敗");
        return plain_response(401, UNAUTHORIZED_BODY);
    }

    let mut surface = ConfigSurface::new();
    surface.bridge(env);

    let notifier_env = NotifierEnv {
        bot_token: surface
            .get(EnvKey::BotToken)
            .unwrap_or_default()
            .to_string(),
        settings_store: surface.settings_store(),
    };

    match job.run(&notifier_env).await {
        Ok(()) => {
            info!("notifierを実行");
            json_response(200, &CronResponseBody::executed())
        }
        Err(err) => {
            error!(error = %err, "cron notifierの実行に失敗");
            json_response(500, &CronResponseBody::failed(err.to_string()))
        }
    }
}

/// authorizationヘッダーが`Bearer <secret>`と完全一致するか検証する
///
/// シークレット未構成（欠落・空文字）の場合は常にfalse。
fn authorization_matches(request: &Request, cron_secret: Option<&str>) -> bool {
    let Some(secret) = cron_secret else {
        return false;
    };
    if secret.is_empty() {
        return false;
    }

    let expected = format!("Bearer {secret}");
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

/// プレーンテキストレスポンスを構築
fn plain_response(status: u16, body: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::Text(body.to_string()))
        .expect("レスポンスの構築に失敗")
}

/// JSONレスポンスを構築
fn json_response(status: u16, body: &CronResponseBody) -> Response<Body> {
    let json = serde_json::to_string(body).expect("cronレスポンスのシリアライズに失敗");
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::Text(json))
        .expect("レスポンスの構築に失敗")
}
