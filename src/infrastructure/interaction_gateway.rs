// Interactionゲートウェイ
//
// 受信したinteractionリクエストの署名検証と、登録済みハンドラー
// （コマンド/コンポーネント/イベント）へのディスパッチを行う。
// 署名はX-Signature-Ed25519 / X-Signature-Timestampヘッダーと
// リクエストボディから検証する（Discordのinteractionエンドポイント仕様）。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lambda_http::http::header::CONTENT_TYPE;
use lambda_http::{Body, Request, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use vodozemac::{Ed25519PublicKey, Ed25519Signature};

use crate::infrastructure::env_bridge::{ConfigSurface, EnvKey};

/// 署名ヘッダー名
const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// 署名タイムスタンプヘッダー名
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// interaction種別: PING
const INTERACTION_PING: u64 = 1;

/// interaction種別: アプリケーションコマンド
const INTERACTION_APPLICATION_COMMAND: u64 = 2;

/// interaction種別: メッセージコンポーネント
const INTERACTION_MESSAGE_COMPONENT: u64 = 3;

/// interaction種別: モーダル送信
const INTERACTION_MODAL_SUBMIT: u64 = 5;

/// Webhookイベント種別: PING
const WEBHOOK_PING: u64 = 0;

/// Webhookイベント種別: イベント通知
const WEBHOOK_EVENT: u64 = 1;

/// ハンドラー実行のエラー型
#[derive(Debug, Error)]
pub enum HandlerError {
    /// ハンドラーがメッセージ付きで失敗
    #[error("{0}")]
    Failed(String),
}

/// 個々のinteractionハンドラーの契約
///
/// 生のinteractionペイロードとブリッジ済み構成サーフェスを受け取り、
/// interactionレスポンス本文（JSON値）を返す。
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn call(&self, payload: &Value, surface: &ConfigSurface) -> Result<Value, HandlerError>;
}

/// 登録済みハンドラーのレジストリ
///
/// コマンドはコマンド名、コンポーネントはcustom_id、
/// イベントはイベント種別文字列で引く。
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    commands: HashMap<String, Arc<dyn InteractionHandler>>,
    components: HashMap<String, Arc<dyn InteractionHandler>>,
    events: HashMap<String, Arc<dyn InteractionHandler>>,
}

impl HandlerRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// コマンドハンドラーを登録
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) {
        self.commands.insert(name.into(), handler);
    }

    /// コンポーネントハンドラーを登録
    pub fn register_component(
        &mut self,
        custom_id: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) {
        self.components.insert(custom_id.into(), handler);
    }

    /// イベントハンドラーを登録
    pub fn register_event(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn InteractionHandler>,
    ) {
        self.events.insert(event_type.into(), handler);
    }

    /// コマンドハンドラーを名前で取得
    pub fn command(&self, name: &str) -> Option<&Arc<dyn InteractionHandler>> {
        self.commands.get(name)
    }

    /// コンポーネントハンドラーをcustom_idで取得
    pub fn component(&self, custom_id: &str) -> Option<&Arc<dyn InteractionHandler>> {
        self.components.get(custom_id)
    }

    /// イベントハンドラーを種別で取得
    pub fn event(&self, event_type: &str) -> Option<&Arc<dyn InteractionHandler>> {
        self.events.get(event_type)
    }

    /// 登録済みコマンド数
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// ゲートウェイ内部のエラー型
///
/// ここでのエラーはホスティングプラットフォームの既定エラー応答に
/// そのまま伝播する（この層では変換しない）。
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 公開鍵が構成されていない
    #[error("DISCORD_PUBLIC_KEYが構成されていません")]
    MissingPublicKey,

    /// 公開鍵の形式が不正
    #[error("公開鍵の形式が不正です: {0}")]
    InvalidPublicKey(String),

    /// ハンドラー実行の失敗
    #[error("ハンドラー実行に失敗しました: {0}")]
    Handler(#[from] HandlerError),
}

/// Botフレームワーク境界の契約
///
/// デリゲートは受信リクエストとレジストリを無加工でここへ渡し、
/// 返されたレスポンスをそのまま返却する。
#[async_trait]
pub trait InteractionGateway: Send + Sync {
    async fn handle(
        &self,
        request: Request,
        registry: &HandlerRegistry,
        surface: &ConfigSurface,
    ) -> Result<Response<Body>, GatewayError>;
}

/// Ed25519署名検証付きのゲートウェイ実装
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedInteractionGateway;

impl SignedInteractionGateway {
    /// 新しいゲートウェイを作成
    pub fn new() -> Self {
        Self
    }

    /// ブリッジ済みサーフェスから検証用公開鍵をパース
    fn parse_public_key(surface: &ConfigSurface) -> Result<Ed25519PublicKey, GatewayError> {
        let hex_key = surface
            .get(EnvKey::PublicKey)
            .ok_or(GatewayError::MissingPublicKey)?;

        let bytes =
            hex::decode(hex_key).map_err(|e| GatewayError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            GatewayError::InvalidPublicKey("公開鍵は32バイトである必要があります".to_string())
        })?;

        Ed25519PublicKey::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidPublicKey(e.to_string()))
    }

    /// リクエスト署名を検証する
    ///
    /// 署名対象はタイムスタンプ文字列とボディの連結。
    /// ヘッダー欠落・形式不正・検証失敗はすべてfalse。
    fn verify_signature(request: &Request, public_key: &Ed25519PublicKey) -> bool {
        let Some(signature_hex) = header_str(request, SIGNATURE_HEADER) else {
            return false;
        };
        let Some(timestamp) = header_str(request, TIMESTAMP_HEADER) else {
            return false;
        };
        let Ok(signature_bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Ed25519Signature::from_slice(&signature_bytes) else {
            return false;
        };

        let body: &[u8] = request.body();
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        public_key.verify(&message, &signature).is_ok()
    }

    /// Webhookイベントペイロードをディスパッチ
    async fn dispatch_event(
        &self,
        payload: &Value,
        registry: &HandlerRegistry,
        surface: &ConfigSurface,
    ) -> Result<Response<Body>, GatewayError> {
        let webhook_type = payload.get("type").and_then(Value::as_u64);

        match webhook_type {
            Some(WEBHOOK_PING) => Ok(empty_response(204)),
            Some(WEBHOOK_EVENT) => {
                let Some(event_type) = payload.pointer("/event/type").and_then(Value::as_str)
                else {
                    warn!("イベント種別が欠落したWebhookペイロード");
                    return Ok(plain_response(400, "missing event type"));
                };

                match registry.event(event_type) {
                    Some(handler) => {
                        debug!(event_type = %event_type, "イベントハンドラーを実行");
                        handler.call(payload, surface).await?;
                    }
                    None => {
                        debug!(event_type = %event_type, "未登録のイベント種別");
                    }
                }

                // イベントは受理応答のみ（本文なし）
                Ok(empty_response(204))
            }
            _ => Ok(plain_response(400, "unsupported webhook type")),
        }
    }
}

#[async_trait]
impl InteractionGateway for SignedInteractionGateway {
    async fn handle(
        &self,
        request: Request,
        registry: &HandlerRegistry,
        surface: &ConfigSurface,
    ) -> Result<Response<Body>, GatewayError> {
        let public_key = Self::parse_public_key(surface)?;

        if !Self::verify_signature(&request, &public_key) {
            warn!("interaction署名の検証に失敗");
            return Ok(plain_response(401, "invalid request signature"));
        }

        let body: &[u8] = request.body();
        let payload: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "interactionボディのパースに失敗");
                return Ok(plain_response(400, "invalid request body"));
            }
        };

        // Webhookイベントはinteractionとは別系統のペイロード
        if payload.get("event").is_some() {
            return self.dispatch_event(&payload, registry, surface).await;
        }

        let interaction_type = payload.get("type").and_then(Value::as_u64).unwrap_or(0);

        match interaction_type {
            INTERACTION_PING => Ok(json_response(200, &json!({ "type": 1 }))),
            INTERACTION_APPLICATION_COMMAND => {
                let Some(name) = payload.pointer("/data/name").and_then(Value::as_str) else {
                    return Ok(plain_response(400, "missing command name"));
                };

                match registry.command(name) {
                    Some(handler) => {
                        debug!(command = %name, "コマンドハンドラーを実行");
                        let response = handler.call(&payload, surface).await?;
                        Ok(json_response(200, &response))
                    }
                    None => {
                        warn!(command = %name, "未登録のコマンド");
                        Ok(plain_response(404, "Unknown command"))
                    }
                }
            }
            INTERACTION_MESSAGE_COMPONENT | INTERACTION_MODAL_SUBMIT => {
                let Some(custom_id) = payload.pointer("/data/custom_id").and_then(Value::as_str)
                else {
                    return Ok(plain_response(400, "missing custom id"));
                };

                match registry.component(custom_id) {
                    Some(handler) => {
                        debug!(custom_id = %custom_id, "コンポーネントハンドラーを実行");
                        let response = handler.call(&payload, surface).await?;
                        Ok(json_response(200, &response))
                    }
                    None => {
                        warn!(custom_id = %custom_id, "未登録のコンポーネント");
                        Ok(plain_response(404, "Unknown component"))
                    }
                }
            }
            other => {
                warn!(interaction_type = other, "未対応のinteraction種別");
                Ok(plain_response(400, "unsupported interaction type"))
            }
        }
    }
}

/// ヘッダー値を文字列として取得
fn header_str<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

/// プレーンテキストレスポンスを構築
fn plain_response(status: u16, body: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::Text(body.to_string()))
        .expect("レスポンスの構築に失敗")
}

/// JSONレスポンスを構築
fn json_response(status: u16, value: &Value) -> Response<Body> {
    let json = serde_json::to_string(value).expect("interactionレスポンスのシリアライズに失敗");
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::Text(json))
        .expect("レスポンスの構築に失敗")
}

/// 本文なしレスポンスを構築
fn empty_response(status: u16) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::Empty)
        .expect("レスポンスの構築に失敗")
}
