// コマンドハンドラー
//
// スラッシュコマンドの実装とレジストリの組み立て。
// ハンドラーはブリッジ済み構成サーフェス経由で設定ストアへアクセスする。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::application::notifier::{SETTING_NEXT_EVENT_DATE, SETTING_NEXT_EVENT_NAME};
use crate::domain::schedule::parse_run_at;
use crate::infrastructure::env_bridge::{ConfigSurface, EnvKey};
use crate::infrastructure::interaction_gateway::{
    HandlerError, HandlerRegistry, InteractionHandler,
};

/// interactionレスポンス種別: メッセージ応答
const CHANNEL_MESSAGE_WITH_SOURCE: u64 = 4;

/// メッセージフラグ: エフェメラル（実行者にのみ表示）
const EPHEMERAL_FLAG: u64 = 64;

/// エフェメラルなメッセージ応答を構築
fn ephemeral_message(content: &str) -> Value {
    json!({
        "type": CHANNEL_MESSAGE_WITH_SOURCE,
        "data": { "content": content, "flags": EPHEMERAL_FLAG }
    })
}

/// `/nextfight` - 次回開催イベントを応答するコマンド
///
/// 設定ストアに登録されたイベント名・開催日を読み出し、
/// RUN_ATが構成されていればカード開始時刻も併記する。
pub struct NextFightCommand;

#[async_trait]
impl InteractionHandler for NextFightCommand {
    async fn call(&self, _payload: &Value, surface: &ConfigSurface) -> Result<Value, HandlerError> {
        let Some(store) = surface.settings_store() else {
            return Err(HandlerError::Failed(
                "settings store is not available".to_string(),
            ));
        };

        let event_name = store
            .get(SETTING_NEXT_EVENT_NAME)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        let event_date = store
            .get(SETTING_NEXT_EVENT_DATE)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        let mut content = match (event_name, event_date) {
            (Some(name), Some(date)) => format!("Next fight night: **{name}** on {date}."),
            (Some(name), None) => format!("Next fight night: **{name}** (date TBD)."),
            _ => "No fight night is currently scheduled.".to_string(),
        };

        // 実行時刻が構成済みかつ有効な形式なら開始時刻を併記
        if let Some(run_at) = surface.get(EnvKey::RunAt) {
            if parse_run_at(run_at).is_some() {
                let timezone = surface.get(EnvKey::Timezone).unwrap_or("UTC");
                content.push_str(&format!(" Card notifications go out at {run_at} ({timezone})."));
            }
        }

        Ok(ephemeral_message(&content))
    }
}

/// 登録済みコマンド一式からレジストリを構築
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register_command("nextfight", Arc::new(NextFightCommand));
    registry
}
