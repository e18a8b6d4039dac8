/// Discord interaction HTTPエントリポイント
///
/// Lambda Function URL経由で受信したinteractionリクエストを処理する。
/// invocationごとに環境ブリッジで構成サーフェスを再構築し、
/// 署名検証とハンドラーディスパッチはゲートウェイへ委譲する。
use std::sync::Arc;

use fight_night_bot::application::{build_registry, handle_interaction};
use fight_night_bot::infrastructure::{
    init_logging, DynamoDbSettingsStore, HandlerRegistry, InvocationEnv, SettingsStore,
    SignedInteractionGateway,
};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    info!("interactions Lambda関数を初期化");

    // ホスト配線: 設定ストアハンドルはここで一度だけ構築し、
    // 以降はinvocationごとにハンドラーへ渡すだけ
    let settings_store: Option<Arc<dyn SettingsStore>> =
        match DynamoDbSettingsStore::from_env().await {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                warn!(error = %err, "設定ストアなしで起動");
                None
            }
        };

    let gateway = SignedInteractionGateway::new();
    let registry = Arc::new(build_registry());

    info!(
        command_count = registry.command_count(),
        "ハンドラーレジストリを構築"
    );

    // Lambda関数を実行
    run(service_fn(move |request: Request| {
        let registry = Arc::clone(&registry);
        let settings_store = settings_store.clone();
        async move { handler(request, &gateway, &registry, settings_store).await }
    }))
    .await
}

/// HTTPリクエストハンドラー
///
/// プロセス環境変数から現在のinvocationの環境フィールドを読み込み、
/// interactionデリゲートへ渡す。ゲートウェイ内部のエラーは
/// Lambdaランタイムの既定エラー応答へそのまま伝播する。
async fn handler(
    request: Request,
    gateway: &SignedInteractionGateway,
    registry: &HandlerRegistry,
    settings_store: Option<Arc<dyn SettingsStore>>,
) -> Result<Response<Body>, Error> {
    let env = InvocationEnv::from_process_env(settings_store);
    let response = handle_interaction(request, &env, gateway, registry).await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Request as HttpRequest;
    use serial_test::serial;

    // テストで環境変数を安全に設定/削除するヘルパー
    // 注: Rust 2024エディションでset_var/remove_varはunsafe
    unsafe fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn interaction_request() -> Request {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/bot")
            .body(Body::Text(r#"{"type":1}"#.to_string()))
            .unwrap()
    }

    /// 公開鍵未構成時はハンドラーがエラーを返す（プラットフォーム既定の500へ）
    #[tokio::test]
    #[serial(invocation_env)]
    async fn test_handler_without_public_key_fails() {
        unsafe {
            remove_env("DISCORD_PUBLIC_KEY");
        }

        let gateway = SignedInteractionGateway::new();
        let registry = build_registry();

        let result = handler(interaction_request(), &gateway, &registry, None).await;

        assert!(result.is_err());
    }

    /// 公開鍵構成済みでも署名なしリクエストは401
    #[tokio::test]
    #[serial(invocation_env)]
    async fn test_handler_with_unsigned_request_returns_401() {
        let keypair = vodozemac::Ed25519Keypair::new();
        unsafe {
            set_env(
                "DISCORD_PUBLIC_KEY",
                &hex::encode(keypair.public_key().as_bytes()),
            );
        }

        let gateway = SignedInteractionGateway::new();
        let registry = build_registry();

        let response = handler(interaction_request(), &gateway, &registry, None)
            .await
            .unwrap();

        assert_eq!(response.status(), 401);

        unsafe {
            remove_env("DISCORD_PUBLIC_KEY");
        }
    }
}
