/// cronトリガーHTTPエントリポイント
///
/// 外部スケジューラーからのHTTPトリガーを受け、共有シークレットで
/// 認証した上で開催日通知ジョブを実行する。結果は固定のJSON封筒で
/// 返却する（200 / 401 / 500）。
use std::sync::Arc;

use fight_night_bot::application::{handle_cron_trigger, FightNightNotifier, NotifierJob};
use fight_night_bot::infrastructure::{
    init_logging, DynamoDbSettingsStore, InvocationEnv, SettingsStore,
};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    info!("cron Lambda関数を初期化");

    // ホスト配線: 設定ストアハンドルはここで一度だけ構築する
    let settings_store: Option<Arc<dyn SettingsStore>> =
        match DynamoDbSettingsStore::from_env().await {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                warn!(error = %err, "設定ストアなしで起動");
                None
            }
        };

    let notifier = Arc::new(FightNightNotifier::new());

    // Lambda関数を実行
    run(service_fn(move |request: Request| {
        let notifier = Arc::clone(&notifier);
        let settings_store = settings_store.clone();
        async move { handler(request, notifier.as_ref(), settings_store).await }
    }))
    .await
}

/// HTTPリクエストハンドラー
///
/// プロセス環境変数から現在のinvocationの環境フィールドを読み込み、
/// cronトリガーハンドラーへ渡す。トリガーハンドラーは常に
/// レスポンスを返すため、ここでエラーになることはない。
async fn handler<J: NotifierJob>(
    request: Request,
    job: &J,
    settings_store: Option<Arc<dyn SettingsStore>>,
) -> Result<Response<Body>, Error> {
    let env = InvocationEnv::from_process_env(settings_store);
    Ok(handle_cron_trigger(&request, &env, job).await)
}
