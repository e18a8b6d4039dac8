// 実行環境ブリッジ
//
// サーバーレス実行モデルでは各invocationがプロセス状態を引き継がないため、
// invocationごとに供給される環境フィールドと設定ストアハンドルから
// 構成サーフェスを再構築する。下流のハンドラーコードは長命プロセスを
// 前提に書かれているため、ブリッジは必ずデリゲート呼び出しより前に完了させる。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::infrastructure::settings_store::SettingsStore;

/// ブリッジ対象として認識する環境変数キーの閉集合
///
/// この列挙に含まれないフィールド（cronの共有シークレット等）は
/// 構成サーフェスへ転記されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvKey {
    /// Discordアプリケーション ID
    AppId,
    /// interaction署名検証用の公開鍵
    PublicKey,
    /// Bot認証トークン
    BotToken,
    /// 外部データ取得時のUser-Agent文字列
    UserAgent,
    /// 通知ジョブの実行時刻（HH:MM）
    RunAt,
    /// タイムゾーン識別子
    Timezone,
}

impl EnvKey {
    /// 認識キーの全列挙（ブリッジはこの順に転記する）
    pub const ALL: [EnvKey; 6] = [
        EnvKey::AppId,
        EnvKey::PublicKey,
        EnvKey::BotToken,
        EnvKey::UserAgent,
        EnvKey::RunAt,
        EnvKey::Timezone,
    ];

    /// 対応する環境変数名を返す
    pub fn as_str(self) -> &'static str {
        match self {
            EnvKey::AppId => "DISCORD_APP_ID",
            EnvKey::PublicKey => "DISCORD_PUBLIC_KEY",
            EnvKey::BotToken => "DISCORD_TOKEN",
            EnvKey::UserAgent => "ESPN_USER_AGENT",
            EnvKey::RunAt => "RUN_AT",
            EnvKey::Timezone => "TZ",
        }
    }
}

/// invocationごとに供給される環境フィールド一式
///
/// 各フィールドは「欠落」または「非空文字列」のいずれか。
/// 空文字列はフィールド読み込み時点で欠落に正規化される。
/// `cron_secret`はnotifierパス専用でブリッジ対象外。
#[derive(Clone, Default)]
pub struct InvocationEnv {
    /// Discordアプリケーション ID（DISCORD_APP_ID）
    pub app_id: Option<String>,
    /// interaction署名検証用の公開鍵（DISCORD_PUBLIC_KEY、64文字hex）
    pub public_key: Option<String>,
    /// Bot認証トークン（DISCORD_TOKEN）
    pub bot_token: Option<String>,
    /// 外部データ取得時のUser-Agent文字列（ESPN_USER_AGENT）
    pub user_agent: Option<String>,
    /// 通知ジョブの実行時刻（RUN_AT）
    pub run_at: Option<String>,
    /// タイムゾーン識別子（TZ）
    pub timezone: Option<String>,
    /// cronトリガー認証用の共有シークレット（CRON_SECRET、ブリッジされない）
    pub cron_secret: Option<String>,
    /// ホストから渡される設定ストアハンドル
    pub settings_store: Option<Arc<dyn SettingsStore>>,
}

impl InvocationEnv {
    /// プロセス環境変数から現在のinvocationのフィールドを読み込む
    ///
    /// 空文字列の値は欠落として扱う。設定ストアハンドルは
    /// ホスト配線（各バイナリのmain）が構築したものを受け取るだけで、
    /// このレイヤーが自前で構築することはない。
    pub fn from_process_env(settings_store: Option<Arc<dyn SettingsStore>>) -> Self {
        Self {
            app_id: optional_env(EnvKey::AppId.as_str()),
            public_key: optional_env(EnvKey::PublicKey.as_str()),
            bot_token: optional_env(EnvKey::BotToken.as_str()),
            user_agent: optional_env(EnvKey::UserAgent.as_str()),
            run_at: optional_env(EnvKey::RunAt.as_str()),
            timezone: optional_env(EnvKey::Timezone.as_str()),
            cron_secret: optional_env("CRON_SECRET"),
            settings_store,
        }
    }

    /// 認識キーに対応するフィールド値を返す
    pub fn field(&self, key: EnvKey) -> Option<&str> {
        match key {
            EnvKey::AppId => self.app_id.as_deref(),
            EnvKey::PublicKey => self.public_key.as_deref(),
            EnvKey::BotToken => self.bot_token.as_deref(),
            EnvKey::UserAgent => self.user_agent.as_deref(),
            EnvKey::RunAt => self.run_at.as_deref(),
            EnvKey::Timezone => self.timezone.as_deref(),
        }
    }
}

impl std::fmt::Debug for InvocationEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 資格情報は存在有無のみ出力する
        f.debug_struct("InvocationEnv")
            .field("app_id", &self.app_id)
            .field("public_key_set", &self.public_key.is_some())
            .field("bot_token_set", &self.bot_token.is_some())
            .field("user_agent", &self.user_agent)
            .field("run_at", &self.run_at)
            .field("timezone", &self.timezone)
            .field("cron_secret_set", &self.cron_secret.is_some())
            .field("settings_store_set", &self.settings_store.is_some())
            .finish()
    }
}

/// 空文字列をNone扱いで環境変数を読み込むヘルパー
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// invocation開始時に再構築される構成サーフェス
///
/// 「従来型の環境変数」を保持するキー/バリューコンテナと、
/// 設定ストアハンドル用の既知スロットを持つ。invocationの応答を
/// 生成した後の生存は保証されないため、常にephemeralとして扱うこと。
#[derive(Clone, Default)]
pub struct ConfigSurface {
    /// 従来型環境変数のコンテナ（常に初期化済み）
    vars: HashMap<String, String>,
    /// 設定ストアハンドル用の既知スロット
    settings_store: Option<Arc<dyn SettingsStore>>,
}

impl ConfigSurface {
    /// 空の構成サーフェスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// InvocationEnvの内容をサーフェスへ転記する
    ///
    /// - 設定ストアハンドルは供給された場合のみスロットへ格納する
    /// - 認識キーは値が非空文字列の場合のみ転記する
    /// - 欠落・空のフィールドは既存値を一切上書きしない
    ///
    /// 同一入力で複数回呼び出しても観測可能な状態は変わらない（冪等）。
    /// エラー条件は持たない。
    pub fn bridge(&mut self, env: &InvocationEnv) {
        if let Some(store) = &env.settings_store {
            self.settings_store = Some(Arc::clone(store));
        }

        for key in EnvKey::ALL {
            match env.field(key) {
                Some(value) if !value.is_empty() => {
                    self.vars.insert(key.as_str().to_string(), value.to_string());
                }
                // 欠落・空文字は既存値を保持
                _ => {}
            }
        }

        debug!(bridged_keys = self.vars.len(), "構成サーフェスを再構築");
    }

    /// 認識キーの値を取得
    pub fn get(&self, key: EnvKey) -> Option<&str> {
        self.vars.get(key.as_str()).map(String::as_str)
    }

    /// 設定ストアハンドルを取得
    pub fn settings_store(&self) -> Option<Arc<dyn SettingsStore>> {
        self.settings_store.clone()
    }
}

impl std::fmt::Debug for ConfigSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 値にはトークン類が含まれるためキーのみ出力する
        let mut keys: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ConfigSurface")
            .field("keys", &keys)
            .field("settings_store_set", &self.settings_store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::settings_store::SettingsStoreError;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // テストで環境変数を安全に設定/削除するヘルパー
    // 注: Rust 2024エディションでset_var/remove_varはunsafe
    unsafe fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    unsafe fn cleanup_invocation_env() {
        unsafe {
            for key in EnvKey::ALL {
                remove_env(key.as_str());
            }
            remove_env("CRON_SECRET");
        }
    }

    /// 呼び出し回数だけを記録するテスト用ストア
    struct NullStore {
        call_count: AtomicUsize,
    }

    impl NullStore {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for NullStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, SettingsStoreError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), SettingsStoreError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), SettingsStoreError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // ==================== EnvKey テスト ====================

    #[test]
    fn test_env_key_names() {
        assert_eq!(EnvKey::AppId.as_str(), "DISCORD_APP_ID");
        assert_eq!(EnvKey::PublicKey.as_str(), "DISCORD_PUBLIC_KEY");
        assert_eq!(EnvKey::BotToken.as_str(), "DISCORD_TOKEN");
        assert_eq!(EnvKey::UserAgent.as_str(), "ESPN_USER_AGENT");
        assert_eq!(EnvKey::RunAt.as_str(), "RUN_AT");
        assert_eq!(EnvKey::Timezone.as_str(), "TZ");
    }

    #[test]
    fn test_env_key_all_covers_every_key() {
        // 閉集合の列挙が6キーすべてを含む
        assert_eq!(EnvKey::ALL.len(), 6);
        let names: Vec<&str> = EnvKey::ALL.iter().map(|k| k.as_str()).collect();
        assert!(names.contains(&"DISCORD_APP_ID"));
        assert!(names.contains(&"TZ"));
    }

    // ==================== ブリッジ転記テスト ====================

    /// 非空フィールドはそのままの文字列で取得できる
    #[test]
    fn test_bridge_copies_non_empty_fields() {
        let env = InvocationEnv {
            app_id: Some("123456789".to_string()),
            public_key: Some("a".repeat(64)),
            bot_token: Some("token-value".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            run_at: Some("21:00".to_string()),
            timezone: Some("-05:00".to_string()),
            ..Default::default()
        };

        let mut surface = ConfigSurface::new();
        surface.bridge(&env);

        assert_eq!(surface.get(EnvKey::AppId), Some("123456789"));
        assert_eq!(surface.get(EnvKey::PublicKey), Some("a".repeat(64).as_str()));
        assert_eq!(surface.get(EnvKey::BotToken), Some("token-value"));
        assert_eq!(surface.get(EnvKey::UserAgent), Some("Mozilla/5.0"));
        assert_eq!(surface.get(EnvKey::RunAt), Some("21:00"));
        assert_eq!(surface.get(EnvKey::Timezone), Some("-05:00"));
    }

    /// 欠落フィールドは既存値を上書きしない
    #[test]
    fn test_bridge_absent_field_preserves_prior_value() {
        let mut surface = ConfigSurface::new();
        surface.bridge(&InvocationEnv {
            bot_token: Some("original-token".to_string()),
            ..Default::default()
        });

        // bot_tokenを欠落させた2回目のブリッジ
        surface.bridge(&InvocationEnv {
            app_id: Some("123".to_string()),
            ..Default::default()
        });

        assert_eq!(surface.get(EnvKey::BotToken), Some("original-token"));
        assert_eq!(surface.get(EnvKey::AppId), Some("123"));
    }

    /// 空文字列フィールドは既存値を上書きしない
    #[test]
    fn test_bridge_empty_field_preserves_prior_value() {
        let mut surface = ConfigSurface::new();
        surface.bridge(&InvocationEnv {
            bot_token: Some("original-token".to_string()),
            ..Default::default()
        });

        surface.bridge(&InvocationEnv {
            bot_token: Some(String::new()),
            ..Default::default()
        });

        assert_eq!(surface.get(EnvKey::BotToken), Some("original-token"));
    }

    /// 認識キー以外（共有シークレット）は転記されない
    #[test]
    fn test_bridge_never_copies_cron_secret() {
        let env = InvocationEnv {
            cron_secret: Some("super-secret".to_string()),
            ..Default::default()
        };

        let mut surface = ConfigSurface::new();
        surface.bridge(&env);

        for key in EnvKey::ALL {
            assert!(surface.get(key).is_none());
        }
    }

    /// 同一入力での再ブリッジは観測可能な状態を変えない（冪等）
    #[test]
    fn test_bridge_is_idempotent() {
        let env = InvocationEnv {
            app_id: Some("123".to_string()),
            run_at: Some("21:00".to_string()),
            ..Default::default()
        };

        let mut once = ConfigSurface::new();
        once.bridge(&env);

        let mut twice = ConfigSurface::new();
        twice.bridge(&env);
        twice.bridge(&env);

        for key in EnvKey::ALL {
            assert_eq!(once.get(key), twice.get(key));
        }
        assert_eq!(once.settings_store().is_some(), twice.settings_store().is_some());
    }

    // ==================== 設定ストアスロットのテスト ====================

    /// ハンドルが供給された場合のみスロットへ格納される
    #[test]
    fn test_bridge_installs_store_iff_provided() {
        let mut surface = ConfigSurface::new();

        surface.bridge(&InvocationEnv::default());
        assert!(surface.settings_store().is_none());

        let store: Arc<dyn SettingsStore> = Arc::new(NullStore::new());
        surface.bridge(&InvocationEnv {
            settings_store: Some(store),
            ..Default::default()
        });
        assert!(surface.settings_store().is_some());
    }

    /// ハンドル欠落の再ブリッジは既存ハンドルを破棄しない
    #[test]
    fn test_bridge_absent_store_preserves_prior_handle() {
        let store: Arc<dyn SettingsStore> = Arc::new(NullStore::new());
        let mut surface = ConfigSurface::new();
        surface.bridge(&InvocationEnv {
            settings_store: Some(store),
            ..Default::default()
        });

        surface.bridge(&InvocationEnv::default());

        assert!(surface.settings_store().is_some());
    }

    /// ブリッジ自体はストアへ一切アクセスしない
    #[tokio::test]
    async fn test_bridge_performs_no_store_calls() {
        let store = Arc::new(NullStore::new());
        let handle: Arc<dyn SettingsStore> = Arc::clone(&store) as Arc<dyn SettingsStore>;

        let mut surface = ConfigSurface::new();
        surface.bridge(&InvocationEnv {
            settings_store: Some(handle),
            ..Default::default()
        });

        assert_eq!(store.call_count.load(Ordering::SeqCst), 0);
    }

    // ==================== from_process_env テスト ====================

    /// プロセス環境変数からの読み込み（空文字はNoneに正規化）
    #[test]
    #[serial(invocation_env)]
    fn test_from_process_env_reads_fields() {
        unsafe {
            cleanup_invocation_env();
            set_env("DISCORD_APP_ID", "987654321");
            set_env("DISCORD_TOKEN", "bot-token");
            set_env("ESPN_USER_AGENT", "");
            set_env("CRON_SECRET", "cron-secret");
        }

        let env = InvocationEnv::from_process_env(None);

        assert_eq!(env.app_id.as_deref(), Some("987654321"));
        assert_eq!(env.bot_token.as_deref(), Some("bot-token"));
        assert!(env.user_agent.is_none()); // 空文字列は欠落扱い
        assert!(env.public_key.is_none());
        assert_eq!(env.cron_secret.as_deref(), Some("cron-secret"));
        assert!(env.settings_store.is_none());

        unsafe {
            cleanup_invocation_env();
        }
    }

    /// 環境変数が何も設定されていない場合はすべて欠落
    #[test]
    #[serial(invocation_env)]
    fn test_from_process_env_with_nothing_set() {
        unsafe {
            cleanup_invocation_env();
        }

        let env = InvocationEnv::from_process_env(None);

        for key in EnvKey::ALL {
            assert!(env.field(key).is_none());
        }
        assert!(env.cron_secret.is_none());
    }

    // ==================== Debug出力のテスト ====================

    /// Debug出力に資格情報の値が含まれない
    #[test]
    fn test_debug_masks_credentials() {
        let env = InvocationEnv {
            bot_token: Some("very-secret-token".to_string()),
            cron_secret: Some("very-secret-cron".to_string()),
            ..Default::default()
        };

        let output = format!("{env:?}");
        assert!(!output.contains("very-secret-token"));
        assert!(!output.contains("very-secret-cron"));

        let mut surface = ConfigSurface::new();
        surface.bridge(&env);
        let output = format!("{surface:?}");
        assert!(!output.contains("very-secret-token"));
    }
}
