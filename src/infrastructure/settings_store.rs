// 設定ストア
//
// Botの可変設定（通知チャンネル、次回イベント等）を保持する
// 永続キー/バリューストアの契約と、そのDynamoDB実装。
// ストアの所有者はホスト側であり、ハンドラーはinvocationごとに
// 渡されたハンドルを転送するだけでストアを構築しない。

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;
use tracing::debug;

/// 設定テーブル名を指定する環境変数
const SETTINGS_TABLE_VAR: &str = "SETTINGS_TABLE";

/// パーティションキー属性名
const KEY_ATTRIBUTE: &str = "setting_key";

/// 値属性名
const VALUE_ATTRIBUTE: &str = "setting_value";

/// 設定ストア操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsStoreError {
    /// 必要な環境変数が設定されていない
    #[error("環境変数が設定されていません: {0}")]
    MissingEnvVar(String),

    /// ストアからの読み取りに失敗
    #[error("設定の読み取りに失敗しました: {0}")]
    ReadError(String),

    /// ストアへの書き込みに失敗
    #[error("設定の書き込みに失敗しました: {0}")]
    WriteError(String),
}

/// 永続設定ストアの契約
///
/// get/putに加えてdeleteを公開する。実装は異なるバックエンドを
/// 選択できる（本番はDynamoDB、テストはインメモリモック）。
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// キーに対応する値を取得する（存在しない場合は`Ok(None)`）
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsStoreError>;

    /// キーに値を保存する（既存値は上書き）
    async fn put(&self, key: &str, value: &str) -> Result<(), SettingsStoreError>;

    /// キーを削除する（存在しなかった場合も`Ok(())`）
    async fn delete(&self, key: &str) -> Result<(), SettingsStoreError>;
}

/// SettingsStoreのDynamoDB実装
///
/// 単一テーブルに`setting_key`をパーティションキー、
/// `setting_value`を値として保存する。
#[derive(Debug, Clone)]
pub struct DynamoDbSettingsStore {
    /// DynamoDBクライアント
    client: DynamoDbClient,
    /// 設定テーブル名
    table_name: String,
}

impl DynamoDbSettingsStore {
    /// 明示的な値でストアを作成
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// 環境からAWS設定を読み込み、SETTINGS_TABLE環境変数からテーブル名を読み取る
    ///
    /// # エラー
    /// SETTINGS_TABLEが設定されていない場合はエラーを返す
    pub async fn from_env() -> Result<Self, SettingsStoreError> {
        let table_name = std::env::var(SETTINGS_TABLE_VAR)
            .map_err(|_| SettingsStoreError::MissingEnvVar(SETTINGS_TABLE_VAR.to_string()))?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = DynamoDbClient::new(&aws_config);

        Ok(Self::new(client, table_name))
    }

    /// 設定テーブル名を取得
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl SettingsStore for DynamoDbSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsStoreError> {
        debug!(key = %key, "設定を読み取り");

        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| SettingsStoreError::ReadError(e.to_string()))?;

        let Some(item) = output.item() else {
            return Ok(None);
        };

        match item.get(VALUE_ATTRIBUTE) {
            Some(AttributeValue::S(value)) => Ok(Some(value.clone())),
            // 値属性が欠落・不正な型の場合は未設定として扱う
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), SettingsStoreError> {
        debug!(key = %key, "設定を書き込み");

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .item(VALUE_ATTRIBUTE, AttributeValue::S(value.to_string()))
            .send()
            .await
            .map_err(|e| SettingsStoreError::WriteError(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SettingsStoreError> {
        debug!(key = %key, "設定を削除");

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| SettingsStoreError::WriteError(e.to_string()))?;

        Ok(())
    }
}
