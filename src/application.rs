// アプリケーション層モジュール
pub mod commands;
pub mod cron_handler;
pub mod interaction_handler;
pub mod notifier;

// 再エクスポート
pub use commands::{build_registry, NextFightCommand};
pub use cron_handler::{handle_cron_trigger, CronResponseBody};
pub use interaction_handler::handle_interaction;
pub use notifier::{FightNightNotifier, NotifierEnv, NotifierError, NotifierJob};
