// Infrastructure layer modules
pub mod discord_api;
pub mod env_bridge;
pub mod interaction_gateway;
pub mod logging;
pub mod settings_store;

// Re-exports
pub use discord_api::{DiscordApiClient, DiscordApiError, DiscordPoster};
pub use env_bridge::{ConfigSurface, EnvKey, InvocationEnv};
pub use interaction_gateway::{
    GatewayError, HandlerError, HandlerRegistry, InteractionGateway, InteractionHandler,
    SignedInteractionGateway,
};
pub use logging::init_logging;
pub use settings_store::{DynamoDbSettingsStore, SettingsStore, SettingsStoreError};
