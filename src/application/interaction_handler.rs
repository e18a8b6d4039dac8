// interactionデリゲート
//
// 受信したinteractionリクエストを処理する前に環境ブリッジを実行し、
// リクエストとレジストリを無加工でゲートウェイへ転送する。
// ゲートウェイ内部のエラーはここでは解釈せず、ホスティング
// プラットフォームの既定エラー応答へそのまま伝播させる。

use lambda_http::{Body, Request, Response};

use crate::infrastructure::env_bridge::{ConfigSurface, InvocationEnv};
use crate::infrastructure::interaction_gateway::{
    GatewayError, HandlerRegistry, InteractionGateway,
};

/// interactionリクエストを処理する
///
/// # 処理フロー
/// 1. 環境ブリッジで構成サーフェスを再構築（デリゲートより前に完了）
/// 2. リクエストとレジストリをゲートウェイへ転送
/// 3. ゲートウェイの応答をそのまま返却
pub async fn handle_interaction<G: InteractionGateway + ?Sized>(
    request: Request,
    env: &InvocationEnv,
    gateway: &G,
    registry: &HandlerRegistry,
) -> Result<Response<Body>, GatewayError> {
    let mut surface = ConfigSurface::new();
    surface.bridge(env);

    gateway.handle(request, registry, &surface).await
}
