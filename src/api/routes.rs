/*
 * Responsibility
 * - URL 構造を定義
 * - echo はパス・メソッドを問わないので fallback にぶら下げる
 */
use axum::Router;

use crate::api::handlers::echo::echo;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().fallback(echo)
}
