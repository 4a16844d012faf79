/*
 * Responsibility
 * - 全パス / 全メソッド共通の echo handler
 * - body 読み込み → snapshot 組み立て → 整形済み JSON で返す
 * - JWT のデコード結果に関わらず 200 を返す (診断用であり認可ではない)
 */
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::{error::AppError, services::snapshot, state::AppState};

pub async fn echo(State(state): State<AppState>, req: Request<Body>) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    // A body we cannot read (or one over the limit) is echoed as empty rather
    // than failing the request.
    let body = match to_bytes(body, state.body_limit_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                error = %e,
                body_truncated = true,
                limit_bytes = state.body_limit_bytes,
                "failed to read request body, echoing it as empty"
            );
            Bytes::new()
        }
    };

    let response = snapshot::capture(&parts, &body, &state.os_hostname, &state.jwt);

    pretty_json(&response)
}

/// Two-space indented JSON with a trailing newline.
fn pretty_json<T: Serialize>(value: &T) -> Result<Response, AppError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        bytes,
    )
        .into_response())
}
