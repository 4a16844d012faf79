/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - 起動後は読み取り専用: リクエスト間で可変状態を共有しない
 */
use std::sync::Arc;

use crate::services::snapshot::JwtSettings;

#[derive(Clone, Debug)]
pub struct AppState {
    // resolved once at startup
    pub os_hostname: Arc<str>,
    pub jwt: Arc<JwtSettings>,
    pub body_limit_bytes: usize,
}

impl AppState {
    pub fn new(os_hostname: impl Into<Arc<str>>, jwt: JwtSettings, body_limit_bytes: usize) -> Self {
        Self {
            os_hostname: os_hostname.into(),
            jwt: Arc::new(jwt),
            body_limit_bytes,
        }
    }
}
