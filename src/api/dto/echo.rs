/*
 * Responsibility
 * - echo レスポンスの DTO (シリアライズ形状はここで固定)
 * - map は BTreeMap: キー順を安定させる
 */
use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::jwt_decode::DecodedClaims;

pub type MultiMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub path: String,
    pub method: String,
    pub headers: MultiMap,
    pub body: String,
    pub query: MultiMap,
    pub hostname: String,
    pub ip: String,
    pub protocol: String,
    pub os: OsInfo,
    // Omitted (not null) when no JWT header is configured or present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<DecodedClaims>,
}

#[derive(Debug, Serialize)]
pub struct OsInfo {
    pub hostname: String,
}
