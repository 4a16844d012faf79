//! JWT claim extraction without signature verification.
//!
//! Responsibility:
//! - Normalize the header value (`Bearer ` prefix, surrounding whitespace)
//! - Split into header / payload / signature segments
//! - Decode header and payload as base64url JSON (standard alphabet as fallback)
//!
//! The signature segment is never inspected. This is a decoder, not a verifier:
//! nothing here makes a trust decision.
//!
//! Pure: no I/O, no shared state.

use std::borrow::Cow;

use base64::{
    Engine as _, alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
};
use serde::{Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;
use thiserror::Error;

const BEARER_PREFIX: &str = "bearer ";

// Both engines require canonical padding (added by `pad_segment`) and accept
// non-zero trailing bits, which some encoders emit.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Why a single segment could not be turned into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("{0}")]
    Base64(#[from] base64::DecodeError),
    // serde_json::Error is neither Clone nor PartialEq, keep its message.
    #[error("{0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtDecodeError {
    #[error("invalid JWT format: expected 3 parts")]
    Format,
    #[error("failed to decode header: {0}")]
    Header(SegmentError),
    #[error("failed to decode payload: {0}")]
    Payload(SegmentError),
}

/// Result of one decode call. Exactly one variant, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedClaims {
    Decoded {
        header: Value,
        payload: Value,
    },
    /// `raw` is the normalized token (prefix stripped, trimmed).
    Failed {
        raw: String,
        reason: JwtDecodeError,
    },
}

impl DecodedClaims {
    pub fn error(&self) -> Option<&JwtDecodeError> {
        match self {
            Self::Decoded { .. } => None,
            Self::Failed { reason, .. } => Some(reason),
        }
    }
}

// Wire shape: `{"header":..,"payload":..}` or `{"raw":..,"error":".."}`.
// Fields of the other variant are omitted, never emitted as null.
impl Serialize for DecodedClaims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DecodedClaims", 2)?;
        match self {
            Self::Decoded { header, payload } => {
                s.serialize_field("header", header)?;
                s.serialize_field("payload", payload)?;
            }
            Self::Failed { raw, reason } => {
                s.serialize_field("raw", raw)?;
                s.serialize_field("error", &reason.to_string())?;
            }
        }
        s.end()
    }
}

/// Trim, strip a case-insensitive `Bearer ` prefix, trim again.
pub fn normalize_token(raw: &str) -> &str {
    let token = raw.trim();
    match token.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => {
            token[BEARER_PREFIX.len()..].trim()
        }
        _ => token,
    }
}

/// Decode a header value into its JWT header and payload, without verifying anything.
pub fn decode(raw: &str) -> DecodedClaims {
    let token = normalize_token(raw);

    match decode_parts(token) {
        Ok((header, payload)) => DecodedClaims::Decoded { header, payload },
        Err(reason) => DecodedClaims::Failed {
            raw: token.to_string(),
            reason,
        },
    }
}

fn decode_parts(token: &str) -> Result<(Value, Value), JwtDecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return Err(JwtDecodeError::Format);
    };

    // Header first: a broken header means the payload is never looked at.
    let header = decode_segment(header).map_err(JwtDecodeError::Header)?;
    let payload = decode_segment(payload).map_err(JwtDecodeError::Payload)?;

    Ok((header, payload))
}

/// Decode one base64url segment into an arbitrary JSON value (no schema).
pub fn decode_segment(segment: &str) -> Result<Value, SegmentError> {
    let padded = pad_segment(segment);

    let bytes = URL_SAFE_LENIENT
        .decode(padded.as_bytes())
        .or_else(|_| STANDARD_LENIENT.decode(padded.as_bytes()))?;

    // Permissive like common JSON decoders: invalid UTF-8 and unpaired surrogate
    // escapes become U+FFFD instead of failing the whole segment.
    let text = String::from_utf8_lossy(&bytes);
    serde_json::from_str(&replace_lone_surrogates(&text))
        .map_err(|e| SegmentError::Json(e.to_string()))
}

/// Rewrite `\uD800`-style escapes that are not part of a surrogate pair to `\ufffd`.
fn replace_lone_surrogates(text: &str) -> Cow<'_, str> {
    if !text.contains("\\u") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let escape = &rest[pos..];

        match surrogate_escape(escape) {
            Some(0xD800..=0xDBFF) => {
                if matches!(surrogate_escape(&escape[6..]), Some(0xDC00..=0xDFFF)) {
                    out.push_str(&escape[..12]);
                    rest = &escape[12..];
                } else {
                    out.push_str("\\ufffd");
                    rest = &escape[6..];
                }
            }
            Some(_) => {
                out.push_str("\\ufffd");
                rest = &escape[6..];
            }
            None => {
                // Copy the backslash and whatever it escapes (may itself be a backslash).
                let len = 1 + escape[1..].chars().next().map_or(0, char::len_utf8);
                out.push_str(&escape[..len]);
                rest = &escape[len..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

// `\uXXXX` at the start of `s` where XXXX is in the surrogate range.
fn surrogate_escape(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("\\u")?.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let code = u16::from_str_radix(hex, 16).ok()?;
    (0xD800..=0xDFFF).contains(&code).then_some(code)
}

// Remainder 1 is never valid base64; it is left alone and fails at decode.
fn pad_segment(segment: &str) -> String {
    let padding = match segment.len() % 4 {
        2 => "==",
        3 => "=",
        _ => "",
    };
    format!("{segment}{padding}")
}
