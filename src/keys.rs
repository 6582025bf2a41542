//! Cache key derivation
//!
//! Keys are never stored in a registry. They are recomputed on every access
//! from `(prefix, session_id, operation, parameters)`.

use sha2::{Digest, Sha256};

use crate::models::ValueMap;

/// Separator between key components.
pub const KEY_SEPARATOR: char = ':';

/// Hex characters in a parameter token.
pub const PARAMS_TOKEN_LEN: usize = 32;

/// Fixed-width token for a parameter map.
///
/// The map is serialized as key-ordered JSON and hashed with SHA-256; the
/// first 16 bytes of the digest, hex encoded, form the token.
pub fn params_token(params: &ValueMap) -> String {
    // Encoding a BTreeMap of owned values cannot fail.
    let canonical = serde_json::to_vec(params).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(&digest[..PARAMS_TOKEN_LEN / 2])
}

/// Builds `prefix:session_id:operation[:params_token]`.
pub fn derive_key(
    prefix: &str,
    session_id: &str,
    operation: &str,
    params: Option<&ValueMap>,
) -> String {
    let mut key = format!(
        "{prefix}{sep}{session_id}{sep}{operation}",
        sep = KEY_SEPARATOR
    );
    if let Some(params) = params {
        key.push(KEY_SEPARATOR);
        key.push_str(&params_token(params));
    }
    key
}

/// True if `key` was derived for `session_id`.
///
/// The prefix is the first component; the session id must follow it and be
/// terminated by a separator, so session ids containing the separator still
/// match exactly and `s1` never matches keys of `s10`.
pub fn key_belongs_to_session(key: &str, session_id: &str) -> bool {
    key.split_once(KEY_SEPARATOR)
        .and_then(|(_, rest)| rest.strip_prefix(session_id))
        .is_some_and(|rest| rest.starts_with(KEY_SEPARATOR))
}
