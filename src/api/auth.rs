//! Telegram Mini App init data verification.
//!
//! The Mini App forwards the `initData` query string Telegram hands it. All
//! fields except `hash` are sorted by key and joined as `key=value` lines;
//! that string is signed with HMAC-SHA256 and must match `hash`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::form_urlencoded;

use crate::models::UserProfileInput;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA: &[u8] = b"WebAppData";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("initData is required")]
    MissingInitData,

    #[error("init data has no hash")]
    MissingHash,

    #[error("invalid init data")]
    InvalidSignature,

    #[error("malformed init data: {0}")]
    Malformed(String),

    #[error("invalid signing key")]
    InvalidKey,
}

impl AuthError {
    /// Signature problems are 401, everything else the caller sent is 400
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::MissingHash | AuthError::InvalidSignature)
    }
}

/// The `user` object embedded in init data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUser {
    pub fn profile(&self) -> UserProfileInput {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        UserProfileInput {
            telegram_id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: non_empty(&self.username),
            photo_url: non_empty(&self.photo_url),
            lang: non_empty(&self.language_code),
        }
    }
}

/// Checks init data signatures against one derived secret key
#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: Vec<u8>,
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier").finish_non_exhaustive()
    }
}

impl InitDataVerifier {
    /// Secret key is SHA-256 of the constant "WebAppData"
    pub fn web_app_data() -> Self {
        Self {
            secret_key: Sha256::digest(WEB_APP_DATA).to_vec(),
        }
    }

    /// Secret key is HMAC-SHA256 of the bot token keyed by "WebAppData"
    pub fn for_bot_token(bot_token: &str) -> Result<Self, AuthError> {
        let mut mac = HmacSha256::new_from_slice(WEB_APP_DATA).map_err(|_| AuthError::InvalidKey)?;
        mac.update(bot_token.as_bytes());

        Ok(Self {
            secret_key: mac.finalize().into_bytes().to_vec(),
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret_key).map_err(|_| AuthError::InvalidKey)
    }

    /// Hex signature for a set of fields, `hash` excluded
    pub fn sign(&self, fields: &BTreeMap<String, String>) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(data_check_string(fields).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify the signature and return the embedded user
    pub fn verify(&self, init_data: &str) -> Result<TelegramUser, AuthError> {
        let mut fields = parse_fields(init_data);
        if fields.is_empty() {
            return Err(AuthError::Malformed("no fields".to_string()));
        }

        let hash = fields
            .remove("hash")
            .filter(|hash| !hash.is_empty())
            .ok_or(AuthError::MissingHash)?;
        let expected = hex::decode(&hash).map_err(|_| AuthError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(data_check_string(&fields).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::InvalidSignature)?;

        let user = fields
            .get("user")
            .ok_or_else(|| AuthError::Malformed("user field is missing".to_string()))?;

        serde_json::from_str(user).map_err(|e| AuthError::Malformed(format!("user: {e}")))
    }
}

/// URL-decoded fields; the first occurrence of a repeated key wins
fn parse_fields(init_data: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(init_data.as_bytes()).into_owned() {
        fields.entry(key).or_insert(value);
    }
    fields
}

fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encode fields plus their signature as an init data query string
pub fn build_signed_init_data(
    verifier: &InitDataVerifier,
    fields: &BTreeMap<String, String>,
) -> Result<String, AuthError> {
    let hash = verifier.sign(fields)?;
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    Ok(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("auth_date".to_string(), "1700000000".to_string()),
            ("query_id".to_string(), "AAE-test".to_string()),
            (
                "user".to_string(),
                r#"{"id":4242,"first_name":"Liya","last_name":"T","username":"liya"}"#.to_string(),
            ),
        ])
    }

    #[test]
    fn test_valid_signature_returns_user() {
        let verifier = InitDataVerifier::web_app_data();
        let init_data = build_signed_init_data(&verifier, &sample_fields()).unwrap();

        let user = verifier.verify(&init_data).unwrap();
        assert_eq!(user.id, 4242);
        assert_eq!(user.first_name, "Liya");
        assert_eq!(user.profile().username.as_deref(), Some("liya"));
    }

    #[test]
    fn test_tampered_field_is_rejected() {
        let verifier = InitDataVerifier::web_app_data();
        let init_data = build_signed_init_data(&verifier, &sample_fields()).unwrap();
        let tampered = init_data.replace("1700000000", "1700000001");

        assert_eq!(verifier.verify(&tampered), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_key_modes_are_not_interchangeable() {
        let fixed = InitDataVerifier::web_app_data();
        let bound = InitDataVerifier::for_bot_token("123:abc").unwrap();
        let init_data = build_signed_init_data(&bound, &sample_fields()).unwrap();

        assert!(bound.verify(&init_data).is_ok());
        assert_eq!(fixed.verify(&init_data), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_missing_hash_and_garbage() {
        let verifier = InitDataVerifier::web_app_data();

        let err = verifier.verify("auth_date=1&user=%7B%7D").unwrap_err();
        assert_eq!(err, AuthError::MissingHash);
        assert!(err.is_unauthorized());

        assert_eq!(
            verifier.verify("auth_date=1&hash=zz"),
            Err(AuthError::InvalidSignature)
        );
        assert!(matches!(verifier.verify(""), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_signed_payload_with_bad_user_json() {
        let verifier = InitDataVerifier::web_app_data();
        let mut fields = sample_fields();
        fields.insert("user".to_string(), "not json".to_string());
        let init_data = build_signed_init_data(&verifier, &fields).unwrap();

        let err = verifier.verify(&init_data).unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
        assert!(!err.is_unauthorized());
    }
}
