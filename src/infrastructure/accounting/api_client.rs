//! Signed HTTP client for the point-accounting service
//!
//! Every request carries a client-side SHA-256 hash over the API key,
//! the method, a method-specific salt and the client secret; every
//! response must carry a `hash` field recomputable from the response
//! body, the server secret and the per-request client seed. A mismatch
//! on either side is a hard authorization failure.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::accounting::AccountingApi;
use crate::shared::errors::ApiError;
use crate::shared::types::{AccountIdentity, ActionKind, AuthorizationTicket, UserInfo};

const CLIENT_NAME: &str = "drover";
const CLIENT_PASSWORD: &str = "QlRzJ74mPeXc";
const API_PASSWORD: &str = "T6wBnYdkrsVu";
const SERVER_PASSWORD: &str = "8HJKVQm92hFG";

pub struct AccountingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    client_secret: String,
    server_secret: String,
}

impl AccountingClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{}/", base_url)
        };
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            client_secret: make_hash(&[CLIENT_NAME, CLIENT_PASSWORD]),
            server_secret: make_hash(&[CLIENT_NAME, SERVER_PASSWORD]),
        }
    }

    fn client_hash(&self, method: &str, salt: &str) -> String {
        make_hash(&[&self.api_key, method, salt, &self.client_secret])
    }

    fn server_hash(&self, method: &str, salt: &str, client_seed: u32) -> String {
        make_hash(&[
            &self.api_key,
            method,
            salt,
            &self.server_secret,
            &client_seed.to_string(),
        ])
    }

    fn verify_hash(
        &self,
        body: &Value,
        method: &str,
        salt: &str,
        client_seed: u32,
    ) -> Result<(), ApiError> {
        let expected = self.server_hash(method, salt, client_seed);
        match body.get("hash").and_then(Value::as_str) {
            Some(received) if received == expected => Ok(()),
            _ => Err(ApiError::HashMismatch),
        }
    }

    fn client_seed() -> u32 {
        rand::thread_rng().gen_range(100_000..=999_999)
    }

    async fn post(&self, endpoint: &str, form: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = format!("{}{}/{}", self.base_url, self.api_key, endpoint);
        let response = self.http.post(&url).form(form).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Http(response.status().as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// SHA-256 over the comma-joined parts, hex-encoded
fn make_hash(parts: &[&str]) -> String {
    hex::encode(Sha256::digest(parts.join(",").as_bytes()))
}

/// The account identity travels as two plain SHA-256 digests, one per
/// address rendering; the raw address never leaves the process.
fn address_hashes(identity: &AccountIdentity) -> [String; 2] {
    [
        hex::encode(Sha256::digest(identity.checksummed.as_bytes())),
        hex::encode(Sha256::digest(identity.lowercase.as_bytes())),
    ]
}

/// `success` arrives as a JSON bool or a 0/1 integer depending on the
/// service version
fn response_success(body: &Value) -> bool {
    match body.get("success") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

#[async_trait]
impl AccountingApi for AccountingClient {
    async fn new_action(
        &self,
        action: ActionKind,
        identity: &AccountIdentity,
    ) -> Result<AuthorizationTicket, ApiError> {
        let seed = Self::client_seed();
        let hashes = address_hashes(identity);
        let form = [
            ("soft", CLIENT_NAME.to_string()),
            ("action", action.as_str().to_string()),
            (
                "hash",
                self.client_hash(
                    "new_action",
                    &format!("{}{}", action.as_str(), API_PASSWORD),
                ),
            ),
            ("whitelist_hashes", hashes[0].clone()),
            ("whitelist_hashes", hashes[1].clone()),
            ("client_seed", seed.to_string()),
        ];
        let body = self.post("new_action", &form).await?;

        let success = response_success(&body);
        let new_balance = body.get("new_balance").and_then(Value::as_i64).unwrap_or(0);
        let salt = format!("{}{}", success as i64 + new_balance, API_PASSWORD);
        self.verify_hash(&body, "new_action", &salt, seed)?;

        if !success {
            return Err(ApiError::Rejected(body.to_string()));
        }
        let cancel_id = body
            .get("cancel_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::InvalidResponse("missing cancel_id".to_string()))?;
        Ok(AuthorizationTicket {
            cancel_id,
            whitelisted: body
                .get("is_whitelisted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            new_balance,
        })
    }

    async fn cancel_action(&self, ticket: &AuthorizationTicket) -> Result<(), ApiError> {
        let seed = Self::client_seed();
        let salt = format!("{}{}", ticket.cancel_id, API_PASSWORD);
        let form = [
            ("id", ticket.cancel_id.to_string()),
            ("hash", self.client_hash("cancel_action", &salt)),
            ("soft", CLIENT_NAME.to_string()),
            ("client_seed", seed.to_string()),
        ];
        let body = self.post("cancel_action", &form).await?;
        self.verify_hash(&body, "cancel_action", &salt, seed)?;
        Ok(())
    }

    async fn user_info(&self) -> Result<UserInfo, ApiError> {
        let seed = Self::client_seed();
        let form = [
            ("hash", self.client_hash("get_userinfo", API_PASSWORD)),
            ("soft", CLIENT_NAME.to_string()),
            ("client_seed", seed.to_string()),
        ];
        let body = self.post("get_userinfo", &form).await?;

        let user = body
            .get("user")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let salt = format!("{}{}", user, API_PASSWORD);
        self.verify_hash(&body, "get_userinfo", &salt, seed)?;

        if user.is_empty() {
            return Err(ApiError::Rejected("unknown API key".to_string()));
        }
        Ok(UserInfo {
            user,
            balance: body.get("balance").and_then(Value::as_i64).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AccountingClient {
        AccountingClient::new(
            "https://points.example/api".to_string(),
            "test-key".to_string(),
        )
    }

    #[test]
    fn make_hash_joins_with_commas() {
        assert_eq!(make_hash(&["a", "b"]), make_hash(&["a,b"]));
        assert_ne!(make_hash(&["a", "b"]), make_hash(&["a", "c"]));
        assert_eq!(make_hash(&["a", "b"]).len(), 64);
    }

    #[test]
    fn secrets_derive_from_client_name() {
        let client = client();
        assert_eq!(
            client.client_secret,
            make_hash(&[CLIENT_NAME, CLIENT_PASSWORD])
        );
        assert_ne!(client.client_secret, client.server_secret);
    }

    #[test]
    fn address_hashes_cover_both_renderings() {
        let identity = AccountIdentity {
            checksummed: "0x8ba1f109551bD432803012645Ac136ddd64DBA72".to_string(),
            lowercase: "0x8ba1f109551bd432803012645ac136ddd64dba72".to_string(),
        };
        let [checksummed, lowercase] = address_hashes(&identity);
        assert_eq!(checksummed.len(), 64);
        assert_eq!(lowercase.len(), 64);
        assert_ne!(checksummed, lowercase);
    }

    #[test]
    fn matching_server_hash_verifies() {
        let client = client();
        let seed = 123_456;
        // new_action salt: str(int(success) + new_balance) + api password
        let salt = format!("{}{}", 1 + 41, API_PASSWORD);
        let body = json!({
            "success": true,
            "new_balance": 41,
            "cancel_id": 7,
            "hash": client.server_hash("new_action", &salt, seed),
        });
        assert!(client.verify_hash(&body, "new_action", &salt, seed).is_ok());
    }

    #[test]
    fn tampered_response_fails_verification() {
        let client = client();
        let seed = 123_456;
        let salt = format!("{}{}", 1 + 41, API_PASSWORD);
        let good_hash = client.server_hash("new_action", &salt, seed);

        // body altered after signing: recomputed salt no longer matches
        let tampered_salt = format!("{}{}", 1 + 99, API_PASSWORD);
        let body = json!({
            "success": true,
            "new_balance": 99,
            "cancel_id": 7,
            "hash": good_hash,
        });
        assert!(matches!(
            client.verify_hash(&body, "new_action", &tampered_salt, seed),
            Err(ApiError::HashMismatch)
        ));

        // missing hash field
        let body = json!({ "success": true });
        assert!(matches!(
            client.verify_hash(&body, "new_action", &salt, seed),
            Err(ApiError::HashMismatch)
        ));
    }

    #[test]
    fn wrong_seed_fails_verification() {
        let client = client();
        let salt = format!("{}{}", 1, API_PASSWORD);
        let body = json!({ "hash": client.server_hash("cancel_action", &salt, 111_111) });
        assert!(client.verify_hash(&body, "cancel_action", &salt, 111_111).is_ok());
        assert!(matches!(
            client.verify_hash(&body, "cancel_action", &salt, 222_222),
            Err(ApiError::HashMismatch)
        ));
    }

    #[test]
    fn success_flag_coerces_from_bool_and_int() {
        assert!(response_success(&json!({ "success": true })));
        assert!(response_success(&json!({ "success": 1 })));
        assert!(!response_success(&json!({ "success": 0 })));
        assert!(!response_success(&json!({ "success": false })));
        assert!(!response_success(&json!({})));
    }

    #[test]
    fn client_seed_is_six_digits() {
        for _ in 0..100 {
            let seed = AccountingClient::client_seed();
            assert!((100_000..=999_999).contains(&seed));
        }
    }
}
