//! Authenticated client for the vendor OpenAPI.
//!
//! Every request carries an HMAC-SHA256 signature over the client id, the
//! access token (except on the token request itself), a millisecond
//! timestamp, a nonce and a canonical description of the request:
//!
//! ```text
//! METHOD \n hex(sha256(body)) \n <signed headers, unused> \n path?sorted_query
//! ```

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::model::Envelope;
use crate::transport::CloudTransport;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Refresh the token this long before the cloud says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: String,
    #[serde(default)]
    expire_time: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct TuyaClient {
    http: reqwest::Client,
    base_url: String,
    access_id: String,
    access_key: String,
    token: Mutex<Option<AccessToken>>,
}

impl TuyaClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_host, &config.access_id, &config.access_key)
    }

    pub fn with_base_url(base_url: &str, access_id: &str, access_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_id: access_id.to_string(),
            access_key: access_key.to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken> {
        debug!("Requesting access token");
        let query = [("grant_type", "1".to_string())];
        let envelope = self.send(Method::GET, "/v1.0/token", &query, None, None).await?;

        if !envelope.success {
            return Err(Error::Api(format!("token request rejected: {}", envelope.msg)));
        }

        let token: TokenResult = serde_json::from_value(envelope.result)?;
        let lifetime = Duration::from_secs(token.expire_time).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!("Obtained access token (valid for {}s)", token.expire_time);

        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        access_token: Option<&str>,
    ) -> Result<Envelope> {
        let url = canonical_url(path, query);
        let payload = match body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };

        let t = Utc::now().timestamp_millis().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = sign(
            &self.access_id,
            &self.access_key,
            access_token,
            &t,
            &nonce,
            &string_to_sign(method.as_str(), &payload, &url),
        )?;

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, url))
            .header("client_id", &self.access_id)
            .header("sign", signature)
            .header("sign_method", "HMAC-SHA256")
            .header("t", &t)
            .header("nonce", &nonce);
        if let Some(token) = access_token {
            request = request.header("access_token", token);
        }
        if body.is_some() {
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        debug!("{} {}", method, url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {} for {} {}", status, method, path)));
        }

        Ok(response.json::<Envelope>().await?)
    }
}

#[async_trait]
impl CloudTransport for TuyaClient {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Envelope> {
        let token = self.access_token().await?;
        self.send(Method::GET, path, query, None, Some(&token)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Envelope> {
        let token = self.access_token().await?;
        self.send(Method::POST, path, &[], Some(body), Some(&token)).await
    }
}

/// Path plus query with keys in lexical order, as used both on the wire and
/// in the signature
fn canonical_url(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }

    let mut pairs: Vec<&(&str, String)> = query.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let joined: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", path, joined.join("&"))
}

fn string_to_sign(method: &str, body: &[u8], url: &str) -> String {
    format!("{}\n{}\n\n{}", method, hex::encode(Sha256::digest(body)), url)
}

fn sign(
    client_id: &str,
    secret: &str,
    access_token: Option<&str>,
    t: &str,
    nonce: &str,
    string_to_sign: &str,
) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("unusable access key: {}", e)))?;
    mac.update(client_id.as_bytes());
    mac.update(access_token.unwrap_or_default().as_bytes());
    mac.update(t.as_bytes());
    mac.update(nonce.as_bytes());
    mac.update(string_to_sign.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}
