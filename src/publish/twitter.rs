// src/publish/twitter.rs
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use sha1::Sha1;

use super::Publisher;
use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

/// The four OAuth 1.0a values of the posting account.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub access_token: String,
    pub access_secret: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl TwitterCredentials {
    /// Reads `OAUTH_TOKEN`, `OAUTH_SECRET`, `CONSUMER_KEY`, `CONSUMER_SECRET`.
    pub fn from_env() -> Result<Self> {
        let get = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} missing")))
        };
        Ok(Self {
            access_token: get("OAUTH_TOKEN")?,
            access_secret: get("OAUTH_SECRET")?,
            consumer_key: get("CONSUMER_KEY")?,
            consumer_secret: get("CONSUMER_SECRET")?,
        })
    }
}

fn percent(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// HMAC-SHA1 signature over the OAuth base string. `params` holds every
/// oauth_* and request parameter, unencoded.
pub fn oauth_signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent(k), percent(v)))
        .collect();
    pairs.sort();
    let param_str = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent(url),
        percent(&param_str)
    );
    let key = format!("{}&{}", percent(consumer_secret), percent(token_secret));

    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Config(format!("oauth signing key: {e}")))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[derive(Serialize)]
struct TweetBody<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct TwitterPublisher {
    creds: TwitterCredentials,
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl TwitterPublisher {
    pub fn new(creds: TwitterCredentials) -> Self {
        Self {
            creds,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// `Authorization` header for a request. The JSON body is not part of
    /// the signature, so `params` is empty for status posts.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        let ts = timestamp.to_string();
        let oauth = [
            ("oauth_consumer_key", self.creds.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", ts.as_str()),
            ("oauth_token", self.creds.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all: Vec<(&str, &str)> = oauth.to_vec();
        all.extend_from_slice(params);
        let signature = oauth_signature(
            method,
            url,
            &all,
            &self.creds.consumer_secret,
            &self.creds.access_secret,
        )?;

        let mut header: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent(k), percent(v)))
            .collect();
        header.push(format!("oauth_signature=\"{}\"", percent(&signature)));
        header.sort();
        Ok(format!("OAuth {}", header.join(", ")))
    }
}

#[async_trait::async_trait]
impl Publisher for TwitterPublisher {
    async fn publish(&self, status: &str) -> Result<()> {
        let auth = self.authorization(
            "POST",
            &self.endpoint,
            &[],
            &nonce(),
            chrono::Utc::now().timestamp(),
        )?;

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(AUTHORIZATION, auth)
            .json(&TweetBody { text: status })
            .send()
            .await
            .map_err(|e| Error::Publish(format!("request failed: {e}")))?;

        let code = resp.status();
        if code.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        let reason = match code {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "rejected",
            StatusCode::TOO_MANY_REQUESTS => "rate limited",
            _ => "unexpected status",
        };
        Err(Error::Publish(format!("{reason} (HTTP {code}): {body}")))
    }

    fn name(&self) -> &'static str {
        "twitter"
    }
}
