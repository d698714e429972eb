use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use crate::submission::record::Submission;

use super::{Sink, SinkError};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Service-account credential for the sheet API.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Appends one row per submission to a spreadsheet over the `values:append`
/// REST call, authenticated with a service-account bearer token.
///
/// The token is fetched lazily on first use and cached until shortly before
/// expiry. The cache sits behind a mutex, so concurrent submissions that hit
/// an expired token share one refresh instead of each issuing their own.
pub struct RemoteSheetSink {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    spreadsheet_id: String,
    range: String,
    token: Mutex<Option<CachedToken>>,
}

impl RemoteSheetSink {
    pub fn new(
        key: ServiceAccountKey,
        spreadsheet_id: String,
        range: String,
    ) -> Result<Self, String> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| format!("Invalid service account private key: {e}"))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(RemoteSheetSink {
            client,
            key,
            encoding_key,
            spreadsheet_id,
            range,
            token: Mutex::new(None),
        })
    }

    /// Bearer token for the sheet API, refreshed when the cached one is
    /// missing or within a minute of expiry. The lock is held across the
    /// exchange, keeping refreshes single-flight.
    async fn bearer_token(&self) -> Result<String, SinkError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange_token().await?;
        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }

    async fn exchange_token(&self) -> Result<CachedToken, SinkError> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: TOKEN_URL,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| SinkError::Unavailable(format!("Failed to sign auth assertion: {e}")))?;

        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(format!("Token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = truncated_body(resp).await;
            return Err(SinkError::Unavailable(format!(
                "Token exchange returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SinkError::Unavailable(format!("Malformed token response: {e}")))?;

        Ok(CachedToken {
            expires_at: now + Duration::seconds(token.expires_in),
            access_token: token.access_token,
        })
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn push_row(
        &self,
        token: &str,
        submission: &Submission,
    ) -> Result<reqwest::Response, SinkError> {
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.spreadsheet_id, self.range
        );

        self.client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "values": [submission.row()] }))
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(format!("Sheet append request failed: {e}")))
    }
}

#[async_trait]
impl Sink for RemoteSheetSink {
    fn name(&self) -> &str {
        "sheet"
    }

    async fn append(&self, submission: &Submission) -> Result<Option<i64>, SinkError> {
        let token = self.bearer_token().await?;
        let mut resp = self.push_row(&token, submission).await?;

        // A cached token can be revoked server-side before its expiry
        // window; retry once with a fresh one.
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            let token = self.bearer_token().await?;
            resp = self.push_row(&token, submission).await?;
        }

        let status = resp.status();
        if status.is_success() {
            Ok(None)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(SinkError::Unavailable(format!(
                "Sheet API returned {status}: {}",
                truncated_body(resp).await
            )))
        } else {
            Err(SinkError::Rejected(format!(
                "Sheet API returned {status}: {}",
                truncated_body(resp).await
            )))
        }
    }
}

async fn truncated_body(resp: reqwest::Response) -> String {
    resp.text()
        .await
        .unwrap_or_default()
        .chars()
        .take(1024)
        .collect()
}
