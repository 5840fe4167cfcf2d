//! OAuth 2.0 username-password exchange against the org's token endpoint.

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::security::token_cache::{Authenticator, IssuedToken};

/// Keys every successful token response must carry.
pub const REQUIRED_AUTH_FIELDS: [&str; 3] = ["access_token", "instance_url", "issued_at"];

/// Fail with [`Error::MissingField`] unless all of [`REQUIRED_AUTH_FIELDS`] are present.
/// Extra keys are ignored.
pub fn validate_auth_response(response: &Map<String, Value>) -> Result<()> {
    let missing: Vec<String> = REQUIRED_AUTH_FIELDS
        .iter()
        .filter(|key| !response.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingField(missing))
    }
}

/// `issued_at` arrives as a string of digits, but accept a JSON integer too.
fn parse_issued_at(value: &Value) -> Result<i64> {
    match value {
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            Error::MalformedResponse(format!("issued_at is not a millisecond timestamp: {s:?}"))
        }),
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            Error::MalformedResponse(format!("issued_at is not a millisecond timestamp: {n}"))
        }),
        other => Err(Error::MalformedResponse(format!(
            "issued_at has unexpected type: {other}"
        ))),
    }
}

fn string_field(response: &Map<String, Value>, key: &str) -> Result<String> {
    response
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedResponse(format!("{key} is not a string")))
}

/// Turn a decoded token response into an [`IssuedToken`].
pub fn issued_token_from_response(response: &Map<String, Value>) -> Result<IssuedToken> {
    validate_auth_response(response)?;

    let issued_at_millis = response
        .get("issued_at")
        .map(parse_issued_at)
        .ok_or_else(|| Error::MissingField(vec!["issued_at".to_string()]))??;

    Ok(IssuedToken {
        access_token: string_field(response, "access_token")?,
        instance_url: string_field(response, "instance_url")?,
        issued_at_millis,
    })
}

/// Password-grant client used as the production [`Authenticator`].
#[derive(Debug, Clone)]
pub struct PasswordGrantClient {
    config: AuthConfig,
    http_client: Client,
}

impl PasswordGrantClient {
    pub fn new(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// POST the credentials and return the validated token material.
    #[instrument(skip_all, fields(auth_url = %self.config.auth_url))]
    pub async fn request_new_token(&self) -> Result<IssuedToken> {
        debug!(
            client_id = %self.config.client_id,
            username = %self.config.username,
            "requesting access token"
        );

        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.auth_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "authentication rejected");
            trace!(body = %body, "authentication rejection body");
            return Err(Error::Authentication { status, body });
        }

        let body = response.text().await?;
        let decoded: Map<String, Value> = serde_json::from_str(&body).map_err(|e| {
            Error::MalformedResponse(format!("token response is not a JSON object: {e}"))
        })?;

        let issued = issued_token_from_response(&decoded)?;
        debug!(
            instance_url = %issued.instance_url,
            issued_at = issued.issued_at_millis,
            "access token issued"
        );
        Ok(issued)
    }
}

impl Authenticator for PasswordGrantClient {
    async fn request_new_token(&self) -> Result<IssuedToken> {
        PasswordGrantClient::request_new_token(self).await
    }
}
