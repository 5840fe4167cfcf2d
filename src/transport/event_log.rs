use std::path::{Path, PathBuf};

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::security::token_cache::AccessToken;
use crate::transport::data_api_base;

/// Downloads `EventLogFile` bodies.
#[derive(Debug, Clone)]
pub struct EventLogDownloader {
    http_client: Client,
    api_version: String,
    /// Replaces the token's instance URL as download host when set.
    domain_name: Option<String>,
}

impl EventLogDownloader {
    /// `http_client` should not carry an overall request timeout; see
    /// [`ApiConfig::download_client`](crate::config::ApiConfig::download_client).
    pub fn new(
        http_client: Client,
        api_version: impl Into<String>,
        domain_name: Option<String>,
    ) -> Self {
        Self {
            http_client,
            api_version: api_version.into(),
            domain_name,
        }
    }

    /// `{base}/services/data/v{version}/sobjects/EventLogFile/{id}/LogFile`
    pub fn download_url(&self, token: &AccessToken, record_id: &str) -> String {
        let base = match &self.domain_name {
            Some(domain) => format!("https://{domain}"),
            None => token.endpoint.clone(),
        };
        format!(
            "{}/sobjects/EventLogFile/{}/LogFile",
            data_api_base(&base, &self.api_version),
            record_id
        )
    }

    /// Stream one log file to `dest`. Returns the number of bytes written.
    ///
    /// The body lands in `<dest>.part` first and is renamed on completion,
    /// so an interrupted transfer never leaves a truncated `dest` behind.
    pub async fn download(
        &self,
        token: &AccessToken,
        record_id: &str,
        dest: &Path,
    ) -> Result<u64> {
        let url = self.download_url(token, record_id);
        debug!(url = %url, dest = %dest.display(), "downloading log file");

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .header("X-PrettyPrint", "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Download { status, body });
        }

        let partial = partial_path(dest);
        match write_body(response, &partial).await {
            Ok(written) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_body(mut response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
