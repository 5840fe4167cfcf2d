use std::path::Path;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::security::clock::{Clock, SystemClock};
use crate::security::token_cache::{AccessToken, Authenticator, TokenCache};
use crate::transport::{data_api_base, QueryPage};

/// A path to an existing file yields its trimmed contents; anything else is literal SOQL.
pub fn resolve_query_input(input: &str) -> Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        let soql = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "read query from file");
        Ok(soql.trim().to_string())
    } else {
        Ok(input.to_string())
    }
}

/// Authenticated SOQL client backed by a shared [`TokenCache`].
pub struct QueryClient<A, C = SystemClock> {
    http_client: Client,
    api_version: String,
    tokens: Arc<TokenCache<A, C>>,
}

impl<A: Authenticator, C: Clock> QueryClient<A, C> {
    pub fn new(
        http_client: Client,
        api_version: impl Into<String>,
        tokens: Arc<TokenCache<A, C>>,
    ) -> Self {
        Self {
            http_client,
            api_version: api_version.into(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCache<A, C>> {
        &self.tokens
    }

    /// GET `{endpoint}/services/data/v{version}/query/?q={soql}`.
    /// Returns the decoded body and the token the request was made with.
    pub async fn execute(&self, soql: &str) -> Result<(Value, AccessToken)> {
        let token = self.tokens.get_token().await?;
        let url = format!("{}/query/", data_api_base(&token.endpoint, &self.api_version));

        debug!(url = %url, "executing SOQL query");
        trace!(soql = %soql, "query text");

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .header(CONTENT_TYPE, "application/json")
            .query(&[("q", soql)])
            .send()
            .await?;

        let body = self.checked_json(response).await?;
        Ok((body, token))
    }

    /// Run `soql` and follow `nextRecordsUrl` until the result set is exhausted.
    pub async fn execute_all(&self, soql: &str) -> Result<(Vec<Value>, AccessToken)> {
        let (first, mut token) = self.execute(soql).await?;
        let mut page: QueryPage = serde_json::from_value(first)
            .map_err(|e| Error::MalformedResponse(format!("unexpected query response: {e}")))?;
        let mut records = std::mem::take(&mut page.records);

        while let Some(next) = page.next_records_url.take().filter(|_| !page.done) {
            token = self.tokens.get_token().await?;
            let url = format!("{}{}", token.endpoint.trim_end_matches('/'), next);
            debug!(url = %url, fetched = records.len(), "fetching next query page");

            let response = self
                .http_client
                .get(&url)
                .header(AUTHORIZATION, token.bearer())
                .header(CONTENT_TYPE, "application/json")
                .send()
                .await?;
            let body = self.checked_json(response).await?;
            page = serde_json::from_value(body)
                .map_err(|e| Error::MalformedResponse(format!("unexpected query response: {e}")))?;
            records.append(&mut page.records);
        }

        info!(records = records.len(), "query complete");
        Ok((records, token))
    }

    async fn checked_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Query { status, body });
        }
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::MalformedResponse(format!("query response is not JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::MockClock;
    use crate::security::token_cache::IssuedToken;
    use chrono::Duration;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ISSUED_AT: i64 = 1_700_000_000_000;

    struct StaticAuthenticator {
        instance_url: String,
    }

    impl Authenticator for StaticAuthenticator {
        async fn request_new_token(&self) -> Result<IssuedToken> {
            Ok(IssuedToken {
                access_token: "tok".to_string(),
                instance_url: self.instance_url.clone(),
                issued_at_millis: ISSUED_AT,
            })
        }
    }

    fn client_for(server: &Server) -> QueryClient<StaticAuthenticator, MockClock> {
        let cache = TokenCache::with_clock(
            StaticAuthenticator {
                instance_url: server.url(),
            },
            MockClock::at_millis(ISSUED_AT),
            Duration::hours(1),
        );
        QueryClient::new(Client::new(), "58.0", Arc::new(cache))
    }

    #[test]
    fn test_resolve_literal_query() {
        let soql = "SELECT Id FROM EventLogFile";
        assert_eq!(resolve_query_input(soql).unwrap(), soql);
    }

    #[test]
    fn test_resolve_query_from_file_is_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\n  SELECT Id, LogDate FROM EventLogFile  \n").unwrap();
        let soql = resolve_query_input(file.path().to_str().unwrap()).unwrap();
        assert_eq!(soql, "SELECT Id, LogDate FROM EventLogFile");
    }

    #[tokio::test]
    async fn test_execute_sends_bearer_and_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/services/data/v58.0/query/")
            .match_query(Matcher::UrlEncoded("q".into(), "SELECT Id FROM EventLogFile".into()))
            .match_header("Authorization", "Bearer tok")
            .match_header("Content-Type", "application/json")
            .with_status(200)
            .with_body(json!({"totalSize": 0, "done": true, "records": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let (body, token) = client.execute("SELECT Id FROM EventLogFile").await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["totalSize"], 0);
        assert_eq!(token.token, "tok");
        assert_eq!(token.endpoint, server.url());
    }

    #[tokio::test]
    async fn test_execute_non_success_is_query_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/services/data/v58.0/query/")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"[{"errorCode":"MALFORMED_QUERY"}]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        match client.execute("SELEC nonsense").await {
            Err(Error::Query { status, body }) => {
                assert_eq!(status.as_u16(), 400);
                assert!(body.contains("MALFORMED_QUERY"));
            }
            other => panic!("expected Query error, got {:?}", other.map(|(v, _)| v)),
        }
    }

    #[tokio::test]
    async fn test_execute_all_follows_next_records_url() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/services/data/v58.0/query/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "totalSize": 2,
                    "done": false,
                    "nextRecordsUrl": "/services/data/v58.0/query/01gNEXT-1",
                    "records": [{"Id": "a"}]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/services/data/v58.0/query/01gNEXT-1")
            .match_header("Authorization", "Bearer tok")
            .with_status(200)
            .with_body(json!({"totalSize": 2, "done": true, "records": [{"Id": "b"}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let (records, _) = client.execute_all("SELECT Id FROM EventLogFile").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = records.iter().map(|r| r["Id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
