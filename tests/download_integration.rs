use std::collections::BTreeMap;
use std::sync::Arc;

use eventlog_sync::commands::{DownloadPlan, EventLogSync};
use eventlog_sync::config::AuthConfig;
use eventlog_sync::security::{MockClock, PasswordGrantClient, TokenCache};
use eventlog_sync::transport::event_log::EventLogDownloader;
use eventlog_sync::transport::query::QueryClient;
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const ISSUED_AT: i64 = 1_700_000_000_000;

#[tokio::test]
async fn query_file_to_sprint_tree() {
    let mut server = Server::new_async().await;
    let url = server.url();

    let auth = server
        .mock("POST", "/services/oauth2/token")
        .with_status(200)
        .with_body(
            json!({
                "access_token": "tok",
                "instance_url": url,
                "issued_at": ISSUED_AT.to_string()
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let query = server
        .mock("GET", "/services/data/v58.0/query/")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "SELECT Id, LogDate, EventType FROM EventLogFile".into(),
        ))
        .match_header("Authorization", "Bearer tok")
        .with_status(200)
        .with_body(
            json!({
                "totalSize": 2,
                "done": true,
                "records": [
                    {"Id": "0AT1", "LogDate": "2024-03-01T00:00:00.000+0000", "EventType": "Login"},
                    {
                        "Id": "0AT2",
                        "LogDate": "2024-03-01T00:00:00.000+0000",
                        "EventType": "Lightning/Page"
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let first = server
        .mock("GET", "/services/data/v58.0/sobjects/EventLogFile/0AT1/LogFile")
        .match_header("Authorization", "Bearer tok")
        .with_status(200)
        .with_body("login,csv\n")
        .create_async()
        .await;
    let second = server
        .mock("GET", "/services/data/v58.0/sobjects/EventLogFile/0AT2/LogFile")
        .with_status(200)
        .with_body("page,csv\n")
        .create_async()
        .await;

    let mut query_file = NamedTempFile::new().unwrap();
    writeln!(query_file, "SELECT Id, LogDate, EventType FROM EventLogFile").unwrap();

    let config = AuthConfig {
        auth_url: format!("{url}/services/oauth2/token"),
        client_id: "k".to_string(),
        client_secret: "s".to_string(),
        username: "u".to_string(),
        password: "p".to_string(),
        token_lifetime_secs: 3600,
    };
    let lifetime = config.token_lifetime();
    let http = reqwest::Client::new();
    let tokens = TokenCache::with_clock(
        PasswordGrantClient::new(config, http.clone()),
        MockClock::at_millis(ISSUED_AT),
        lifetime,
    );
    let client = QueryClient::new(http.clone(), "58.0", Arc::new(tokens));
    let downloader = EventLogDownloader::new(http, "58.0", None);

    let tmp = TempDir::new().unwrap();
    let plan = DownloadPlan {
        download_root: tmp.path().to_path_buf(),
        event_types: BTreeMap::from([("Login".to_string(), "LOGIN_EVENTS".to_string())]),
    };
    let pairs = BTreeMap::from([(
        "Login".to_string(),
        query_file.path().to_string_lossy().into_owned(),
    )]);

    let summary = EventLogSync::new(&client, &downloader, &plan)
        .run_all(&pairs)
        .await
        .unwrap();

    auth.assert_async().await;
    query.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("LOGIN_EVENTS/2024-03-01_Login.csv")).unwrap(),
        "login,csv\n"
    );
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("LIGHTNING_PAGE/2024-03-01_Lightning_Page.csv"))
            .unwrap(),
        "page,csv\n"
    );
}
