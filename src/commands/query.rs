use anyhow::{Context, Result};
use serde_json::Value;

use crate::security::clock::Clock;
use crate::security::token_cache::Authenticator;
use crate::transport::query::{resolve_query_input, QueryClient};

/// Resolve `input` (file path or literal SOQL) and return the raw response.
pub async fn run_query<A: Authenticator, C: Clock>(
    client: &QueryClient<A, C>,
    input: &str,
) -> Result<Value> {
    let soql = resolve_query_input(input).with_context(|| format!("reading query {input}"))?;
    let (body, _) = client.execute(&soql).await.context("query failed")?;
    Ok(body)
}
