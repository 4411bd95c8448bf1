use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    plan::{Analysis, RebalancePlan},
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Values offered by the intent generator's strategy selector.
pub const INTENT_PRESETS: [&str; 5] = [
    "Conservative",
    "Balanced",
    "Aggressive Growth",
    "DeFi Focused",
    "AI & Big Data",
];

#[derive(Debug, Clone, Serialize)]
pub struct RebalanceRequest {
    pub portfolio: String,
    pub intent: String,
    pub market_prices: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceResponse {
    pub analysis: Analysis,
    pub plan: RebalancePlan,
}

#[derive(Debug, Serialize)]
struct IntentRequest<'a> {
    strategy: &'a str,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

/// Server-side collaborator that owns intent generation and plan building.
#[async_trait]
pub trait RebalanceService: Send + Sync {
    /// `None` when the server answered without an intent.
    async fn generate_intent(&self, strategy: &str) -> Result<Option<String>>;

    async fn rebalance(&self, request: &RebalanceRequest) -> Result<RebalanceResponse>;
}

pub struct HttpRebalanceService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRebalanceService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Status and raw body of a JSON POST.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting to server");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, len = text.len(), "server replied");
        Ok((status, text))
    }
}

/// The status is not consulted: an error reply without an `intent` is `None`
/// like any other. Only an undecodable body is an error.
fn decode_intent(body: &str) -> Result<Option<String>> {
    let response: IntentResponse = serde_json::from_str(body)?;
    Ok(response.intent.filter(|i| !i.is_empty()))
}

fn decode_rebalance(status: StatusCode, body: &str) -> Result<RebalanceResponse> {
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(Error::Server(message));
    }
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl RebalanceService for HttpRebalanceService {
    async fn generate_intent(&self, strategy: &str) -> Result<Option<String>> {
        let (_, body) = self
            .post("/generate_intent", &IntentRequest { strategy })
            .await?;
        decode_intent(&body)
    }

    async fn rebalance(&self, request: &RebalanceRequest) -> Result<RebalanceResponse> {
        let (status, body) = self.post("/rebalance", request).await?;
        decode_rebalance(status, &body)
    }
}
