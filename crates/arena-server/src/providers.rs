//! HTTP-backed agent and moderator providers.
//!
//! Both talk JSON to a model-side service: `POST <agent_url>/turn`,
//! `POST <moderator_url>/step` and `POST <moderator_url>/summary`.

use std::time::Duration;

use arena::debate::{
    AgentTurn, AgentTurnProvider, AgentTurnRequest, ModeratorContext, ModeratorMove,
    ModeratorProvider, ProviderError, ProviderResult, SummaryRequest,
};
use arena::{DebateSummary, ModeratorStep};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Body sent to the moderator's `/step` endpoint
#[derive(Debug, Serialize)]
struct StepRequest<'a> {
    context: &'a ModeratorContext,
    steps: &'a [ModeratorStep],
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B) -> ProviderResult<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    debug!(url, "Provider request");
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Malformed(e.to_string()))
}

pub struct HttpAgentProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAgentProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: base_url.into(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl AgentTurnProvider for HttpAgentProvider {
    async fn take_turn(&self, request: &AgentTurnRequest) -> ProviderResult<AgentTurn> {
        post_json(&self.client, &endpoint(&self.base_url, "turn"), request).await
    }
}

pub struct HttpModeratorProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpModeratorProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: base_url.into(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl ModeratorProvider for HttpModeratorProvider {
    async fn next_move(
        &self,
        context: &ModeratorContext,
        steps: &[ModeratorStep],
    ) -> ProviderResult<ModeratorMove> {
        let body = StepRequest { context, steps };
        post_json(&self.client, &endpoint(&self.base_url, "step"), &body).await
    }

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<DebateSummary> {
        post_json(&self.client, &endpoint(&self.base_url, "summary"), request).await
    }
}
