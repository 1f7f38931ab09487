//! [`ApplicationClient`] over the node service's HTTP endpoint.

use async_trait::async_trait;

use super::{AppTarget, ApplicationClient, GraphQlRequest};
use crate::config::SyncConfig;
use crate::domain::ChainId;
use crate::error::SyncError;

/// Posts request documents to `{node}/chains/{chain}/applications/{app}`.
#[derive(Debug, Clone)]
pub struct HttpApplicationClient {
    node_url: String,
    aac_chain: ChainId,
    auction_app_id: String,
    indexer_app_id: Option<String>,
    inner_client: reqwest::Client,
}

impl HttpApplicationClient {
    /// Builds a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let inner_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            node_url: config.node_url.trim_end_matches('/').to_string(),
            aac_chain: config.aac_chain.clone(),
            auction_app_id: config.auction_app_id.clone(),
            indexer_app_id: config.indexer_app_id.clone(),
            inner_client,
        })
    }

    fn application_url(&self, chain: &ChainId, app: &str) -> String {
        format!("{}/chains/{chain}/applications/{app}", self.node_url)
    }

    fn target_url(&self, target: &AppTarget) -> String {
        let chain = match target {
            AppTarget::Authority => &self.aac_chain,
            AppTarget::User(chain) => chain,
        };
        self.application_url(chain, &self.auction_app_id)
    }

    fn indexer_url(&self) -> Result<String, SyncError> {
        let app = self
            .indexer_app_id
            .as_deref()
            .ok_or_else(|| SyncError::Internal("no indexer application configured".to_string()))?;
        Ok(self.application_url(&self.aac_chain, app))
    }

    async fn post(&self, url: String, request: &GraphQlRequest) -> Result<String, SyncError> {
        let body = request.to_body()?;
        tracing::debug!(%url, field = request.field(), "remote call");

        let response = self
            .inner_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Transport(format!("{url} returned {status}: {text}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl ApplicationClient for HttpApplicationClient {
    async fn query(&self, target: &AppTarget, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.post(self.target_url(target), request).await
    }

    async fn mutate(
        &self,
        target: &AppTarget,
        request: &GraphQlRequest,
    ) -> Result<String, SyncError> {
        self.post(self.target_url(target), request).await
    }

    async fn system_query(&self, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.post(self.indexer_url()?, request).await
    }

    async fn system_mutate(&self, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.post(self.indexer_url()?, request).await
    }
}
