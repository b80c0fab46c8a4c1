//! Azure Resource Manager client for Resource Graph queries.

use super::{Credential, QueryPage, QueryRequest, ResourceGraph, RESULT_FORMAT_OBJECT_ARRAY};
use crate::core::config::AzureConfig;
use crate::core::{ProbeError, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";
const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";

/// Resource Graph client backed by the ARM REST API.
pub struct ArmClient {
    http: HttpClient,
    endpoint: String,
    credential: Option<Credential>,
}

#[derive(Debug, Serialize)]
struct ResourcesBody<'a> {
    subscriptions: &'a [String],
    query: &'a str,
    options: ResourcesOptions,
}

#[derive(Debug, Serialize)]
struct ResourcesOptions {
    #[serde(rename = "$top")]
    top: usize,
    #[serde(rename = "$skip")]
    skip: usize,
    #[serde(rename = "resultFormat")]
    result_format: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionListPage {
    #[serde(default)]
    value: Vec<SubscriptionEntry>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionEntry {
    subscription_id: String,
}

impl ArmClient {
    /// Build a client from configuration.
    ///
    /// A missing credential is not an error here; it surfaces from
    /// [`ResourceGraph::authorize`] on the first probe.
    pub fn new(azure: &AzureConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(azure.request_timeout)
            .user_agent(concat!("graphprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: azure.endpoint.trim_end_matches('/').to_string(),
            credential: Credential::from_config(azure),
        })
    }

    async fn bearer(&self) -> Result<String> {
        match &self.credential {
            Some(credential) => credential.token(&self.http).await,
            None => Err(ProbeError::auth(
                "no azure credential configured (access_token or tenant_id/client_id/client_secret)",
            )),
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let token = self.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProbeError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProbeError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProbeError::decode(e.to_string()))
    }
}

#[async_trait]
impl ResourceGraph for ArmClient {
    async fn authorize(&self) -> Result<()> {
        self.bearer()
            .await
            .map(|_| ())
            .map_err(|e| ProbeError::ClientConstruction(e.to_string()))
    }

    async fn list_subscriptions(&self, allow_list: &[String]) -> Result<Vec<String>> {
        let allowed: HashSet<String> = allow_list.iter().map(|s| s.to_lowercase()).collect();
        let mut subscriptions = Vec::new();
        let mut next = Some(format!(
            "{}/subscriptions?api-version={}",
            self.endpoint, SUBSCRIPTIONS_API_VERSION
        ));

        while let Some(url) = next.take() {
            let page: SubscriptionListPage = self.fetch_json(self.http.get(&url)).await?;
            subscriptions.extend(
                page.value
                    .into_iter()
                    .map(|s| s.subscription_id)
                    .filter(|id| allowed.is_empty() || allowed.contains(&id.to_lowercase())),
            );
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(subscriptions)
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let url = format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
            self.endpoint, RESOURCE_GRAPH_API_VERSION
        );
        let body = ResourcesBody {
            subscriptions: &request.subscriptions,
            query: &request.query,
            options: ResourcesOptions {
                top: request.top,
                skip: request.skip,
                result_format: RESULT_FORMAT_OBJECT_ARRAY,
            },
        };
        self.fetch_json(self.http.post(&url).json(&body)).await
    }
}
