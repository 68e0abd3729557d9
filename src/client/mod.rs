//! HTTP access to the telemetry server.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::{
    LaptraceError,
    cascade::{CascadeGraph, FieldId, FieldSpec, OptionValue, OptionsFetcher, Selection},
    config::ViewerConfig,
    telemetry::{TelemetryFetcher, TelemetrySample},
};

/// Thin JSON client. Every endpoint answers either with its payload or with
/// `{"error": "..."}`, whatever the status code.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    server_url: String,
}

impl ApiClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, LaptraceError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            LaptraceError::TransportError {
                endpoint: server_url.to_string(),
                source: e,
            }
        })?;
        Self::with_http_client(server_url, http)
    }

    pub fn with_http_client(server_url: &str, http: Client) -> Result<Self, LaptraceError> {
        let parsed = Url::parse(server_url).map_err(|_| LaptraceError::InvalidServerUrl {
            url: server_url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LaptraceError::InvalidServerUrl {
                url: server_url.to_string(),
            });
        }
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Value, LaptraceError> {
        let url = format!("{}/{}", self.server_url, endpoint.trim_start_matches('/'));
        debug!("GET {} {:?}", url, query);
        let transport = |e: reqwest::Error| LaptraceError::TransportError {
            endpoint: endpoint.to_string(),
            source: e,
        };

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        let value: Value = serde_json::from_str(&body).map_err(|_| {
            LaptraceError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {} with a non-JSON body", status),
            }
        })?;
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(LaptraceError::ServerReported {
                message: message.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LaptraceError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", status),
            });
        }
        Ok(value)
    }

    pub async fn option_list(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<OptionValue>, LaptraceError> {
        let value = self.get_json(endpoint, query).await?;
        let malformed = |reason: &str| LaptraceError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };
        value
            .as_array()
            .ok_or_else(|| malformed("expected a list of options"))?
            .iter()
            .map(|item| OptionValue::from_json(item).ok_or_else(|| malformed("options must be scalars")))
            .collect()
    }

    pub async fn telemetry(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Vec<TelemetrySample>, LaptraceError> {
        let value = self.get_json(endpoint, query).await?;
        serde_json::from_value(value).map_err(|e| LaptraceError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Maps field ids to the query parameter names the server expects.
#[derive(Clone, Debug, Default)]
pub struct QueryParams {
    names: HashMap<FieldId, String>,
}

impl QueryParams {
    pub fn insert(&mut self, field: FieldId, param: String) {
        self.names.insert(field, param);
    }

    pub fn pairs(&self, selection: &Selection) -> Vec<(String, String)> {
        selection
            .iter()
            .map(|(field, value)| {
                let name = self
                    .names
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| field.to_string());
                (name, value.to_string())
            })
            .collect()
    }
}

/// Options of one field, read from one endpoint.
pub struct EndpointOptions {
    client: Arc<ApiClient>,
    endpoint: String,
    params: Arc<QueryParams>,
}

#[async_trait]
impl OptionsFetcher for EndpointOptions {
    async fn fetch_options(&self, upstream: &Selection) -> Result<Vec<OptionValue>, LaptraceError> {
        self.client
            .option_list(&self.endpoint, &self.params.pairs(upstream))
            .await
    }
}

pub struct EndpointTelemetry {
    client: Arc<ApiClient>,
    endpoint: String,
    params: Arc<QueryParams>,
}

#[async_trait]
impl TelemetryFetcher for EndpointTelemetry {
    async fn fetch_telemetry(
        &self,
        selection: &Selection,
    ) -> Result<Vec<TelemetrySample>, LaptraceError> {
        self.client
            .telemetry(&self.endpoint, &self.params.pairs(selection))
            .await
    }
}

/// Builds the configured cascade on top of `client`. Fails with
/// `InvalidCascade` if the configured fields do not form a valid chain.
pub fn build_cascade(
    config: &ViewerConfig,
    client: Arc<ApiClient>,
) -> Result<(CascadeGraph, Arc<dyn TelemetryFetcher>), LaptraceError> {
    let mut params = QueryParams::default();
    for field in &config.fields {
        params.insert(
            FieldId::new(field.id.clone()),
            field.param.clone().unwrap_or_else(|| field.id.clone()),
        );
    }
    let params = Arc::new(params);

    let mut specs = Vec::with_capacity(config.fields.len());
    for (index, field) in config.fields.iter().enumerate() {
        let depends_on = field.depends_on.clone().unwrap_or_else(|| {
            config.fields[..index]
                .iter()
                .map(|f| f.id.clone())
                .collect()
        });
        let fetcher = Arc::new(EndpointOptions {
            client: Arc::clone(&client),
            endpoint: field.endpoint.clone(),
            params: Arc::clone(&params),
        });
        let mut spec = FieldSpec::new(field.id.as_str(), fetcher)
            .label(field.label.clone())
            .placeholder(format!("Select {}", field.label))
            .depends_on(depends_on.iter().map(String::as_str));
        if let Some(template) = field.option_label.clone() {
            spec = spec.formatter(move |value| template.replace("{}", value.as_str()));
        }
        specs.push(spec);
    }

    let graph = CascadeGraph::new(specs)?;
    let telemetry: Arc<dyn TelemetryFetcher> = Arc::new(EndpointTelemetry {
        client,
        endpoint: config.telemetry_endpoint.clone(),
        params,
    });
    Ok((graph, telemetry))
}
