use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{internal_error, invalid_argument, network_error, AnalyticsResult};

fn build_client(timeout: Duration) -> AnalyticsResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))
}

fn validate_custom_endpoint(raw: &str) -> AnalyticsResult<()> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|err| invalid_argument(format!("invalid custom endpoint {raw:?}: {err}")))
}

async fn check_response(response: reqwest::Response, surface: &str) -> AnalyticsResult<()> {
    if response.status().is_success() {
        return Ok(());
    }

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable response body>".to_string());

    let message = match status {
        StatusCode::BAD_REQUEST => {
            format!("{surface} rejected the payload (400). Response: {body}")
        }
        _ => format!("{surface} request failed with status {status}. Response: {body}"),
    };
    Err(network_error(message))
}

/// Configuration for the GA4 Measurement Protocol dispatcher.
#[derive(Clone, Debug)]
pub struct MeasurementProtocolConfig {
    measurement_id: String,
    api_secret: String,
    endpoint: MeasurementProtocolEndpoint,
    timeout: Duration,
}

impl MeasurementProtocolConfig {
    pub fn new(measurement_id: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            measurement_id: measurement_id.into(),
            api_secret: api_secret.into(),
            endpoint: MeasurementProtocolEndpoint::Collect,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: MeasurementProtocolEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    pub(crate) fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

/// Supported Measurement Protocol endpoints.
#[derive(Clone, Debug)]
pub enum MeasurementProtocolEndpoint {
    /// Production collection endpoint: <https://www.google-analytics.com/mp/collect>
    Collect,
    /// Debugging endpoint: <https://www.google-analytics.com/debug/mp/collect>
    DebugCollect,
    /// Custom endpoint (primarily for testing).
    Custom(String),
}

impl MeasurementProtocolEndpoint {
    fn as_str(&self) -> &str {
        match self {
            MeasurementProtocolEndpoint::Collect => "https://www.google-analytics.com/mp/collect",
            MeasurementProtocolEndpoint::DebugCollect => {
                "https://www.google-analytics.com/debug/mp/collect"
            }
            MeasurementProtocolEndpoint::Custom(url) => url,
        }
    }
}

/// Sends events to Google Analytics over the GA4 Measurement Protocol.
#[derive(Clone, Debug)]
pub struct MeasurementProtocolDispatcher {
    client: Client,
    config: MeasurementProtocolConfig,
}

impl MeasurementProtocolDispatcher {
    pub fn new(config: MeasurementProtocolConfig) -> AnalyticsResult<Self> {
        if config.measurement_id().trim().is_empty() {
            return Err(invalid_argument(
                "measurement protocol measurement_id must not be empty",
            ));
        }
        if config.api_secret().trim().is_empty() {
            return Err(invalid_argument(
                "measurement protocol api_secret must not be empty",
            ));
        }
        if let MeasurementProtocolEndpoint::Custom(raw) = &config.endpoint {
            validate_custom_endpoint(raw)?;
        }
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    /// Sends a single event. The caller supplies a stable `client_id`;
    /// `user_id` rides along when the host application has identified the
    /// user.
    pub async fn send_event(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        event_name: &str,
        params: &BTreeMap<String, Value>,
    ) -> AnalyticsResult<()> {
        let payload = MeasurementPayload {
            client_id,
            user_id,
            events: vec![MeasurementEvent {
                name: event_name,
                params,
            }],
        };

        let response = self
            .client
            .post(self.config.endpoint.as_str())
            .query(&[
                ("measurement_id", self.config.measurement_id()),
                ("api_secret", self.config.api_secret()),
            ])
            .json(&payload)
            .send()
            .await
            .map_err(|err| network_error(format!("failed to send analytics event: {err}")))?;

        check_response(response, "measurement protocol").await
    }

    pub fn config(&self) -> &MeasurementProtocolConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct MeasurementPayload<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    events: Vec<MeasurementEvent<'a>>,
}

#[derive(Serialize)]
struct MeasurementEvent<'a> {
    name: &'a str,
    params: &'a BTreeMap<String, Value>,
}

/// Configuration for the Amplitude HTTP API v2 dispatcher.
#[derive(Clone, Debug)]
pub struct AmplitudeHttpConfig {
    api_key: String,
    endpoint: AmplitudeEndpoint,
    timeout: Duration,
}

impl AmplitudeHttpConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: AmplitudeEndpoint::HttpApi,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: AmplitudeEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Supported Amplitude ingestion endpoints.
#[derive(Clone, Debug)]
pub enum AmplitudeEndpoint {
    /// Standard ingestion endpoint: <https://api2.amplitude.com/2/httpapi>
    HttpApi,
    /// EU residency endpoint: <https://api.eu.amplitude.com/2/httpapi>
    HttpApiEu,
    /// Custom endpoint (primarily for testing).
    Custom(String),
}

impl AmplitudeEndpoint {
    fn as_str(&self) -> &str {
        match self {
            AmplitudeEndpoint::HttpApi => "https://api2.amplitude.com/2/httpapi",
            AmplitudeEndpoint::HttpApiEu => "https://api.eu.amplitude.com/2/httpapi",
            AmplitudeEndpoint::Custom(url) => url,
        }
    }
}

/// One event in the Amplitude HTTP API wire shape. Revenue fields ride on
/// ordinary events, mirroring the vendor SDK's `logRevenueV2` mapping.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AmplitudeWireEvent {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub event_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub event_properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub user_properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(rename = "productId", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(rename = "revenueType", skip_serializing_if = "Option::is_none")]
    pub revenue_type: Option<String>,
}

/// Sends events to Amplitude over the HTTP API v2.
#[derive(Clone, Debug)]
pub struct AmplitudeHttpDispatcher {
    client: Client,
    config: AmplitudeHttpConfig,
}

impl AmplitudeHttpDispatcher {
    pub fn new(config: AmplitudeHttpConfig) -> AnalyticsResult<Self> {
        if config.api_key().trim().is_empty() {
            return Err(invalid_argument("amplitude api_key must not be empty"));
        }
        if let AmplitudeEndpoint::Custom(raw) = &config.endpoint {
            validate_custom_endpoint(raw)?;
        }
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub async fn upload(&self, events: &[AmplitudeWireEvent]) -> AnalyticsResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let payload = AmplitudePayload {
            api_key: self.config.api_key(),
            events,
        };

        let response = self
            .client
            .post(self.config.endpoint.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|err| network_error(format!("failed to upload amplitude events: {err}")))?;

        check_response(response, "amplitude http api").await
    }

    pub fn config(&self) -> &AmplitudeHttpConfig {
        &self.config
    }
}

#[derive(Serialize)]
struct AmplitudePayload<'a> {
    api_key: &'a str,
    events: &'a [AmplitudeWireEvent],
}
