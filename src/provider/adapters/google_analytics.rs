use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::contracts::{CrashReport, UserProfile};
use crate::error::{unsupported, AnalyticsResult};
use crate::logger::Logger;
use crate::provider::adapter::{Capability, ProviderAdapter, PushTokenCallback};
use crate::provider::identity::ProviderIdentity;
use crate::provider::transport::{MeasurementProtocolConfig, MeasurementProtocolDispatcher};

const CAPABILITIES: &[Capability] = &[
    Capability::Events,
    Capability::UserProfile,
    Capability::CrashReporting,
    Capability::PushToken,
];

/// GA4 name for an application error event.
const EXCEPTION_EVENT: &str = "exception";

/// Documented Firebase/Google Analytics entry points the adapter calls.
/// A GA4 Measurement Protocol implementation is installed through
/// [`GoogleAnalyticsProvider::configure_measurement_protocol`]; tests inject
/// a recording implementation instead.
#[async_trait]
pub trait GoogleAnalyticsGateway: Send + Sync {
    async fn log_event(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        name: &str,
        params: &BTreeMap<String, Value>,
    ) -> AnalyticsResult<()>;
    async fn set_apns_token(&self, token: &[u8]) -> AnalyticsResult<()>;
    async fn fetch_token(&self) -> AnalyticsResult<String>;
}

/// Built-in adapter for Firebase/Google Analytics.
#[derive(Clone)]
pub struct GoogleAnalyticsProvider {
    inner: Arc<GoogleAnalyticsInner>,
}

struct GoogleAnalyticsInner {
    client_id: String,
    user_id: Mutex<Option<String>>,
    device_token: Mutex<Option<Vec<u8>>>,
    push_token_callback: Mutex<Option<PushTokenCallback>>,
    gateway: Mutex<Option<Arc<dyn GoogleAnalyticsGateway>>>,
    logger: Logger,
}

impl GoogleAnalyticsProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GoogleAnalyticsInner {
                client_id: generate_client_id(),
                user_id: Mutex::new(None),
                device_token: Mutex::new(None),
                push_token_callback: Mutex::new(None),
                gateway: Mutex::new(None),
                logger: Logger::new("analytics-kit/google-analytics"),
            }),
        }
    }

    pub fn set_gateway(&self, gateway: Arc<dyn GoogleAnalyticsGateway>) {
        *self.inner.gateway.lock().unwrap() = Some(gateway);
    }

    /// Configures the adapter to forward events over the GA4 Measurement
    /// Protocol. Replaces any previously configured gateway.
    pub fn configure_measurement_protocol(
        &self,
        config: MeasurementProtocolConfig,
    ) -> AnalyticsResult<()> {
        let dispatcher = MeasurementProtocolDispatcher::new(config)?;
        self.set_gateway(Arc::new(MeasurementProtocolGateway { dispatcher }));
        Ok(())
    }

    /// Stable per-install identifier reported to the measurement protocol.
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Hands a rotated vendor push token to the configured callback, the way
    /// the vendor SDK's messaging delegate would.
    pub fn token_received(&self, token: &str) {
        let callback = self.inner.push_token_callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(token);
        }
    }

    fn gateway(&self) -> Option<Arc<dyn GoogleAnalyticsGateway>> {
        let gateway = self.inner.gateway.lock().unwrap().clone();
        if gateway.is_none() {
            self.inner
                .logger
                .debug("no Google Analytics gateway configured; call dropped");
        }
        gateway
    }

    fn report(&self, result: AnalyticsResult<()>, operation: &str) {
        if let Err(err) = result {
            self.inner
                .logger
                .warn(format!("Google Analytics {operation} failed: {err}"));
        }
    }

    async fn log_event(&self, name: &str, params: &BTreeMap<String, Value>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let user_id = self.inner.user_id.lock().unwrap().clone();
        self.report(
            gateway
                .log_event(&self.inner.client_id, user_id.as_deref(), name, params)
                .await,
            "event",
        );
    }
}

impl Default for GoogleAnalyticsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAnalyticsProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::GoogleAnalytics
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn register(&self) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let device_token = self.inner.device_token.lock().unwrap().clone();
        if let Some(token) = device_token {
            self.report(gateway.set_apns_token(&token).await, "APNs token");
        }
    }

    async fn update_user_info(&self, profile: &UserProfile) {
        // Only the user id has an analytics-side surface; it rides on
        // subsequent events and crash reports.
        if let Some(id) = &profile.user_id {
            *self.inner.user_id.lock().unwrap() = Some(id.clone());
        }
    }

    async fn send_event(&self, name: &str, params: Option<&BTreeMap<String, Value>>) {
        let params = params.cloned().unwrap_or_default();
        self.log_event(name, &params).await;
    }

    async fn send_crash(&self, report: &CrashReport) {
        let params = BTreeMap::from([
            (
                "description".to_string(),
                json!(report.description()),
            ),
            ("fatal".to_string(), json!(false)),
        ]);
        self.log_event(EXCEPTION_EVENT, &params).await;
    }

    async fn fetch_push_token(&self) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        match gateway.fetch_token().await {
            Ok(token) => self.token_received(&token),
            Err(err) => self
                .inner
                .logger
                .warn(format!("push token fetch failed: {err}")),
        }
    }

    fn set_device_token(&self, token: &[u8]) {
        *self.inner.device_token.lock().unwrap() = Some(token.to_vec());
    }

    fn set_push_token_callback(&self, callback: PushTokenCallback) {
        *self.inner.push_token_callback.lock().unwrap() = Some(callback);
    }
}

struct MeasurementProtocolGateway {
    dispatcher: MeasurementProtocolDispatcher,
}

#[async_trait]
impl GoogleAnalyticsGateway for MeasurementProtocolGateway {
    async fn log_event(
        &self,
        client_id: &str,
        user_id: Option<&str>,
        name: &str,
        params: &BTreeMap<String, Value>,
    ) -> AnalyticsResult<()> {
        self.dispatcher
            .send_event(client_id, user_id, name, params)
            .await
    }

    async fn set_apns_token(&self, _token: &[u8]) -> AnalyticsResult<()> {
        Err(unsupported(
            "the measurement protocol has no messaging surface",
        ))
    }

    async fn fetch_token(&self) -> AnalyticsResult<String> {
        Err(unsupported(
            "the measurement protocol has no messaging surface",
        ))
    }
}

fn generate_client_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingGateway {
        events: Mutex<Vec<(String, Option<String>, String, BTreeMap<String, Value>)>>,
        apns_tokens: Mutex<Vec<Vec<u8>>>,
        token: Mutex<Option<String>>,
    }

    #[async_trait]
    impl GoogleAnalyticsGateway for RecordingGateway {
        async fn log_event(
            &self,
            client_id: &str,
            user_id: Option<&str>,
            name: &str,
            params: &BTreeMap<String, Value>,
        ) -> AnalyticsResult<()> {
            self.events.lock().unwrap().push((
                client_id.to_string(),
                user_id.map(str::to_string),
                name.to_string(),
                params.clone(),
            ));
            Ok(())
        }

        async fn set_apns_token(&self, token: &[u8]) -> AnalyticsResult<()> {
            self.apns_tokens.lock().unwrap().push(token.to_vec());
            Ok(())
        }

        async fn fetch_token(&self) -> AnalyticsResult<String> {
            self.token
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| unsupported("no token"))
        }
    }

    fn provider_with_gateway() -> (GoogleAnalyticsProvider, Arc<RecordingGateway>) {
        let provider = GoogleAnalyticsProvider::new();
        let gateway = Arc::new(RecordingGateway::default());
        provider.set_gateway(gateway.clone());
        (provider, gateway)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn events_carry_client_and_user_ids() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .update_user_info(&UserProfile::with_user_id("user-5"))
            .await;
        provider.send_event("AuthScreenAppear", None).await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, provider.client_id());
        assert_eq!(events[0].1.as_deref(), Some("user-5"));
        assert_eq!(events[0].2, "AuthScreenAppear");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn crash_reports_become_exception_events() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .send_crash(&CrashReport::Message("cart overflow".into()))
            .await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events[0].2, "exception");
        assert_eq!(events[0].3.get("description"), Some(&json!("cart overflow")));
        assert_eq!(events[0].3.get("fatal"), Some(&json!(false)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_forwards_stored_device_token() {
        let (provider, gateway) = provider_with_gateway();
        provider.set_device_token(&[9, 8, 7]);
        provider.register().await;
        assert_eq!(gateway.apns_tokens.lock().unwrap().as_slice(), &[vec![9, 8, 7]]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetched_token_reaches_the_callback() {
        let (provider, gateway) = provider_with_gateway();
        *gateway.token.lock().unwrap() = Some("fcm-token".into());

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        provider.set_push_token_callback(Arc::new(move |token| {
            sink.lock().unwrap().push(token.to_string());
        }));

        provider.fetch_push_token().await;
        provider.token_received("rotated-token");

        assert_eq!(
            received.lock().unwrap().as_slice(),
            &["fcm-token".to_string(), "rotated-token".to_string()]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn measurement_protocol_gateway_rejects_messaging_calls() {
        let provider = GoogleAnalyticsProvider::new();
        provider
            .configure_measurement_protocol(MeasurementProtocolConfig::new("G-1", "secret"))
            .unwrap();
        let gateway = provider.inner.gateway.lock().unwrap().clone().unwrap();
        let err = gateway.fetch_token().await.unwrap_err();
        assert_eq!(err.code_str(), "analytics/unsupported");
    }
}
