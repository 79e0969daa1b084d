use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::contracts::UserProfile;
use crate::error::AnalyticsResult;
use crate::logger::Logger;
use crate::provider::adapter::{Capability, ProviderAdapter};
use crate::provider::identity::ProviderIdentity;
use crate::provider::revenue::ProviderRevenue;
use crate::provider::transport::{
    AmplitudeHttpConfig, AmplitudeHttpDispatcher, AmplitudeWireEvent,
};

const CAPABILITIES: &[Capability] = &[
    Capability::Events,
    Capability::Revenue,
    Capability::Tags,
    Capability::UserProfile,
];

const SESSION_START_EVENT: &str = "session_start";
const IDENTIFY_EVENT: &str = "$identify";
const REVENUE_EVENT: &str = "revenue_amount";

/// Documented Amplitude SDK entry points the adapter calls. The adapter
/// installs an HTTP API v2 implementation at `register()` when an account
/// token is present; tests inject a recording implementation instead.
#[async_trait]
pub trait AmplitudeGateway: Send + Sync {
    async fn log_event(&self, event: &AmplitudeWireEvent) -> AnalyticsResult<()>;
}

/// Built-in adapter for the Amplitude product analytics SDK.
#[derive(Clone)]
pub struct AmplitudeProvider {
    inner: Arc<AmplitudeInner>,
}

struct AmplitudeInner {
    account_token: Mutex<Option<String>>,
    track_session_events: Mutex<Option<bool>>,
    user_id: Mutex<Option<String>>,
    device_id: String,
    gateway: Mutex<Option<Arc<dyn AmplitudeGateway>>>,
    logger: Logger,
}

impl AmplitudeProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AmplitudeInner {
                account_token: Mutex::new(None),
                track_session_events: Mutex::new(None),
                user_id: Mutex::new(None),
                device_id: generate_device_id(),
                gateway: Mutex::new(None),
                logger: Logger::new("analytics-kit/amplitude"),
            }),
        }
    }

    pub fn set_gateway(&self, gateway: Arc<dyn AmplitudeGateway>) {
        *self.inner.gateway.lock().unwrap() = Some(gateway);
    }

    /// Per-install device identifier reported with every event.
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    fn gateway(&self) -> Option<Arc<dyn AmplitudeGateway>> {
        let gateway = self.inner.gateway.lock().unwrap().clone();
        if gateway.is_none() {
            self.inner
                .logger
                .debug("Amplitude not registered; call dropped");
        }
        gateway
    }

    fn base_event(&self, event_type: &str) -> AmplitudeWireEvent {
        AmplitudeWireEvent {
            device_id: self.inner.device_id.clone(),
            user_id: self.inner.user_id.lock().unwrap().clone(),
            event_type: event_type.to_string(),
            ..Default::default()
        }
    }

    fn report(&self, result: AnalyticsResult<()>, operation: &str) {
        if let Err(err) = result {
            self.inner
                .logger
                .warn(format!("Amplitude {operation} failed: {err}"));
        }
    }

    #[cfg(test)]
    pub(crate) fn session_tracking_for_tests(&self) -> Option<bool> {
        *self.inner.track_session_events.lock().unwrap()
    }
}

impl Default for AmplitudeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AmplitudeProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Amplitude
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn register(&self) {
        let has_gateway = self.inner.gateway.lock().unwrap().is_some();
        if !has_gateway {
            let token = self.inner.account_token.lock().unwrap().clone();
            let Some(api_key) = token else {
                self.inner
                    .logger
                    .debug("Amplitude account token not set; provider stays inactive");
                return;
            };
            match AmplitudeHttpDispatcher::new(AmplitudeHttpConfig::new(api_key)) {
                Ok(dispatcher) => {
                    self.set_gateway(Arc::new(HttpGateway { dispatcher }));
                }
                Err(err) => {
                    self.inner
                        .logger
                        .warn(format!("Amplitude dispatcher setup failed: {err}"));
                    return;
                }
            }
        }

        // The vendor SDK emits the standard session events itself when
        // session tracking is on; over the HTTP API the adapter marks the
        // session start explicitly.
        if *self.inner.track_session_events.lock().unwrap() == Some(true) {
            if let Some(gateway) = self.gateway() {
                let event = self.base_event(SESSION_START_EVENT);
                self.report(gateway.log_event(&event).await, "session start");
            }
        }
    }

    async fn update_user_info(&self, profile: &UserProfile) {
        // Amplitude only consumes the user id; it rides on subsequent events.
        if let Some(id) = &profile.user_id {
            *self.inner.user_id.lock().unwrap() = Some(id.clone());
        }
    }

    async fn send_event(&self, name: &str, params: Option<&BTreeMap<String, Value>>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let mut event = self.base_event(name);
        if let Some(params) = params {
            event.event_properties = params.clone();
        }
        self.report(gateway.log_event(&event).await, "event");
    }

    async fn send_tags(&self, tags: &BTreeMap<String, Value>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let mut event = self.base_event(IDENTIFY_EVENT);
        event.user_properties = tags.clone();
        self.report(gateway.log_event(&event).await, "user properties update");
    }

    async fn send_revenue(&self, revenue: &ProviderRevenue) {
        let ProviderRevenue::Amplitude {
            product_id,
            price,
            quantity,
            revenue_type,
        } = revenue
        else {
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        let mut event = self.base_event(REVENUE_EVENT);
        event.price = Some(*price);
        event.quantity = Some(*quantity);
        event.product_id = product_id.clone();
        event.revenue_type = revenue_type.clone();
        self.report(gateway.log_event(&event).await, "revenue event");
    }

    fn set_account_token(&self, token: &str) {
        *self.inner.account_token.lock().unwrap() = Some(token.to_string());
    }

    fn set_session_tracking(&self, enabled: bool) {
        *self.inner.track_session_events.lock().unwrap() = Some(enabled);
    }
}

struct HttpGateway {
    dispatcher: AmplitudeHttpDispatcher,
}

#[async_trait]
impl AmplitudeGateway for HttpGateway {
    async fn log_event(&self, event: &AmplitudeWireEvent) -> AnalyticsResult<()> {
        self.dispatcher.upload(std::slice::from_ref(event)).await
    }
}

fn generate_device_id() -> String {
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
    use serde_json::json;

    #[derive(Default)]
    struct RecordingGateway {
        events: Mutex<Vec<AmplitudeWireEvent>>,
    }

    #[async_trait]
    impl AmplitudeGateway for RecordingGateway {
        async fn log_event(&self, event: &AmplitudeWireEvent) -> AnalyticsResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn provider_with_gateway() -> (AmplitudeProvider, Arc<RecordingGateway>) {
        let provider = AmplitudeProvider::new();
        let gateway = Arc::new(RecordingGateway::default());
        provider.set_gateway(gateway.clone());
        (provider, gateway)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn events_carry_device_and_user_ids() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .update_user_info(&UserProfile::with_user_id("user-3"))
            .await;
        provider.send_event("AuthScreenAppear", None).await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "AuthScreenAppear");
        assert_eq!(events[0].device_id, provider.device_id());
        assert_eq!(events[0].user_id.as_deref(), Some("user-3"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tags_become_an_identify_event() {
        let (provider, gateway) = provider_with_gateway();
        let tags = BTreeMap::from([("tier".to_string(), json!("gold"))]);
        provider.send_tags(&tags).await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events[0].event_type, "$identify");
        assert_eq!(events[0].user_properties, tags);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn session_tracking_marks_session_start_on_register() {
        let (provider, gateway) = provider_with_gateway();
        provider.set_session_tracking(true);
        provider.register().await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "session_start");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_without_token_stays_inactive() {
        let provider = AmplitudeProvider::new();
        provider.register().await;
        provider.send_event("Appear", None).await;
        // No gateway was installed, so nothing to assert beyond not panicking;
        // the call is dropped with a debug diagnostic.
        assert!(provider.inner.gateway.lock().unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn revenue_maps_to_amplitude_fields() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .send_revenue(&ProviderRevenue::Amplitude {
                product_id: Some("sku-1".into()),
                price: 4.99,
                quantity: 2,
                revenue_type: Some("purchase".into()),
            })
            .await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events[0].event_type, "revenue_amount");
        assert_eq!(events[0].price, Some(4.99));
        assert_eq!(events[0].quantity, Some(2));
        assert_eq!(events[0].product_id.as_deref(), Some("sku-1"));
        assert_eq!(events[0].revenue_type.as_deref(), Some("purchase"));
    }
}
