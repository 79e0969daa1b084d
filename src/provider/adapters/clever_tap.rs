use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::contracts::{NotificationResponse, UserProfile};
use crate::error::AnalyticsResult;
use crate::logger::{LogLevel, Logger};
use crate::provider::adapter::{Capability, ProviderAdapter};
use crate::provider::identity::ProviderIdentity;

const CAPABILITIES: &[Capability] = &[
    Capability::Events,
    Capability::ChargedEvents,
    Capability::UserProfile,
    Capability::PushNotifications,
];

/// Documented CleverTap SDK entry points the adapter calls. CleverTap gates
/// ingestion behind server-side auth, so callers inject an implementation;
/// without one every call is dropped with a debug diagnostic.
#[async_trait]
pub trait CleverTapGateway: Send + Sync {
    async fn set_credentials(&self, account_id: &str, account_token: &str) -> AnalyticsResult<()>;
    async fn auto_integrate(&self) -> AnalyticsResult<()>;
    async fn on_user_login(&self, profile: &BTreeMap<String, Value>) -> AnalyticsResult<()>;
    async fn set_location(&self, latitude: f64, longitude: f64) -> AnalyticsResult<()>;
    async fn record_event(
        &self,
        name: &str,
        props: Option<&BTreeMap<String, Value>>,
    ) -> AnalyticsResult<()>;
    async fn record_charged_event(
        &self,
        details: &BTreeMap<String, Value>,
        items: &[Value],
    ) -> AnalyticsResult<()>;
    async fn handle_notification(&self, payload: &BTreeMap<String, Value>) -> AnalyticsResult<()>;
    async fn set_push_token(&self, token: &[u8]) -> AnalyticsResult<()>;
    async fn enable_network_info_reporting(&self, enabled: bool) -> AnalyticsResult<()>;
}

/// Built-in adapter for the CleverTap engagement SDK.
#[derive(Clone)]
pub struct CleverTapProvider {
    inner: Arc<CleverTapInner>,
}

struct CleverTapInner {
    account_id: Mutex<Option<String>>,
    account_token: Mutex<Option<String>>,
    device_token: Mutex<Option<Vec<u8>>>,
    network_info_reporting: Mutex<Option<bool>>,
    push_extras: Mutex<Option<BTreeMap<String, Value>>>,
    gateway: Mutex<Option<Arc<dyn CleverTapGateway>>>,
    logger: Logger,
}

impl CleverTapProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CleverTapInner {
                account_id: Mutex::new(None),
                account_token: Mutex::new(None),
                device_token: Mutex::new(None),
                network_info_reporting: Mutex::new(None),
                push_extras: Mutex::new(None),
                gateway: Mutex::new(None),
                logger: Logger::new("analytics-kit/clevertap"),
            }),
        }
    }

    pub fn set_gateway(&self, gateway: Arc<dyn CleverTapGateway>) {
        *self.inner.gateway.lock().unwrap() = Some(gateway);
    }

    /// Records the custom extras of a tapped push notification. The next
    /// `handle_notification` call returns them once.
    pub fn notification_tapped(&self, extras: BTreeMap<String, Value>) {
        *self.inner.push_extras.lock().unwrap() = Some(extras);
    }

    fn gateway(&self) -> Option<Arc<dyn CleverTapGateway>> {
        let gateway = self.inner.gateway.lock().unwrap().clone();
        if gateway.is_none() {
            self.inner
                .logger
                .debug("no CleverTap gateway configured; call dropped");
        }
        gateway
    }

    fn report(&self, result: AnalyticsResult<()>, operation: &str) {
        if let Err(err) = result {
            self.inner
                .logger
                .warn(format!("CleverTap {operation} failed: {err}"));
        }
    }

    #[cfg(test)]
    pub(crate) fn credentials_for_tests(&self) -> (Option<String>, Option<String>) {
        (
            self.inner.account_id.lock().unwrap().clone(),
            self.inner.account_token.lock().unwrap().clone(),
        )
    }
}

impl Default for CleverTapProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for CleverTapProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::CleverTap
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn register(&self) {
        let Some(gateway) = self.gateway() else {
            return;
        };

        let account_id = self.inner.account_id.lock().unwrap().clone();
        let account_token = self.inner.account_token.lock().unwrap().clone();
        if let (Some(id), Some(token)) = (account_id, account_token) {
            self.report(gateway.set_credentials(&id, &token).await, "credentials");
        }
        self.report(gateway.auto_integrate().await, "auto-integrate");

        // Forward configuration captured before registration.
        let device_token = self.inner.device_token.lock().unwrap().clone();
        if let Some(token) = device_token {
            self.report(gateway.set_push_token(&token).await, "push token");
        }
        let reporting = *self.inner.network_info_reporting.lock().unwrap();
        if let Some(enabled) = reporting {
            self.report(
                gateway.enable_network_info_reporting(enabled).await,
                "network info reporting",
            );
        }
    }

    async fn update_user_info(&self, profile: &UserProfile) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let mut fields = BTreeMap::new();
        if let Some(id) = &profile.user_id {
            fields.insert("Identity".to_string(), Value::String(id.clone()));
        }
        if let Some(name) = &profile.name {
            fields.insert("Name".to_string(), Value::String(name.clone()));
        }
        if let Some(email) = &profile.email {
            fields.insert("Email".to_string(), Value::String(email.clone()));
        }
        if let Some(phone) = &profile.phone {
            fields.insert("Phone".to_string(), Value::String(phone.clone()));
        }
        self.report(gateway.on_user_login(&fields).await, "user login");

        if let Some(location) = profile.location {
            self.report(
                gateway
                    .set_location(location.latitude, location.longitude)
                    .await,
                "location update",
            );
        }
    }

    async fn send_event(&self, name: &str, params: Option<&BTreeMap<String, Value>>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        self.report(gateway.record_event(name, params).await, "event");
    }

    async fn send_charged_event(&self, details: &BTreeMap<String, Value>, items: &[Value]) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        self.report(
            gateway.record_charged_event(details, items).await,
            "charged event",
        );
    }

    async fn handle_notification(
        &self,
        response: &NotificationResponse,
    ) -> Option<BTreeMap<String, Value>> {
        if let Some(gateway) = self.gateway() {
            self.report(
                gateway.handle_notification(&response.payload).await,
                "notification handling",
            );
        }
        // Extras captured by a notification tap are consumed exactly once.
        self.inner.push_extras.lock().unwrap().take()
    }

    fn set_account_id(&self, id: &str) {
        *self.inner.account_id.lock().unwrap() = Some(id.to_string());
    }

    fn set_account_token(&self, token: &str) {
        *self.inner.account_token.lock().unwrap() = Some(token.to_string());
    }

    fn set_device_token(&self, token: &[u8]) {
        *self.inner.device_token.lock().unwrap() = Some(token.to_vec());
    }

    fn set_network_info_reporting(&self, enabled: bool) {
        *self.inner.network_info_reporting.lock().unwrap() = Some(enabled);
    }

    fn set_log_level(&self, level: LogLevel) {
        self.inner.logger.set_log_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Coordinate;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Credentials(String, String),
        AutoIntegrate,
        UserLogin(BTreeMap<String, Value>),
        Location(f64, f64),
        Event(String),
        Charged(usize),
        Notification,
        PushToken(Vec<u8>),
        NetworkInfo(bool),
    }

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl CleverTapGateway for RecordingGateway {
        async fn set_credentials(
            &self,
            account_id: &str,
            account_token: &str,
        ) -> AnalyticsResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Credentials(account_id.into(), account_token.into()));
            Ok(())
        }

        async fn auto_integrate(&self) -> AnalyticsResult<()> {
            self.calls.lock().unwrap().push(Call::AutoIntegrate);
            Ok(())
        }

        async fn on_user_login(&self, profile: &BTreeMap<String, Value>) -> AnalyticsResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::UserLogin(profile.clone()));
            Ok(())
        }

        async fn set_location(&self, latitude: f64, longitude: f64) -> AnalyticsResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Location(latitude, longitude));
            Ok(())
        }

        async fn record_event(
            &self,
            name: &str,
            _props: Option<&BTreeMap<String, Value>>,
        ) -> AnalyticsResult<()> {
            self.calls.lock().unwrap().push(Call::Event(name.into()));
            Ok(())
        }

        async fn record_charged_event(
            &self,
            _details: &BTreeMap<String, Value>,
            items: &[Value],
        ) -> AnalyticsResult<()> {
            self.calls.lock().unwrap().push(Call::Charged(items.len()));
            Ok(())
        }

        async fn handle_notification(
            &self,
            _payload: &BTreeMap<String, Value>,
        ) -> AnalyticsResult<()> {
            self.calls.lock().unwrap().push(Call::Notification);
            Ok(())
        }

        async fn set_push_token(&self, token: &[u8]) -> AnalyticsResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::PushToken(token.to_vec()));
            Ok(())
        }

        async fn enable_network_info_reporting(&self, enabled: bool) -> AnalyticsResult<()> {
            self.calls.lock().unwrap().push(Call::NetworkInfo(enabled));
            Ok(())
        }
    }

    fn provider_with_gateway() -> (CleverTapProvider, Arc<RecordingGateway>) {
        let provider = CleverTapProvider::new();
        let gateway = Arc::new(RecordingGateway::default());
        provider.set_gateway(gateway.clone());
        (provider, gateway)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_forwards_credentials_and_stored_configuration() {
        let (provider, gateway) = provider_with_gateway();
        provider.set_account_id("acct");
        provider.set_account_token("token");
        provider.set_device_token(&[1, 2, 3]);
        provider.set_network_info_reporting(true);
        provider.register().await;

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[
                Call::Credentials("acct".into(), "token".into()),
                Call::AutoIntegrate,
                Call::PushToken(vec![1, 2, 3]),
                Call::NetworkInfo(true),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_without_credentials_still_auto_integrates() {
        let (provider, gateway) = provider_with_gateway();
        provider.register().await;
        assert_eq!(gateway.calls.lock().unwrap().as_slice(), &[Call::AutoIntegrate]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn user_info_forwards_present_fields_only() {
        let (provider, gateway) = provider_with_gateway();
        let profile = UserProfile {
            user_id: Some("user-1".into()),
            name: Some("Ada".into()),
            email: None,
            phone: None,
            location: Some(Coordinate {
                latitude: 55.75,
                longitude: 37.61,
            }),
        };
        provider.update_user_info(&profile).await;

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[
                Call::UserLogin(BTreeMap::from([
                    ("Identity".to_string(), json!("user-1")),
                    ("Name".to_string(), json!("Ada")),
                ])),
                Call::Location(55.75, 37.61),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn notification_extras_are_consumed_once() {
        let (provider, _gateway) = provider_with_gateway();
        let extras = BTreeMap::from([("deeplink".to_string(), json!("app://offer"))]);
        provider.notification_tapped(extras.clone());

        let response = NotificationResponse::default();
        assert_eq!(provider.handle_notification(&response).await, Some(extras));
        assert_eq!(provider.handle_notification(&response).await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn charged_event_passes_items_through() {
        let (provider, gateway) = provider_with_gateway();
        let details = BTreeMap::from([("Amount".to_string(), json!(24.0))]);
        let items = vec![json!({"sku": "a"}), json!({"sku": "b"})];
        provider.send_charged_event(&details, &items).await;
        assert_eq!(gateway.calls.lock().unwrap().as_slice(), &[Call::Charged(2)]);
    }
}
