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
use crate::provider::settings::Environment;

const CAPABILITIES: &[Capability] = &[
    Capability::Events,
    Capability::OrderEvents,
    Capability::Revenue,
    Capability::UserProfile,
];

const USER_ID_PARAMETER: &str = "user_id";

/// Launch configuration handed to the Adjust SDK surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdjustConfig {
    pub app_token: String,
    pub environment: Environment,
}

/// One tracked Adjust event. Callback parameters are string-typed, which is
/// why the adapter coerces recognized JSON shapes and drops the rest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdjustEvent {
    pub event_token: String,
    pub callback_params: BTreeMap<String, String>,
    pub revenue: Option<f64>,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
}

/// Documented Adjust SDK entry points the adapter calls. Adjust gates its
/// ingestion behind server-side auth, so callers inject an implementation;
/// without one every call is dropped with a debug diagnostic.
#[async_trait]
pub trait AdjustGateway: Send + Sync {
    async fn launch(&self, config: &AdjustConfig) -> AnalyticsResult<()>;
    async fn track_event(&self, event: &AdjustEvent) -> AnalyticsResult<()>;
    async fn add_session_callback_parameter(&self, key: &str, value: &str) -> AnalyticsResult<()>;
    async fn remove_session_callback_parameter(&self, key: &str) -> AnalyticsResult<()>;
}

/// Built-in adapter for the Adjust attribution SDK.
#[derive(Clone)]
pub struct AdjustProvider {
    inner: Arc<AdjustInner>,
}

struct AdjustInner {
    account_token: Mutex<Option<String>>,
    environment: Mutex<Option<Environment>>,
    gateway: Mutex<Option<Arc<dyn AdjustGateway>>>,
    logger: Logger,
}

impl AdjustProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AdjustInner {
                account_token: Mutex::new(None),
                environment: Mutex::new(None),
                gateway: Mutex::new(None),
                logger: Logger::new("analytics-kit/adjust"),
            }),
        }
    }

    pub fn set_gateway(&self, gateway: Arc<dyn AdjustGateway>) {
        *self.inner.gateway.lock().unwrap() = Some(gateway);
    }

    fn gateway(&self) -> Option<Arc<dyn AdjustGateway>> {
        let gateway = self.inner.gateway.lock().unwrap().clone();
        if gateway.is_none() {
            self.inner
                .logger
                .debug("no Adjust gateway configured; call dropped");
        }
        gateway
    }

    fn report(&self, result: AnalyticsResult<()>, operation: &str) {
        if let Err(err) = result {
            self.inner
                .logger
                .warn(format!("Adjust {operation} failed: {err}"));
        }
    }

    #[cfg(test)]
    pub(crate) fn account_token_for_tests(&self) -> Option<String> {
        self.inner.account_token.lock().unwrap().clone()
    }
}

impl Default for AdjustProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AdjustProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Adjust
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn register(&self) {
        let token = self.inner.account_token.lock().unwrap().clone();
        let environment = *self.inner.environment.lock().unwrap();
        let (Some(app_token), Some(environment)) = (token, environment) else {
            self.inner
                .logger
                .debug("Adjust credentials not set; provider stays inactive");
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        let config = AdjustConfig {
            app_token,
            environment,
        };
        self.report(gateway.launch(&config).await, "launch");
    }

    async fn update_user_info(&self, profile: &UserProfile) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        // Adjust only understands the user id, forwarded as a session
        // callback parameter. A cleared id removes the parameter.
        let result = match &profile.user_id {
            Some(id) => {
                gateway
                    .add_session_callback_parameter(USER_ID_PARAMETER, id)
                    .await
            }
            None => {
                gateway
                    .remove_session_callback_parameter(USER_ID_PARAMETER)
                    .await
            }
        };
        self.report(result, "user info update");
    }

    async fn send_event(&self, name: &str, params: Option<&BTreeMap<String, Value>>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let event = AdjustEvent {
            event_token: name.to_string(),
            callback_params: params.map(coerce_callback_params).unwrap_or_default(),
            ..Default::default()
        };
        self.report(gateway.track_event(&event).await, "event");
    }

    async fn send_order_created(
        &self,
        name: &str,
        revenue: Option<f64>,
        currency: &str,
        transaction_id: Option<&str>,
    ) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        let event = AdjustEvent {
            event_token: name.to_string(),
            revenue,
            currency: revenue.map(|_| currency.to_string()),
            transaction_id: transaction_id.map(str::to_string),
            ..Default::default()
        };
        self.report(gateway.track_event(&event).await, "order event");
    }

    async fn send_revenue(&self, revenue: &ProviderRevenue) {
        let ProviderRevenue::Adjust {
            event_token,
            amount,
            currency,
            transaction_id,
        } = revenue
        else {
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        let event = AdjustEvent {
            event_token: event_token.clone(),
            revenue: Some(*amount),
            currency: Some(currency.clone()),
            transaction_id: transaction_id.clone(),
            ..Default::default()
        };
        self.report(gateway.track_event(&event).await, "revenue event");
    }

    fn set_account_token(&self, token: &str) {
        *self.inner.account_token.lock().unwrap() = Some(token.to_string());
    }

    fn set_environment(&self, environment: Environment) {
        *self.inner.environment.lock().unwrap() = Some(environment);
    }
}

fn coerce_callback_params(params: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    params
        .iter()
        .filter_map(|(key, value)| coerce_callback_value(value).map(|text| (key.clone(), text)))
        .collect()
}

// Adjust callback parameters are strings; strings, bools, and integers are
// kept, everything else is dropped.
fn coerce_callback_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(if *flag { "true" } else { "false" }.to_string()),
        Value::Number(number) => number.as_i64().map(|int| int.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingGateway {
        launches: Mutex<Vec<AdjustConfig>>,
        events: Mutex<Vec<AdjustEvent>>,
        session_params: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl AdjustGateway for RecordingGateway {
        async fn launch(&self, config: &AdjustConfig) -> AnalyticsResult<()> {
            self.launches.lock().unwrap().push(config.clone());
            Ok(())
        }

        async fn track_event(&self, event: &AdjustEvent) -> AnalyticsResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn add_session_callback_parameter(
            &self,
            key: &str,
            value: &str,
        ) -> AnalyticsResult<()> {
            self.session_params
                .lock()
                .unwrap()
                .push((key.to_string(), Some(value.to_string())));
            Ok(())
        }

        async fn remove_session_callback_parameter(&self, key: &str) -> AnalyticsResult<()> {
            self.session_params
                .lock()
                .unwrap()
                .push((key.to_string(), None));
            Ok(())
        }
    }

    fn provider_with_gateway() -> (AdjustProvider, Arc<RecordingGateway>) {
        let provider = AdjustProvider::new();
        let gateway = Arc::new(RecordingGateway::default());
        provider.set_gateway(gateway.clone());
        (provider, gateway)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_without_credentials_is_a_no_op() {
        let (provider, gateway) = provider_with_gateway();
        provider.register().await;
        assert!(gateway.launches.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_launches_with_stored_credentials() {
        let (provider, gateway) = provider_with_gateway();
        provider.set_account_token("adj-token");
        provider.set_environment(Environment::Sandbox);
        provider.register().await;

        let launches = gateway.launches.lock().unwrap();
        assert_eq!(
            launches.as_slice(),
            &[AdjustConfig {
                app_token: "adj-token".into(),
                environment: Environment::Sandbox,
            }]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn event_params_keep_strings_bools_and_integers_only() {
        let (provider, gateway) = provider_with_gateway();
        let params = BTreeMap::from([
            ("plan".to_string(), json!("premium")),
            ("active".to_string(), json!(true)),
            ("count".to_string(), json!(5)),
            ("ratio".to_string(), json!(1.5)),
            ("nested".to_string(), json!({"a": 1})),
        ]);
        provider.send_event("evt-token", Some(&params)).await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].callback_params,
            BTreeMap::from([
                ("plan".to_string(), "premium".to_string()),
                ("active".to_string(), "true".to_string()),
                ("count".to_string(), "5".to_string()),
            ])
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn user_id_toggles_session_callback_parameter() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .update_user_info(&UserProfile::with_user_id("user-1"))
            .await;
        provider.update_user_info(&UserProfile::default()).await;

        let recorded = gateway.session_params.lock().unwrap();
        assert_eq!(
            recorded.as_slice(),
            &[
                ("user_id".to_string(), Some("user-1".to_string())),
                ("user_id".to_string(), None),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn order_created_carries_revenue_and_transaction() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .send_order_created("order-token", Some(12.5), "EUR", Some("tx-9"))
            .await;

        let events = gateway.events.lock().unwrap();
        assert_eq!(events[0].revenue, Some(12.5));
        assert_eq!(events[0].currency.as_deref(), Some("EUR"));
        assert_eq!(events[0].transaction_id.as_deref(), Some("tx-9"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn foreign_revenue_variants_are_ignored() {
        let (provider, gateway) = provider_with_gateway();
        provider
            .send_revenue(&ProviderRevenue::AppMetrica {
                amount: 3.0,
                currency: "USD".into(),
                product_id: None,
            })
            .await;
        assert!(gateway.events.lock().unwrap().is_empty());
    }
}
