use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::contracts::UserProfile;
use crate::error::AnalyticsResult;
use crate::logger::Logger;
use crate::provider::adapter::{Capability, ProviderAdapter};
use crate::provider::identity::ProviderIdentity;
use crate::provider::revenue::ProviderRevenue;

const CAPABILITIES: &[Capability] = &[
    Capability::Events,
    Capability::Revenue,
    Capability::UserProfile,
];

/// Documented AppMetrica SDK entry points the adapter calls. AppMetrica
/// gates ingestion behind server-side auth, so callers inject an
/// implementation; without one every call is dropped with a debug
/// diagnostic.
#[async_trait]
pub trait AppMetricaGateway: Send + Sync {
    async fn activate(&self, api_key: &str) -> AnalyticsResult<()>;
    async fn report_event(
        &self,
        name: &str,
        params: Option<&BTreeMap<String, Value>>,
    ) -> AnalyticsResult<()>;
    async fn report_profile(
        &self,
        user_id: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> AnalyticsResult<()>;
    async fn report_revenue(
        &self,
        amount: f64,
        currency: &str,
        product_id: Option<&str>,
    ) -> AnalyticsResult<()>;
}

/// Built-in adapter for the AppMetrica analytics SDK.
#[derive(Clone)]
pub struct AppMetricaProvider {
    inner: Arc<AppMetricaInner>,
}

struct AppMetricaInner {
    account_token: Mutex<Option<String>>,
    gateway: Mutex<Option<Arc<dyn AppMetricaGateway>>>,
    logger: Logger,
}

impl AppMetricaProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppMetricaInner {
                account_token: Mutex::new(None),
                gateway: Mutex::new(None),
                logger: Logger::new("analytics-kit/appmetrica"),
            }),
        }
    }

    pub fn set_gateway(&self, gateway: Arc<dyn AppMetricaGateway>) {
        *self.inner.gateway.lock().unwrap() = Some(gateway);
    }

    fn gateway(&self) -> Option<Arc<dyn AppMetricaGateway>> {
        let gateway = self.inner.gateway.lock().unwrap().clone();
        if gateway.is_none() {
            self.inner
                .logger
                .debug("no AppMetrica gateway configured; call dropped");
        }
        gateway
    }

    fn report(&self, result: AnalyticsResult<()>, operation: &str) {
        if let Err(err) = result {
            self.inner
                .logger
                .warn(format!("AppMetrica {operation} failed: {err}"));
        }
    }
}

impl Default for AppMetricaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AppMetricaProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::AppMetrica
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn register(&self) {
        let token = self.inner.account_token.lock().unwrap().clone();
        let Some(api_key) = token else {
            self.inner
                .logger
                .warn("missing required parameters for registration");
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        self.report(gateway.activate(&api_key).await, "activation");
    }

    async fn update_user_info(&self, profile: &UserProfile) {
        // AppMetrica requires a profile id before accepting attributes.
        let Some(id) = &profile.user_id else {
            self.inner
                .logger
                .warn("user info was not transferred - user id must be present");
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        let mut attributes = BTreeMap::new();
        if let Some(name) = &profile.name {
            attributes.insert("name".to_string(), json!(name));
        }
        if let Some(email) = &profile.email {
            attributes.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = &profile.phone {
            attributes.insert("phone".to_string(), json!(phone));
        }
        if let Some(location) = profile.location {
            attributes.insert("latitude".to_string(), json!(location.latitude.to_string()));
            attributes.insert(
                "longitude".to_string(),
                json!(location.longitude.to_string()),
            );
        }
        self.report(gateway.report_profile(id, &attributes).await, "profile");
    }

    async fn send_event(&self, name: &str, params: Option<&BTreeMap<String, Value>>) {
        let Some(gateway) = self.gateway() else {
            return;
        };
        self.report(gateway.report_event(name, params).await, "event");
    }

    async fn send_revenue(&self, revenue: &ProviderRevenue) {
        let ProviderRevenue::AppMetrica {
            amount,
            currency,
            product_id,
        } = revenue
        else {
            return;
        };
        let Some(gateway) = self.gateway() else {
            return;
        };
        self.report(
            gateway
                .report_revenue(*amount, currency, product_id.as_deref())
                .await,
            "revenue",
        );
    }

    fn set_account_token(&self, token: &str) {
        *self.inner.account_token.lock().unwrap() = Some(token.to_string());
    }
}
