use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::contracts::{
    AnalyticsEvent, AnalyticsModule, AnalyticsParam, CrashReport, NotificationResponse,
    UserProfile,
};
use crate::logger::Logger;
use crate::provider::{
    Capability, Provider, ProviderAdapter, ProviderIdentity, ProviderRevenue, ProviderSettings,
};

/// Dispatch engine: holds the registered adapters and fans every operation
/// out to them.
///
/// The adapter list grows at registration time and is never pruned; the
/// caller keeps the kit alive for as long as dispatch is needed — a dropped
/// kit silently has no dispatch targets. Fan-out is sequential in
/// registration order on the caller's executor; there is no atomicity across
/// adapters and no operation ever returns an error.
#[derive(Clone)]
pub struct AnalyticsKit {
    inner: Arc<AnalyticsKitInner>,
}

struct AnalyticsKitInner {
    providers: Mutex<Vec<Arc<dyn ProviderAdapter>>>,
    logger: Logger,
}

impl Default for AnalyticsKit {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsKit {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AnalyticsKitInner {
                providers: Mutex::new(Vec::new()),
                logger: Logger::new("analytics-kit/service"),
            }),
        }
    }

    /// Registers an analytics provider: constructs the adapter, bootstraps
    /// the vendor, and appends it to the dispatch list.
    pub async fn register(&self, provider: Provider) {
        self.register_with_settings(provider, &[]).await
    }

    /// Registers an analytics provider with settings applied before the
    /// vendor bootstrap runs.
    pub async fn register_with_settings(&self, provider: Provider, settings: &[ProviderSettings]) {
        let adapter = provider.instantiate();
        self.apply_settings(&adapter, settings);
        adapter.register().await;
        self.inner.providers.lock().unwrap().push(adapter);
    }

    /// Re-applies settings to every registered adapter.
    pub fn apply_providers_settings(&self, settings: &[ProviderSettings]) {
        for adapter in self.snapshot() {
            self.apply_settings(&adapter, settings);
        }
    }

    /// Re-applies settings to every adapter matching `identity`. Two
    /// registrations of the same vendor are indistinguishable here — both
    /// receive the settings.
    pub fn update_settings(&self, identity: &ProviderIdentity, settings: &[ProviderSettings]) {
        for adapter in self.snapshot() {
            if adapter.identity() == *identity {
                self.apply_settings(&adapter, settings);
            }
        }
    }

    /// Identities of the registered adapters, in registration order.
    pub fn registered_identities(&self) -> Vec<ProviderIdentity> {
        self.snapshot()
            .iter()
            .map(|adapter| adapter.identity())
            .collect()
    }

    /// Tells every provider that a unique user is logged into the
    /// application.
    pub async fn update_user_info(&self, profile: &UserProfile) {
        for adapter in self.snapshot() {
            if self.guard(&adapter, Capability::UserProfile, "user profile") {
                adapter.update_user_info(profile).await;
            }
        }
    }

    /// Sends an event to every provider the event's permission predicate
    /// allows.
    pub async fn send_event<E>(&self, event: &E)
    where
        E: AnalyticsEvent + Sync,
    {
        self.dispatch_named(event, Option::<&HashMap<NoParam, Value>>::None, NO_MODULE)
            .await
    }

    /// Sends an event with the module name prefixed to the event name.
    pub async fn send_event_from<E, M>(&self, event: &E, module: Option<&M>)
    where
        E: AnalyticsEvent + Sync,
        M: AnalyticsModule + Sync,
    {
        self.dispatch_named(event, Option::<&HashMap<NoParam, Value>>::None, module)
            .await
    }

    /// Sends an event with provider-rendered parameters and an optional
    /// module prefix.
    pub async fn send_event_with<E, P, M>(
        &self,
        event: &E,
        params: &HashMap<P, Value>,
        module: Option<&M>,
    ) where
        E: AnalyticsEvent + Sync,
        P: AnalyticsParam + Sync,
        M: AnalyticsModule + Sync,
    {
        self.dispatch_named(event, Some(params), module).await
    }

    /// Bulk "charged" event for receipt-like payloads. Fans out
    /// unconditionally; providers without charged-event support are skipped
    /// with a diagnostic.
    pub async fn send_charged_event<P>(&self, params: &HashMap<P, Value>, items: &[Value])
    where
        P: AnalyticsParam + Sync,
    {
        for adapter in self.snapshot() {
            if !self.guard(&adapter, Capability::ChargedEvents, "charged event") {
                continue;
            }
            let identity = adapter.identity();
            let details = render_params(params, &identity);
            adapter.send_charged_event(&details, items).await;
        }
    }

    /// Order-created event carrying revenue, currency, and transaction id.
    /// Fans out unconditionally with the event's own name (no module).
    pub async fn send_order_created<E>(
        &self,
        event: &E,
        revenue: Option<f64>,
        currency: &str,
        transaction_id: Option<&str>,
    ) where
        E: AnalyticsEvent + Sync,
    {
        for adapter in self.snapshot() {
            if !self.guard(&adapter, Capability::OrderEvents, "order event") {
                continue;
            }
            let name = event.name(&adapter.identity());
            adapter
                .send_order_created(&name, revenue, currency, transaction_id)
                .await;
        }
    }

    /// Vendor-shaped revenue payload; every revenue-capable adapter sees it
    /// and acts only on its own variant.
    pub async fn send_revenue(&self, revenue: &ProviderRevenue) {
        for adapter in self.snapshot() {
            if self.guard(&adapter, Capability::Revenue, "revenue") {
                adapter.send_revenue(revenue).await;
            }
        }
    }

    /// Bulk user-property update.
    pub async fn send_tags(&self, tags: &BTreeMap<String, Value>) {
        for adapter in self.snapshot() {
            if self.guard(&adapter, Capability::Tags, "tags") {
                adapter.send_tags(tags).await;
            }
        }
    }

    /// Forwards a captured error to every crash-capable provider.
    pub async fn send_crash_error(&self, error: &(dyn std::error::Error + Send + Sync)) {
        self.send_crash(&CrashReport::Error(error.to_string())).await
    }

    /// Forwards a crash breadcrumb message to every crash-capable provider.
    pub async fn send_crash_message(&self, message: &str) {
        self.send_crash(&CrashReport::Message(message.to_string()))
            .await
    }

    /// Asks every push-token-capable provider to fetch its token and hand
    /// it to the configured callback.
    pub async fn fetch_push_tokens(&self) {
        for adapter in self.snapshot() {
            if self.guard(&adapter, Capability::PushToken, "push token") {
                adapter.fetch_push_token().await;
            }
        }
    }

    /// Lets every notification-capable provider process a tapped push
    /// notification, then returns the `(identity, extras)` pairs for the
    /// adapters that produced non-empty extras, in registration order.
    pub async fn pressed_push_notification(
        &self,
        response: &NotificationResponse,
    ) -> Vec<(ProviderIdentity, BTreeMap<String, Value>)> {
        let mut collected = Vec::new();
        for adapter in self.snapshot() {
            if !self.guard(&adapter, Capability::PushNotifications, "push notification") {
                continue;
            }
            if let Some(extras) = adapter.handle_notification(response).await {
                if !extras.is_empty() {
                    collected.push((adapter.identity(), extras));
                }
            }
        }
        collected
    }

    async fn send_crash(&self, report: &CrashReport) {
        for adapter in self.snapshot() {
            if self.guard(&adapter, Capability::CrashReporting, "crash reporting") {
                adapter.send_crash(report).await;
            }
        }
    }

    async fn dispatch_named<E, P, M>(
        &self,
        event: &E,
        params: Option<&HashMap<P, Value>>,
        module: Option<&M>,
    ) where
        E: AnalyticsEvent + Sync,
        P: AnalyticsParam + Sync,
        M: AnalyticsModule + Sync,
    {
        for adapter in self.snapshot() {
            if !self.guard(&adapter, Capability::Events, "events") {
                continue;
            }
            let identity = adapter.identity();
            let module_dyn = module.map(|m| m as &dyn AnalyticsModule);
            if !event.allows(module_dyn, &identity) {
                continue;
            }
            let name = compose_name(event, module, &identity);
            let rendered = params.map(|params| render_params(params, &identity));
            adapter.send_event(&name, rendered.as_ref()).await;
        }
    }

    fn apply_settings(&self, adapter: &Arc<dyn ProviderAdapter>, settings: &[ProviderSettings]) {
        for setting in settings {
            self.apply_setting(adapter, setting);
        }
    }

    fn apply_setting(&self, adapter: &Arc<dyn ProviderAdapter>, setting: &ProviderSettings) {
        if let Some(target) = setting.target() {
            if adapter.identity() != target {
                self.inner.logger.warn(format!(
                    "{} dropped for provider {}",
                    setting.kind(),
                    adapter.identity()
                ));
                return;
            }
        }

        match setting {
            ProviderSettings::AccountId(id) => adapter.set_account_id(id),
            ProviderSettings::AccountToken(token) => adapter.set_account_token(token),
            ProviderSettings::Environment(environment) => adapter.set_environment(*environment),
            ProviderSettings::DeviceToken(token) => adapter.set_device_token(token),
            ProviderSettings::NetworkInfoReporting(enabled) => {
                adapter.set_network_info_reporting(*enabled)
            }
            ProviderSettings::PushTokenCallback(callback) => {
                adapter.set_push_token_callback(Arc::clone(callback))
            }
            ProviderSettings::LogLevel(level) => adapter.set_log_level(*level),
            ProviderSettings::Adjust {
                account_token,
                environment,
            } => {
                if let Some(token) = account_token {
                    adapter.set_account_token(token);
                }
                if let Some(environment) = environment {
                    adapter.set_environment(*environment);
                }
            }
            ProviderSettings::Amplitude {
                account_token,
                track_session_events,
            } => {
                if let Some(token) = account_token {
                    adapter.set_account_token(token);
                }
                if let Some(enabled) = track_session_events {
                    adapter.set_session_tracking(*enabled);
                }
            }
            ProviderSettings::CleverTap {
                account_id,
                account_token,
                network_info_reporting,
                device_token,
            } => {
                if let Some(id) = account_id {
                    adapter.set_account_id(id);
                }
                if let Some(token) = account_token {
                    adapter.set_account_token(token);
                }
                if let Some(enabled) = network_info_reporting {
                    adapter.set_network_info_reporting(*enabled);
                }
                if let Some(token) = device_token {
                    adapter.set_device_token(token);
                }
            }
            ProviderSettings::GoogleAnalytics {
                push_token_callback,
                device_token,
            } => {
                if let Some(callback) = push_token_callback {
                    adapter.set_push_token_callback(Arc::clone(callback));
                }
                if let Some(token) = device_token {
                    adapter.set_device_token(token);
                }
            }
        }
    }

    fn guard(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        capability: Capability,
        operation: &str,
    ) -> bool {
        if adapter.supports(capability) {
            return true;
        }
        self.inner.logger.debug(format!(
            "provider {} has no {operation} support; skipped",
            adapter.identity()
        ));
        false
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.inner.providers.lock().unwrap().clone()
    }
}

fn compose_name<E, M>(event: &E, module: Option<&M>, identity: &ProviderIdentity) -> String
where
    E: AnalyticsEvent + ?Sized,
    M: AnalyticsModule + ?Sized,
{
    match module {
        Some(module) => module.name(identity) + &event.name(identity),
        None => event.name(identity),
    }
}

fn render_params<P>(params: &HashMap<P, Value>, identity: &ProviderIdentity) -> BTreeMap<String, Value>
where
    P: AnalyticsParam,
{
    params
        .iter()
        .map(|(param, value)| (param.name(identity), value.clone()))
        .collect()
}

const NO_MODULE: Option<&NoModule> = None;

struct NoModule;

impl AnalyticsModule for NoModule {
    fn name(&self, _provider: &ProviderIdentity) -> String {
        String::new()
    }
}

#[derive(PartialEq, Eq, Hash)]
struct NoParam;

impl AnalyticsParam for NoParam {
    fn name(&self, _provider: &ProviderIdentity) -> String {
        String::new()
    }
}
