use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::contracts::{CrashReport, NotificationResponse, UserProfile};
use crate::logger::LogLevel;
use crate::provider::identity::ProviderIdentity;
use crate::provider::revenue::ProviderRevenue;
use crate::provider::settings::Environment;

/// Callback invoked with a vendor push token once it becomes available.
pub type PushTokenCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Operations an adapter actually forwards to its vendor.
///
/// The set an adapter reports is consulted by the dispatch engine: an
/// operation outside the set is skipped for that adapter with one debug
/// diagnostic instead of a silently absorbed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Events,
    ChargedEvents,
    OrderEvents,
    Revenue,
    Tags,
    UserProfile,
    PushNotifications,
    CrashReporting,
    PushToken,
}

/// Common operation set every vendor adapter implements.
///
/// Every optional operation has a default no-op body, so an adapter only
/// implements what its vendor supports — and reports exactly that set from
/// [`capabilities`](Self::capabilities). Adapters never return errors on the
/// dispatch path: a missing credential or gateway disables the vendor call
/// and leaves a diagnostic.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identity tag fixed at construction time.
    fn identity(&self) -> ProviderIdentity;

    /// Operations this adapter forwards to its vendor.
    fn capabilities(&self) -> &'static [Capability];

    /// Bootstraps the vendor SDK with previously applied credentials.
    /// Safe no-op when credentials were never set.
    async fn register(&self);

    /// Forwards identity fields to the vendor's user-profile surface. Only
    /// the fields the vendor supports are forwarded; the rest are dropped
    /// per field without an error.
    async fn update_user_info(&self, _profile: &UserProfile) {}

    /// Forwards a named event, optionally with a parameter bag. Adapters
    /// with typed parameter requirements coerce recognized value shapes and
    /// silently drop the rest.
    async fn send_event(&self, _name: &str, _params: Option<&BTreeMap<String, Value>>) {}

    /// Bulk "charged" event for receipt-like payloads.
    async fn send_charged_event(&self, _details: &BTreeMap<String, Value>, _items: &[Value]) {}

    /// Order-created event carrying revenue, currency, and transaction id.
    async fn send_order_created(
        &self,
        _name: &str,
        _revenue: Option<f64>,
        _currency: &str,
        _transaction_id: Option<&str>,
    ) {
    }

    /// Vendor-shaped revenue payload; adapters act only on their own
    /// [`ProviderRevenue`] variant.
    async fn send_revenue(&self, _revenue: &ProviderRevenue) {}

    /// Bulk user-property update.
    async fn send_tags(&self, _tags: &BTreeMap<String, Value>) {}

    /// Forwards to the vendor's crash-reporting channel.
    async fn send_crash(&self, _report: &CrashReport) {}

    /// Lets the vendor process a tapped push notification and returns any
    /// custom extras a previous notification tap captured.
    async fn handle_notification(
        &self,
        _response: &NotificationResponse,
    ) -> Option<BTreeMap<String, Value>> {
        None
    }

    /// Asks the vendor for its push token and hands it to the configured
    /// [`PushTokenCallback`].
    async fn fetch_push_token(&self) {}

    // Credential and configuration setters. Plain field assignments with no
    // validation; the values take effect on the next `register()`.

    fn set_account_id(&self, _id: &str) {}

    fn set_account_token(&self, _token: &str) {}

    fn set_environment(&self, _environment: Environment) {}

    fn set_device_token(&self, _token: &[u8]) {}

    fn set_network_info_reporting(&self, _enabled: bool) {}

    fn set_session_tracking(&self, _enabled: bool) {}

    fn set_push_token_callback(&self, _callback: PushTokenCallback) {}

    fn set_log_level(&self, _level: LogLevel) {}
}

impl dyn ProviderAdapter {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}
