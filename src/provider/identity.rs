use std::fmt;
use std::sync::Arc;

use crate::provider::adapter::ProviderAdapter;
use crate::provider::adapters::{
    AdjustProvider, AmplitudeProvider, AppMetricaProvider, CleverTapProvider,
    GoogleAnalyticsProvider,
};

/// Symbolic identity of an analytics vendor.
///
/// Every adapter carries its identity from construction
/// ([`ProviderAdapter::identity`]); the kit never inspects concrete types.
/// Custom adapters carry a caller-chosen name and compare by that name, so
/// two custom adapters registered under the same name are indistinguishable
/// to [`update_settings`](crate::service::AnalyticsKit::update_settings) —
/// the same rule that applies to duplicate built-in registrations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProviderIdentity {
    Adjust,
    Amplitude,
    CleverTap,
    GoogleAnalytics,
    AppMetrica,
    Custom(Arc<str>),
}

impl ProviderIdentity {
    pub fn custom(name: impl Into<Arc<str>>) -> Self {
        ProviderIdentity::Custom(name.into())
    }

    pub fn label(&self) -> &str {
        match self {
            ProviderIdentity::Adjust => "adjust",
            ProviderIdentity::Amplitude => "amplitude",
            ProviderIdentity::CleverTap => "clevertap",
            ProviderIdentity::GoogleAnalytics => "google-analytics",
            ProviderIdentity::AppMetrica => "appmetrica",
            ProviderIdentity::Custom(name) => name,
        }
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registration selector handed to [`AnalyticsKit::register`].
///
/// The five built-in variants construct a fresh adapter on every
/// registration; registering the same variant twice yields two independent
/// adapter instances, both of which participate in fan-out. `Custom` wraps a
/// caller-supplied adapter for vendors outside the built-in set.
///
/// [`AnalyticsKit::register`]: crate::service::AnalyticsKit::register
#[derive(Clone)]
pub enum Provider {
    Adjust,
    Amplitude,
    CleverTap,
    GoogleAnalytics,
    AppMetrica,
    Custom(Arc<dyn ProviderAdapter>),
}

impl Provider {
    pub(crate) fn instantiate(&self) -> Arc<dyn ProviderAdapter> {
        match self {
            Provider::Adjust => Arc::new(AdjustProvider::new()),
            Provider::Amplitude => Arc::new(AmplitudeProvider::new()),
            Provider::CleverTap => Arc::new(CleverTapProvider::new()),
            Provider::GoogleAnalytics => Arc::new(GoogleAnalyticsProvider::new()),
            Provider::AppMetrica => Arc::new(AppMetricaProvider::new()),
            Provider::Custom(adapter) => Arc::clone(adapter),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Adjust => f.write_str("Provider::Adjust"),
            Provider::Amplitude => f.write_str("Provider::Amplitude"),
            Provider::CleverTap => f.write_str("Provider::CleverTap"),
            Provider::GoogleAnalytics => f.write_str("Provider::GoogleAnalytics"),
            Provider::AppMetrica => f.write_str("Provider::AppMetrica"),
            Provider::Custom(adapter) => f
                .debug_tuple("Provider::Custom")
                .field(&adapter.identity())
                .finish(),
        }
    }
}
