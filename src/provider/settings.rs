use std::fmt;

use crate::logger::LogLevel;
use crate::provider::adapter::PushTokenCallback;
use crate::provider::identity::ProviderIdentity;

/// Environment the vendor posts data to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration applied to one or all adapters.
///
/// The generic variants route to the matching adapter setter (a no-op on
/// adapters that ignore the field). The vendor bundles are validated against
/// the adapter's identity: a bundle applied to an adapter of a different
/// vendor logs one diagnostic and is dropped. Application is idempotent —
/// every setter is a plain field assignment.
#[derive(Clone)]
pub enum ProviderSettings {
    AccountId(String),
    AccountToken(String),
    Environment(Environment),
    DeviceToken(Vec<u8>),
    NetworkInfoReporting(bool),
    PushTokenCallback(PushTokenCallback),
    LogLevel(LogLevel),
    /// Adjust-only bundle: account token and posting environment.
    Adjust {
        account_token: Option<String>,
        environment: Option<Environment>,
    },
    /// Amplitude-only bundle: account token and the standard
    /// session-start/session-end tracking flag.
    Amplitude {
        account_token: Option<String>,
        track_session_events: Option<bool>,
    },
    /// CleverTap-only bundle: credentials, GDPR network-info reporting, and
    /// the device push token.
    CleverTap {
        account_id: Option<String>,
        account_token: Option<String>,
        network_info_reporting: Option<bool>,
        device_token: Option<Vec<u8>>,
    },
    /// Google Analytics (Firebase)-only bundle: push-token callback and the
    /// device push token.
    GoogleAnalytics {
        push_token_callback: Option<PushTokenCallback>,
        device_token: Option<Vec<u8>>,
    },
}

impl ProviderSettings {
    /// Vendor a bundle is restricted to; `None` for the generic variants.
    pub fn target(&self) -> Option<ProviderIdentity> {
        match self {
            ProviderSettings::Adjust { .. } => Some(ProviderIdentity::Adjust),
            ProviderSettings::Amplitude { .. } => Some(ProviderIdentity::Amplitude),
            ProviderSettings::CleverTap { .. } => Some(ProviderIdentity::CleverTap),
            ProviderSettings::GoogleAnalytics { .. } => Some(ProviderIdentity::GoogleAnalytics),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderSettings::AccountId(_) => "account-id",
            ProviderSettings::AccountToken(_) => "account-token",
            ProviderSettings::Environment(_) => "environment",
            ProviderSettings::DeviceToken(_) => "device-token",
            ProviderSettings::NetworkInfoReporting(_) => "network-info-reporting",
            ProviderSettings::PushTokenCallback(_) => "push-token-callback",
            ProviderSettings::LogLevel(_) => "log-level",
            ProviderSettings::Adjust { .. } => "adjust-settings",
            ProviderSettings::Amplitude { .. } => "amplitude-settings",
            ProviderSettings::CleverTap { .. } => "clevertap-settings",
            ProviderSettings::GoogleAnalytics { .. } => "google-analytics-settings",
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderSettings::{}", self.kind())
    }
}
