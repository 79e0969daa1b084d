use std::collections::BTreeMap;

use serde_json::Value;

use crate::provider::ProviderIdentity;

/// A caller-defined analytics event.
///
/// The event name is appended to the module name when a module is supplied.
/// With a module rendering `"AuthScreen"` and an event rendering `"Appear"`,
/// the dispatched name is exactly `"AuthScreenAppear"` (plain concatenation,
/// no separator).
pub trait AnalyticsEvent {
    /// Provider-specific fragment of the event name.
    fn name(&self, provider: &ProviderIdentity) -> String;

    /// Decides whether this event should reach the given provider. Return
    /// `true` when no special routing is required. A `false` result skips
    /// that one provider only; the event is still dispatched to the rest.
    fn allows(
        &self,
        _module: Option<&dyn AnalyticsModule>,
        _provider: &ProviderIdentity,
    ) -> bool {
        true
    }
}

/// A caller-defined screen module whose name prefixes event names.
pub trait AnalyticsModule {
    /// Provider-specific fragment of the event name (the screen name).
    fn name(&self, provider: &ProviderIdentity) -> String;
}

/// A caller-defined event parameter key, rendered per provider.
pub trait AnalyticsParam: Eq + std::hash::Hash {
    fn name(&self, provider: &ProviderIdentity) -> String;
}

/// Geographic coordinate attached to a user profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Identity fields forwarded to the vendors' user-profile APIs. Adapters
/// forward only the fields their vendor supports; an unsupported field is a
/// silent no-op, never an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserProfile {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Coordinate>,
}

impl UserProfile {
    pub fn with_user_id(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// A tapped push notification as handed to the kit by the host application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotificationResponse {
    /// Identifier of the action the user selected.
    pub action_id: String,
    /// Raw notification payload.
    pub payload: BTreeMap<String, Value>,
}

/// Signal forwarded to vendors with a crash-reporting channel.
#[derive(Clone, Debug, PartialEq)]
pub enum CrashReport {
    /// A captured error, rendered to its display form.
    Error(String),
    /// A free-form breadcrumb message.
    Message(String),
}

impl CrashReport {
    pub fn description(&self) -> &str {
        match self {
            CrashReport::Error(text) | CrashReport::Message(text) => text,
        }
    }
}
