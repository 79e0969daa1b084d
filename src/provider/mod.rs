mod adapter;
pub mod adapters;
mod identity;
mod revenue;
mod settings;
pub mod transport;

pub use adapter::{Capability, ProviderAdapter, PushTokenCallback};
pub use identity::{Provider, ProviderIdentity};
pub use revenue::ProviderRevenue;
pub use settings::{Environment, ProviderSettings};
