//! Analytics facade for mobile-style applications.
//!
//! One event, dispatched once, fans out to every registered analytics
//! vendor. Callers describe events, screen modules, and parameter keys
//! through the [`contracts`] traits; the [`service::AnalyticsKit`] engine
//! renders per-vendor names and forwards the calls to the registered
//! [`provider`] adapters. Built-in adapters cover Adjust, Amplitude,
//! CleverTap, Google Analytics (Firebase), and AppMetrica; anything else
//! plugs in through [`provider::ProviderAdapter`].
//!
//! ```no_run
//! use analytics_kit::provider::{Provider, ProviderIdentity, ProviderSettings};
//! use analytics_kit::service::AnalyticsKit;
//!
//! struct PurchaseCompleted;
//!
//! impl analytics_kit::contracts::AnalyticsEvent for PurchaseCompleted {
//!     fn name(&self, _provider: &ProviderIdentity) -> String {
//!         "PurchaseCompleted".into()
//!     }
//! }
//!
//! # async fn run() {
//! let kit = AnalyticsKit::new();
//! kit.register_with_settings(
//!     Provider::Amplitude,
//!     &[ProviderSettings::AccountToken("api-key".into())],
//! )
//! .await;
//! kit.send_event(&PurchaseCompleted).await;
//! # }
//! ```

pub mod contracts;
pub mod error;
pub mod logger;
pub mod provider;
pub mod service;

pub use contracts::{AnalyticsEvent, AnalyticsModule, AnalyticsParam};
pub use service::AnalyticsKit;
