mod adjust;
mod amplitude;
mod app_metrica;
mod clever_tap;
mod google_analytics;

pub use adjust::{AdjustConfig, AdjustEvent, AdjustGateway, AdjustProvider};
pub use amplitude::{AmplitudeGateway, AmplitudeProvider};
pub use app_metrica::{AppMetricaGateway, AppMetricaProvider};
pub use clever_tap::{CleverTapGateway, CleverTapProvider};
pub use google_analytics::{GoogleAnalyticsGateway, GoogleAnalyticsProvider};
