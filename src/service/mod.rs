mod api;

pub use api::AnalyticsKit;
