use crate::provider::identity::ProviderIdentity;

/// Vendor-shaped revenue payload.
///
/// Revenue tracking has no common shape across vendors, so the caller builds
/// the variant for the vendor it targets. The payload fans out to every
/// adapter; each adapter acts only on its own variant and ignores the rest.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderRevenue {
    Adjust {
        event_token: String,
        amount: f64,
        currency: String,
        transaction_id: Option<String>,
    },
    Amplitude {
        product_id: Option<String>,
        price: f64,
        quantity: u32,
        revenue_type: Option<String>,
    },
    AppMetrica {
        amount: f64,
        currency: String,
        product_id: Option<String>,
    },
}

impl ProviderRevenue {
    /// Vendor this payload is shaped for.
    pub fn target(&self) -> ProviderIdentity {
        match self {
            ProviderRevenue::Adjust { .. } => ProviderIdentity::Adjust,
            ProviderRevenue::Amplitude { .. } => ProviderIdentity::Amplitude,
            ProviderRevenue::AppMetrica { .. } => ProviderIdentity::AppMetrica,
        }
    }
}
