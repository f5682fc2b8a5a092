//! Application State

use std::sync::Arc;

use snapvisa_core::MemorySessionStore;
use snapvisa_feedback::FeedbackSink;
use snapvisa_payments::{CheckoutProvider, CheckoutUrls, PaymentGate, PriceConfig};
use snapvisa_pipeline::PhotoSpec;

use crate::config::ServerConfig;
use crate::session::SessionCookies;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Output rules for processed photos
    pub photo_spec: Arc<PhotoSpec>,

    pub sessions: Arc<MemorySessionStore>,

    pub cookies: Arc<SessionCookies>,

    /// Payment gate (optional - None if Stripe is not configured)
    pub gate: Option<Arc<PaymentGate>>,

    /// Stripe webhook signing secret
    pub webhook_secret: Option<Arc<str>>,

    /// Where feedback ends up
    pub feedback: Arc<dyn FeedbackSink>,

    /// Shown before payment even when checkout is unavailable
    pub price: PriceConfig,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        photo_spec: PhotoSpec,
        cookies: SessionCookies,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
        Self {
            config: Arc::new(config),
            photo_spec: Arc::new(photo_spec),
            sessions,
            cookies: Arc::new(cookies),
            gate: None,
            webhook_secret: None,
            feedback,
            price: PriceConfig::default(),
        }
    }

    /// Enable checkout through `provider`.
    pub fn with_payments(
        mut self,
        provider: Arc<dyn CheckoutProvider>,
        price: PriceConfig,
        webhook_secret: Option<String>,
    ) -> Self {
        let urls = CheckoutUrls::new(&self.config.public_base_url);
        self.gate = Some(Arc::new(PaymentGate::new(provider, price.clone(), urls)));
        self.webhook_secret = webhook_secret.map(Arc::from);
        self.price = price;
        self
    }
}
