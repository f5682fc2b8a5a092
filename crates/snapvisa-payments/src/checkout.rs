//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: a one-time payment
//! for a single processed photo.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionPaymentStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    Currency,
};

use crate::error::{PaymentError, Result};

/// Hosted checkout provider
///
/// Implemented by [`StripeClient`]; the gate only ever talks to this trait.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a hosted checkout session and return its redirect URL.
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Ask the provider whether a checkout session has been paid.
    async fn payment_status(&self, checkout_id: &str) -> Result<PaymentStatus>;
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let price = &request.price;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(request.success_url.as_str());
        params.cancel_url = Some(request.cancel_url.as_str());
        params.client_reference_id = Some(request.client_reference.as_str());
        params.mode = Some(CheckoutSessionMode::Payment);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("product".to_string(), price.product_name.clone());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: price.currency.stripe(),
                unit_amount: Some(price.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: price.product_name.clone(),
                    description: Some(price.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn payment_status(&self, checkout_id: &str) -> Result<PaymentStatus> {
        let id: CheckoutSessionId = checkout_id
            .parse()
            .map_err(|_| PaymentError::Stripe(format!("Malformed checkout session id: {checkout_id}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(PaymentStatus::from(session.payment_status))
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// What is being sold, and for how much
    pub price: PriceConfig,

    /// Our session ID, echoed back in webhooks
    pub client_reference: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,
}

/// Payment state of a checkout session, as reported by the provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl From<CheckoutSessionPaymentStatus> for PaymentStatus {
    #[allow(unreachable_patterns)]
    fn from(status: CheckoutSessionPaymentStatus) -> Self {
        match status {
            CheckoutSessionPaymentStatus::Paid => Self::Paid,
            CheckoutSessionPaymentStatus::NoPaymentRequired => Self::NoPaymentRequired,
            _ => Self::Unpaid,
        }
    }
}

/// Supported charge currencies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceCurrency {
    Cad,
    Usd,
}

impl PriceCurrency {
    const fn stripe(self) -> Currency {
        match self {
            Self::Cad => Currency::CAD,
            Self::Usd => Currency::USD,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Cad => "CAD",
            Self::Usd => "USD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "cad" => Some(Self::Cad),
            "usd" => Some(Self::Usd),
            _ => None,
        }
    }
}

/// Pricing information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub product_name: String,
    pub description: String,
    /// Minor units (cents)
    pub unit_amount: i64,
    pub currency: PriceCurrency,
}

impl PriceConfig {
    /// One 600x600 BLS photo, $2.99 CAD
    pub fn bls_photo() -> Self {
        Self {
            product_name: "BLS Photo 600x600".into(),
            description: "Passport photo resized to BLS Canada specs".into(),
            unit_amount: 299,
            currency: PriceCurrency::Cad,
        }
    }

    /// Default price with `PRICE_CENTS` / `PRICE_CURRENCY` overrides
    pub fn from_env() -> Result<Self> {
        let mut price = Self::bls_photo();

        if let Ok(cents) = std::env::var("PRICE_CENTS") {
            price.unit_amount = cents
                .parse()
                .ok()
                .filter(|c: &i64| *c > 0)
                .ok_or_else(|| PaymentError::Config(format!("PRICE_CENTS '{cents}' is invalid")))?;
        }
        if let Ok(code) = std::env::var("PRICE_CURRENCY") {
            price.currency = PriceCurrency::from_code(&code)
                .ok_or_else(|| PaymentError::Config(format!("Unsupported currency '{code}'")))?;
        }

        Ok(price)
    }

    /// e.g. `$2.99 CAD`
    pub fn display(&self) -> String {
        format!(
            "${}.{:02} {}",
            self.unit_amount / 100,
            self.unit_amount % 100,
            self.currency.code()
        )
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self::bls_photo()
    }
}
