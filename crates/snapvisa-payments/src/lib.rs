//! # snapvisa-payments
//!
//! One-time payment gate for a processed photo, using Stripe Checkout (Hosted).
//!
//! **Flow:** staged photo → redirect to Stripe's hosted page → redirect back
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────────┐
//! │  snapvisa   │────▶│  Stripe Hosted  │────▶│  /checkout/success   │
//! │  (preview)  │     │  Checkout Page  │     │  verify → entitled   │
//! └─────────────┘     └─────────────────┘     └──────────────────────┘
//!                              │
//!                              └── checkout.session.completed ──▶ /webhook/stripe
//! ```
//!
//! Entitlement is never taken from a client-supplied flag. The success
//! redirect is checked against the pending checkout's nonce and then
//! confirmed with Stripe; the webhook is checked by signature.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use snapvisa_payments::{CheckoutUrls, PaymentGate, PriceConfig, StripeClient};
//!
//! let stripe = Arc::new(StripeClient::new("sk_test_xxx", "whsec_xxx"));
//! let gate = PaymentGate::new(stripe, PriceConfig::bls_photo(), CheckoutUrls::new("https://snapvisa.ca"));
//!
//! let started = gate.begin_checkout(&sessions, &session_id, Some(&csrf_token)).await?;
//! // Redirect user to: started.checkout_url
//! ```

mod checkout;
mod error;
mod gate;
mod webhook;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use checkout::{
    CheckoutProvider, CheckoutRequest, CheckoutSession, PaymentStatus, PriceConfig, PriceCurrency,
    StripeClient,
};
pub use error::{PaymentError, Result};
pub use gate::{CheckoutOutcome, CheckoutStarted, CheckoutUrls, PaymentGate};
pub use webhook::{WebhookEvent, WebhookHandler};
