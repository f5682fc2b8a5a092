//! Payment Gate
//!
//! Flips a session's entitlement only after the provider confirms payment.
//!
//! ```text
//! begin_checkout ──▶ pending {checkout_id, nonce} ──▶ Stripe hosted page
//!                                                        │
//!   /checkout/success?session_id=..&nonce=.. ◀───────────┘
//!        │ id + nonce match pending?   (else 403, no change)
//!        │ provider says paid?         (else stay pending)
//!        ▼
//!   entitled = true, pending cleared, token rotated
//! ```

use std::sync::Arc;

use chrono::Utc;
use snapvisa_core::{
    AntiForgeryToken, CoreError, PendingCheckout, Result, SessionId, SessionState, SessionStore,
};

use crate::checkout::{CheckoutProvider, CheckoutRequest, PriceConfig};

/// Where the provider sends the customer back to
#[derive(Clone, Debug)]
pub struct CheckoutUrls {
    base_url: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Success URL; Stripe substitutes `{CHECKOUT_SESSION_ID}` itself.
    pub fn success_url(&self, nonce: &AntiForgeryToken) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}&nonce={}",
            self.base_url,
            nonce.as_str()
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.base_url)
    }
}

/// A started checkout, ready for redirect
#[derive(Clone, Debug)]
pub struct CheckoutStarted {
    pub checkout_id: String,
    pub checkout_url: String,
    /// Rotated anti-forgery token for the client's next request
    pub csrf_token: String,
}

/// What a success callback achieved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Payment verified; entitlement granted now
    Entitled,

    /// Entitlement was already granted (e.g. by the webhook)
    AlreadyEntitled,

    /// Provider has not seen the payment complete yet
    AwaitingPayment,
}

fn ready_for_checkout(session: &SessionState, presented_token: Option<&str>) -> Result<()> {
    session.verify_token(presented_token)?;
    if !session.has_image() {
        return Err(CoreError::State("Upload a photo before paying.".into()));
    }
    Ok(())
}

/// Checkout initiation and confirmation for one price
pub struct PaymentGate {
    provider: Arc<dyn CheckoutProvider>,
    price: PriceConfig,
    urls: CheckoutUrls,
}

impl PaymentGate {
    pub fn new(provider: Arc<dyn CheckoutProvider>, price: PriceConfig, urls: CheckoutUrls) -> Self {
        Self {
            provider,
            price,
            urls,
        }
    }

    pub const fn price(&self) -> &PriceConfig {
        &self.price
    }

    /// Start a hosted checkout for the session's staged photo.
    ///
    /// The token and staged photo are checked before the provider is called
    /// and again when the pending checkout is committed. Only the pending
    /// checkout and the token change, and only once a redirect URL exists.
    pub async fn begin_checkout<S: SessionStore>(
        &self,
        sessions: &S,
        id: &SessionId,
        presented_token: Option<&str>,
    ) -> Result<CheckoutStarted> {
        let Some(session) = sessions.load(id)? else {
            return Err(CoreError::Permission(
                "Your session has expired. Reload the page and try again.".into(),
            ));
        };
        ready_for_checkout(&session, presented_token)?;

        let nonce = AntiForgeryToken::generate();
        let request = CheckoutRequest {
            price: self.price.clone(),
            client_reference: id.to_string(),
            success_url: self.urls.success_url(&nonce),
            cancel_url: self.urls.cancel_url(),
        };

        let checkout = self
            .provider
            .create_checkout_session(&request)
            .await
            .map_err(|e| {
                tracing::error!(session = %id, error = %e, "Checkout creation failed");
                CoreError::from(e)
            })?;

        let pending = PendingCheckout {
            checkout_id: checkout.id.clone(),
            nonce,
            started_at: Utc::now(),
        };
        let csrf_token = sessions
            .update(id, |session| {
                ready_for_checkout(session, presented_token)?;
                session.pending_checkout = Some(pending);
                Ok(session.rotate_token().as_str().to_string())
            })
            .map_err(|e| {
                tracing::warn!(
                    session = %id,
                    checkout_id = %checkout.id,
                    error = %e,
                    "Session changed while checkout was created; checkout abandoned"
                );
                e
            })?;

        tracing::info!(
            session = %id,
            checkout_id = %checkout.id,
            amount = self.price.unit_amount,
            currency = self.price.currency.code(),
            "Checkout started"
        );

        Ok(CheckoutStarted {
            checkout_id: checkout.id,
            checkout_url: checkout.checkout_url,
            csrf_token,
        })
    }

    /// Handle the provider's success redirect.
    ///
    /// The checkout id and nonce must match the pending checkout, and the
    /// provider must report the session as paid.
    pub async fn complete_checkout<S: SessionStore>(
        &self,
        sessions: &S,
        id: &SessionId,
        checkout_id: &str,
        nonce: &str,
    ) -> Result<CheckoutOutcome> {
        let session = sessions.load(id)?;
        let entitled = session.as_ref().is_some_and(|s| s.entitled);

        let Some(pending) = session.as_ref().and_then(|s| s.pending_checkout.as_ref()) else {
            if entitled {
                return Ok(CheckoutOutcome::AlreadyEntitled);
            }
            return Err(CoreError::Permission(
                "No checkout is in progress for this session.".into(),
            ));
        };

        if pending.checkout_id != checkout_id || !pending.nonce.matches(nonce) {
            tracing::warn!(
                session = %id,
                checkout_id,
                "Checkout confirmation did not match pending checkout"
            );
            return Err(CoreError::Permission(
                "Checkout confirmation did not match this session.".into(),
            ));
        }

        let status = self.provider.payment_status(checkout_id).await.map_err(|e| {
            tracing::error!(session = %id, checkout_id, error = %e, "Payment status lookup failed");
            CoreError::from(e)
        })?;

        if !status.is_paid() {
            tracing::info!(session = %id, checkout_id, status = ?status, "Checkout not paid yet");
            return Ok(CheckoutOutcome::AwaitingPayment);
        }

        sessions.update(id, |session| {
            let outcome = if session.entitled {
                CheckoutOutcome::AlreadyEntitled
            } else {
                CheckoutOutcome::Entitled
            };
            session.grant_entitlement();
            if session
                .pending_checkout
                .as_ref()
                .is_some_and(|pending| pending.checkout_id == checkout_id)
            {
                session.pending_checkout = None;
            }
            session.rotate_token();
            Ok(outcome)
        })
    }

    /// Handle the provider's cancel redirect. Session state is left as is.
    pub fn cancel_checkout(&self, session: &SessionState) {
        tracing::info!(
            session = %session.id,
            pending = session.pending_checkout.is_some(),
            "Checkout cancelled by customer"
        );
    }
}
