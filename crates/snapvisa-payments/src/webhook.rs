//! Stripe Webhook Handling
//!
//! Grants entitlement from signed `checkout.session.*` events, so a customer
//! who closes the tab before the success redirect still gets their download.

use std::sync::Arc;

use snapvisa_core::{CoreError, SessionId, SessionStore};
use stripe::{CheckoutSessionPaymentStatus, Event, EventObject, EventType, Webhook};

use crate::error::{PaymentError, Result};

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout finished; `paid` is false for delayed payment methods
    CheckoutCompleted {
        checkout_id: String,
        client_reference: Option<String>,
        paid: bool,
    },

    /// A delayed payment for a completed checkout went through
    AsyncPaymentSucceeded {
        checkout_id: String,
        client_reference: Option<String>,
    },

    /// Customer abandoned the hosted page
    CheckoutExpired { checkout_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: SessionStore> {
    sessions: Arc<S>,
}

impl<S: SessionStore> WebhookHandler<S> {
    pub const fn new(sessions: Arc<S>) -> Self {
        Self { sessions }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified webhook event
    pub fn handle(&self, event: &Event) -> snapvisa_core::Result<WebhookEvent> {
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");

        let parsed = Self::parse_webhook_event(event)?;
        self.apply(&parsed)?;
        Ok(parsed)
    }

    /// Update session state for a parsed event.
    pub fn apply(&self, event: &WebhookEvent) -> snapvisa_core::Result<()> {
        match event {
            WebhookEvent::CheckoutCompleted {
                checkout_id,
                client_reference: Some(reference),
                paid: true,
            }
            | WebhookEvent::AsyncPaymentSucceeded {
                checkout_id,
                client_reference: Some(reference),
            } => self.grant(checkout_id, reference),

            WebhookEvent::CheckoutCompleted {
                checkout_id,
                paid: false,
                ..
            } => {
                tracing::info!(checkout_id = %checkout_id, "Checkout completed, payment pending");
                Ok(())
            }

            WebhookEvent::CheckoutCompleted { checkout_id, .. }
            | WebhookEvent::AsyncPaymentSucceeded { checkout_id, .. } => {
                tracing::warn!(checkout_id = %checkout_id, "Paid checkout has no client reference");
                Ok(())
            }

            WebhookEvent::CheckoutExpired { checkout_id } => {
                tracing::debug!(checkout_id = %checkout_id, "Checkout expired");
                Ok(())
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(())
            }
        }
    }

    fn grant(&self, checkout_id: &str, reference: &str) -> snapvisa_core::Result<()> {
        let id = SessionId::from_string(reference);
        let granted = self.sessions.update_live(&id, |session| {
            session.grant_entitlement();
            if session
                .pending_checkout
                .as_ref()
                .is_some_and(|pending| pending.checkout_id == checkout_id)
            {
                session.pending_checkout = None;
            }
            Ok(())
        })?;

        if granted.is_none() {
            tracing::warn!(
                checkout_id,
                session = %id,
                "Paid checkout for unknown or expired session"
            );
            return Ok(());
        }

        tracing::info!(checkout_id, session = %id, "Entitlement granted by webhook");
        Ok(())
    }

    /// Parse Stripe event into our event type
    fn parse_webhook_event(event: &Event) -> snapvisa_core::Result<WebhookEvent> {
        let session = match (&event.type_, &event.data.object) {
            (
                EventType::CheckoutSessionCompleted
                | EventType::CheckoutSessionAsyncPaymentSucceeded
                | EventType::CheckoutSessionExpired,
                EventObject::CheckoutSession(session),
            ) => session,
            (
                EventType::CheckoutSessionCompleted
                | EventType::CheckoutSessionAsyncPaymentSucceeded
                | EventType::CheckoutSessionExpired,
                _,
            ) => {
                return Err(CoreError::from(PaymentError::WebhookParse(
                    "Invalid checkout session data".into(),
                )));
            }
            (other, _) => {
                return Ok(WebhookEvent::Other {
                    event_type: format!("{other:?}"),
                });
            }
        };

        let checkout_id = session.id.to_string();
        let client_reference = session.client_reference_id.clone();

        Ok(match event.type_ {
            EventType::CheckoutSessionCompleted => WebhookEvent::CheckoutCompleted {
                checkout_id,
                client_reference,
                paid: matches!(session.payment_status, CheckoutSessionPaymentStatus::Paid),
            },
            EventType::CheckoutSessionAsyncPaymentSucceeded => WebhookEvent::AsyncPaymentSucceeded {
                checkout_id,
                client_reference,
            },
            _ => WebhookEvent::CheckoutExpired { checkout_id },
        })
    }
}
