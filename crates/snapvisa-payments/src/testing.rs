//! In-memory checkout provider for tests
//!
//! Enabled in downstream crates with the `test-util` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::checkout::{CheckoutProvider, CheckoutRequest, CheckoutSession, PaymentStatus};
use crate::error::{PaymentError, Result};

/// Records checkout requests; sessions count as paid once [`mark_paid`](Self::mark_paid) is called.
#[derive(Default)]
pub struct FakeCheckoutProvider {
    requests: Mutex<Vec<CheckoutRequest>>,
    paid: Mutex<HashSet<String>>,
    failing: AtomicBool,
    created: AtomicUsize,
    latency: Mutex<Duration>,
}

impl FakeCheckoutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the provider were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call, leaving room for other requests to interleave.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("fake provider lock") = latency;
    }

    pub fn mark_paid(&self, checkout_id: &str) {
        self.paid
            .lock()
            .expect("fake provider lock")
            .insert(checkout_id.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("fake provider lock").len()
    }

    pub fn last_request(&self) -> Option<CheckoutRequest> {
        self.requests.lock().expect("fake provider lock").last().cloned()
    }

    /// Pull the `nonce` query value out of a success URL.
    pub fn nonce_from_success_url(url: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("nonce="))
            .map(str::to_string)
    }

    async fn check_up(&self) -> Result<()> {
        let latency = *self.latency.lock().expect("fake provider lock");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Stripe("simulated provider outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutProvider for FakeCheckoutProvider {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        self.check_up().await?;

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{n}");
        self.requests
            .lock()
            .expect("fake provider lock")
            .push(request.clone());

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.stripe.test/pay/{id}"),
            id,
        })
    }

    async fn payment_status(&self, checkout_id: &str) -> Result<PaymentStatus> {
        self.check_up().await?;

        let paid = self.paid.lock().expect("fake provider lock").contains(checkout_id);
        Ok(if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        })
    }
}
