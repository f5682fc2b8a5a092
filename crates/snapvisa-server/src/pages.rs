//! Checkout Landing Pages
//!
//! Stripe redirects the browser here, so these render HTML instead of JSON.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use snapvisa_core::CoreError;
use snapvisa_payments::CheckoutOutcome;

use crate::error::status_of;

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    let html = format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} · SnapVisa</title></head>
<body>
<main>
<h1>{title}</h1>
<p>{message}</p>
<p><a href="/">Back to your photo</a></p>
</main>
</body>
</html>"#,
        title = snapvisa_feedback::escape_markup(title),
        message = snapvisa_feedback::escape_markup(message),
    );
    (status, Html(html)).into_response()
}

pub fn checkout_result(outcome: CheckoutOutcome) -> Response {
    match outcome {
        CheckoutOutcome::Entitled | CheckoutOutcome::AlreadyEntitled => page(
            StatusCode::OK,
            "Payment successful",
            "You can now download your resized passport photo.",
        ),
        CheckoutOutcome::AwaitingPayment => page(
            StatusCode::OK,
            "Payment processing",
            "Your payment has not been confirmed yet. Refresh this page in a moment.",
        ),
    }
}

pub fn checkout_failed(err: &CoreError) -> Response {
    page(status_of(err), "Payment not confirmed", &err.user_message())
}

pub fn checkout_cancelled() -> Response {
    page(
        StatusCode::OK,
        "Payment cancelled",
        "No payment was taken. Your photo is still ready when you are.",
    )
}

pub fn payments_unavailable() -> Response {
    page(
        StatusCode::SERVICE_UNAVAILABLE,
        "Payments unavailable",
        "Online payment is not configured on this server.",
    )
}
