//! Queue store span helpers.
//!
//! Provides span creation and status-transition recording for customer
//! records flowing through the store.

use tracing::Span;

use crate::model::{CustomerId, CustomerStatus};

/// Start a span for a store operation on one customer.
///
/// The `customer.status` field is declared empty and is filled in by
/// [`record_status_transition`].
pub fn start_store_span(operation: &str, customer_id: &CustomerId) -> Span {
    tracing::info_span!(
        "queue.store",
        "queue.operation" = operation,
        "customer.id" = %customer_id,
        "customer.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the given span.
pub fn record_status_transition(span: &Span, from: CustomerStatus, to: CustomerStatus) {
    span.record("customer.status", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(from = %from, to = %to, "status_transition");
    });
}
