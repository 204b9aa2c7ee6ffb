//! Metric instrument factories for repair-queue.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"repair-queue"` meter.
//! Without a registered provider they are no-ops.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for repair-queue instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("repair-queue")
}

/// Counter: customers checked in.
pub fn customers_checked_in() -> Counter<u64> {
    meter()
        .u64_counter("queue.customers.checked_in")
        .with_description("Number of customers checked in")
        .build()
}

/// Counter: customer calls.
/// Labels: `recall` (true when the customer had been called before).
pub fn customers_called() -> Counter<u64> {
    meter()
        .u64_counter("queue.customers.called")
        .with_description("Number of times a customer was called")
        .build()
}

/// Counter: store mutations that changed state.
/// Labels: `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("queue.operations")
        .with_description("Number of queue store mutations")
        .build()
}

/// Counter: slot reads, parses, or writes that failed and were swallowed.
/// Labels: `slot`, `stage` ("read" | "parse" | "serialize" | "write").
pub fn persistence_failures() -> Counter<u64> {
    meter()
        .u64_counter("queue.persistence.failures")
        .with_description("Number of swallowed slot persistence failures")
        .build()
}
