//! Application layer containing the payment pipeline orchestration.
//!
//! `PaymentService` is the creation entry point, `PaymentProcessor` applies the
//! terminal transition, and `DeliveryAdapter` with `Worker` turns channel
//! deliveries into processor calls and acknowledgements. `PaymentPipeline`
//! wires them into a running process.

pub mod delivery;
pub mod pipeline;
pub mod processor;
pub mod service;
pub mod worker;
