//! Domain layer: the payment entity, the trigger notice and the ports the
//! application layer depends on.

pub mod notice;
pub mod payment;
pub mod ports;
