//! CSV boundary adapters: creation requests in, payment views out.

pub mod payment_writer;
pub mod request_reader;
