use crate::application::service::CreatePaymentRequest;
use crate::error::{PaymentError, Result};
use std::io::Read;

/// Reads payment creation requests from a CSV source.
///
/// Expects an `amount,currency,reference` header. Fields are trimmed, except
/// that an all-blank reference is still handed to the service, which rejects it.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<CreatePaymentRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
