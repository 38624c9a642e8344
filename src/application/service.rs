use crate::domain::notice::TriggerNotice;
use crate::domain::payment::{Amount, Currency, Payment, PaymentView};
use crate::domain::ports::{PaymentStoreRef, TriggerPublisherRef};
use crate::error::{PaymentError, Result, StoreError};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// A request to create a payment, as received at the boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub reference: String,
}

impl CreatePaymentRequest {
    pub fn new(amount: Decimal, currency: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            reference: reference.into(),
        }
    }
}

/// Creates and looks up payments.
///
/// Creation persists the record first and only then publishes a trigger notice,
/// so the store stays the source of truth whatever happens to the channel.
pub struct PaymentService {
    store: PaymentStoreRef,
    publisher: TriggerPublisherRef,
}

impl PaymentService {
    pub fn new(store: PaymentStoreRef, publisher: TriggerPublisherRef) -> Self {
        Self { store, publisher }
    }

    /// Validates, deduplicates, persists and queues a new payment.
    ///
    /// Validation stops at the first failure, in the order amount, currency,
    /// reference. When the record is written but the notice cannot be published
    /// the error is [`PaymentError::CreatedButNotQueued`] and the `PENDING`
    /// record is kept.
    pub async fn create_payment(&self, request: CreatePaymentRequest) -> Result<PaymentView> {
        let amount = Amount::new(request.amount)?;
        let currency: Currency = request.currency.parse()?;
        let reference = request.reference.trim();
        if reference.is_empty() {
            return Err(PaymentError::InvalidReference);
        }

        if self
            .store
            .reference_exists(reference)
            .await
            .map_err(PaymentError::StorageUnavailable)?
        {
            return Err(PaymentError::ReferenceConflict(reference.to_string()));
        }

        let payment = self
            .store
            .create(Payment::new(amount, currency, reference))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateReference(reference) => {
                    PaymentError::ReferenceConflict(reference)
                }
                other => PaymentError::StorageUnavailable(other),
            })?;
        let view = payment.view();

        if let Err(source) = self.publisher.publish(&TriggerNotice::new(payment.id)).await {
            warn!(payment_id = %payment.id, error = %source, "payment created but not queued");
            return Err(PaymentError::CreatedButNotQueued {
                payment: Box::new(view),
                source,
            });
        }

        info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment created"
        );
        Ok(view)
    }

    pub async fn get_payment(&self, id: Uuid) -> Result<PaymentView> {
        match self.store.get_by_id(id).await {
            Ok(payment) => Ok(payment.view()),
            Err(StoreError::NotFound(id)) => Err(PaymentError::NotFound(id)),
            Err(e) => Err(PaymentError::StorageUnavailable(e)),
        }
    }
}
