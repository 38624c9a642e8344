use crate::error::ChannelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// "Process this payment", as carried on the trigger channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerNotice {
    pub payment_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl TriggerNotice {
    pub fn new(payment_id: Uuid) -> Self {
        Self {
            payment_id,
            timestamp: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(ChannelError::Encode)
    }

    pub fn decode(body: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(body).map_err(ChannelError::Decode)
    }
}
