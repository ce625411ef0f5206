// Mobile-money payments (M-PESA Daraja STK push)

pub mod daraja;
pub mod password;

pub use daraja::*;
pub use password::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::AppResult;

/// Result code the gateway returns when it accepted the push request
pub const ACCEPTED_RESPONSE_CODE: &str = "0";

/// What the gateway said about a push request it received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub accepted: bool,
    pub response_code: Option<String>,
    pub checkout_request_id: Option<String>,
    pub description: Option<String>,
}

impl PaymentOutcome {
    pub fn from_response(response: &StkPushResponse) -> Self {
        Self {
            accepted: response.response_code.as_deref() == Some(ACCEPTED_RESPONSE_CODE),
            response_code: response.response_code.clone(),
            checkout_request_id: response.checkout_request_id.clone(),
            description: response.response_description.clone(),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_payment_at(&self, phone_number: &str, now: DateTime<Utc>) -> AppResult<PaymentOutcome>;

    async fn initiate_payment(&self, phone_number: &str) -> AppResult<PaymentOutcome> {
        self.initiate_payment_at(phone_number, Utc::now()).await
    }
}

/// Keep only the last three digits of a phone number for logging
pub fn mask_phone(phone_number: &str) -> String {
    let chars: Vec<char> = phone_number.chars().collect();
    let visible = chars.len().min(3);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}
