use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::services::payment_ledger::LedgerUpdate;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn validate_mpin(mpin: &str) -> Result<(), ValidationError> {
    if mpin.len() == 4 && mpin.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(());
    }
    Err(ValidationError::new("mpin_must_be_4_digits"))
}

fn default_rent() -> f64 {
    0.0
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterOwnerInput {
    #[validate(length(min = 1, max = 255))]
    pub owner_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 15))]
    pub mobile: String,
    /// Opaque hash produced by the credential service.
    #[validate(length(min = 1))]
    pub password_hash: String,
    /// Plain MPIN, checked for shape only; the hash is what gets stored.
    #[validate(custom(function = "validate_mpin"))]
    pub mpin: Option<String>,
    pub mpin_hash: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub property_name: String,
    pub property_address: Option<String>,
    #[validate(range(min = 0.0))]
    pub monthly_rent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenBillingOrderInput {
    #[validate(length(min = 1, max = 128))]
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentSuccessInput {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub payment_id: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub address: Option<String>,
    pub mobile: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default = "default_rent")]
    #[validate(range(min = 0.0))]
    pub monthly_rent: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EnrollCandidateInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub gender: Option<String>,
    #[validate(range(min = 0, max = 150))]
    pub age: Option<i32>,
    pub dob: Option<NaiveDate>,
    pub mobile: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub room_no: Option<String>,
    pub aadhaar: Option<String>,
    pub guardian_mobile: Option<String>,
    pub address: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCandidateInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub gender: Option<String>,
    #[validate(range(min = 0, max = 150))]
    pub age: Option<i32>,
    pub dob: Option<NaiveDate>,
    pub mobile: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub room_no: Option<String>,
    pub aadhaar: Option<String>,
    pub guardian_mobile: Option<String>,
    pub address: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VacateInput {
    pub vacate_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveQuery {
    pub property_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentHistoryQuery {
    pub property_id: Option<Uuid>,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentUpdateInput {
    pub candidate_id: Uuid,
    pub property_id: Option<Uuid>,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    pub year: i32,
    pub room_no: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub advance: Option<f64>,
    pub amount_paid: Option<f64>,
    pub balance: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub transaction_id: Option<String>,
    pub receipt_id: Option<String>,
}

impl PaymentUpdateInput {
    pub fn changes(&self) -> LedgerUpdate {
        LedgerUpdate {
            room_no: self.room_no.clone(),
            payment_method: self.payment_method.clone(),
            status: self.status.clone(),
            advance: self.advance,
            amount_paid: self.amount_paid,
            balance: self.balance,
            payment_date: self.payment_date,
            transaction_id: self.transaction_id.clone(),
            receipt_id: self.receipt_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendReceiptInput {
    pub candidate_id: Uuid,
    pub property_id: Uuid,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    pub year: i32,
}
