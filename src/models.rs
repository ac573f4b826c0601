//! Domain records shared by the store, the ledger engine and the HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room identifier stored when an enrollment or ledger write carries none.
pub const UNASSIGNED_ROOM: &str = "NA";

/// Plan name recorded for owners that have not subscribed yet.
pub const TRIAL_PLAN: &str = "TRIAL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub id: Uuid,
    pub owner_name: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub mpin_hash: Option<String>,
    pub trial_start_date: Option<NaiveDate>,
    pub trial_end_date: Option<NaiveDate>,
    pub trial_expired: bool,
    pub subscribed: bool,
    pub subscription_plan: Option<String>,
    pub subscription_start: Option<NaiveDate>,
    pub subscription_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    /// Reference only; ledger amounts are never checked against it.
    pub monthly_rent: f64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub dob: Option<NaiveDate>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub room_no: String,
    pub aadhaar: Option<String>,
    pub guardian_mobile: Option<String>,
    pub address: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub vacate_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a candidate taken right before the live row is removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletedCandidate {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub dob: Option<NaiveDate>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub room_no: String,
    pub aadhaar: Option<String>,
    pub guardian_mobile: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub vacate_date: Option<NaiveDate>,
    pub deleted_at: DateTime<Utc>,
}

impl DeletedCandidate {
    pub fn archive_of(candidate: &Candidate, deleted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id: candidate.id,
            property_id: candidate.property_id,
            name: candidate.name.clone(),
            gender: candidate.gender.clone(),
            age: candidate.age,
            dob: candidate.dob,
            mobile: candidate.mobile.clone(),
            email: candidate.email.clone(),
            room_no: candidate.room_no.clone(),
            aadhaar: candidate.aadhaar.clone(),
            guardian_mobile: candidate.guardian_mobile.clone(),
            joining_date: candidate.joining_date,
            vacate_date: candidate.vacate_date,
            deleted_at,
        }
    }
}

/// A gateway order opened by an owner. `payment_id` is set once, when the
/// gateway confirms the payment, and is unique across all orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingOrder {
    pub order_id: String,
    pub owner_id: Uuid,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Phonepay,
    Gpay,
    Paytm,
    Cred,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phonepay => "PHONEPAY",
            Self::Gpay => "GPAY",
            Self::Paytm => "PAYTM",
            Self::Cred => "CRED",
            Self::Cash => "CASH",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PHONEPAY" => Ok(Self::Phonepay),
            "GPAY" => Ok(Self::Gpay),
            "PAYTM" => Ok(Self::Paytm),
            "CRED" => Ok(Self::Cred),
            "CASH" => Ok(Self::Cash),
            _ => Err(UnknownVariant(raw.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    PartialPaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PartialPaid => "PARTIAL_PAID",
            Self::Paid => "PAID",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PARTIAL_PAID" => Ok(Self::PartialPaid),
            "PAID" => Ok(Self::Paid),
            _ => Err(UnknownVariant(raw.to_string())),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// Outcome of a lenient enum parse: either the caller's value or the
/// fallback that replaced an unparseable input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerced<T> {
    Parsed(T),
    Defaulted(T),
}

impl<T: Copy> Coerced<T> {
    pub fn value(self) -> T {
        match self {
            Self::Parsed(value) | Self::Defaulted(value) => value,
        }
    }

    pub fn was_defaulted(self) -> bool {
        matches!(self, Self::Defaulted(_))
    }
}

/// Parse `raw`, substituting `fallback` when it is not a known variant.
pub fn coerce<T: FromStr + Copy>(raw: &str, fallback: T) -> Coerced<T> {
    match raw.parse::<T>() {
        Ok(value) => Coerced::Parsed(value),
        Err(_) => Coerced::Defaulted(fallback),
    }
}

/// A validated calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        // Rejects month 0/13 and years chrono cannot represent.
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Unique key of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LedgerKey {
    pub candidate_id: Uuid,
    pub property_id: Uuid,
    pub period: BillingPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentLedgerEntry {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub property_id: Uuid,
    pub payment_month: u32,
    pub payment_year: i32,
    pub room_no: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub advance: f64,
    pub amount_paid: f64,
    pub balance: f64,
    pub payment_date: Option<NaiveDate>,
    pub transaction_id: Option<String>,
    pub receipt_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentLedgerEntry {
    /// Fresh PENDING/CASH entry with zero amounts for `key`.
    pub fn pending(key: LedgerKey, room_no: &str, now: DateTime<Utc>) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            candidate_id: key.candidate_id,
            property_id: key.property_id,
            payment_month: key.period.month(),
            payment_year: key.period.year(),
            room_no: room_no.to_string(),
            payment_method: PaymentMethod::Cash,
            status: PaymentStatus::Pending,
            advance: 0.0,
            amount_paid: 0.0,
            balance: 0.0,
            payment_date: None,
            transaction_id: None,
            receipt_id: None,
            created_at: None,
            updated_at: now,
        };
        entry.normalize(now);
        entry
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            candidate_id: self.candidate_id,
            property_id: self.property_id,
            period: BillingPeriod {
                year: self.payment_year,
                month: self.payment_month,
            },
        }
    }

    /// Write-time defaults: room falls back to "NA", amounts are always
    /// finite, blank identifiers are cleared, timestamps are stamped.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        let room = self.room_no.trim();
        self.room_no = if room.is_empty() {
            UNASSIGNED_ROOM.to_string()
        } else {
            room.to_string()
        };
        for amount in [&mut self.advance, &mut self.amount_paid, &mut self.balance] {
            if !amount.is_finite() {
                *amount = 0.0;
            }
        }
        self.transaction_id = non_blank(self.transaction_id.take());
        self.receipt_id = non_blank(self.receipt_id.take());
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = now;
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub fn room_or_default(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|room| !room.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| UNASSIGNED_ROOM.to_string())
}
