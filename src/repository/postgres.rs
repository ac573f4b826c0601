use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    BillingRepository, CandidateRepository, LedgerRepository, LedgerTotals, OwnerRepository,
    PropertyRepository, RemovedCandidates, StatusTally,
};
use crate::error::{map_db_error, AppError, AppResult};
use crate::models::{
    coerce, BillingOrder, BillingPeriod, Candidate, DeletedCandidate, LedgerKey, Owner, PaymentLedgerEntry,
    PaymentMethod, PaymentStatus, Property,
};

const OWNER_COLUMNS: &str = "id, owner_name, email, mobile, password_hash, mpin_hash, \
     trial_start_date, trial_end_date, trial_expired, subscribed, subscription_plan, \
     subscription_start, subscription_end, created_at";

const PROPERTY_COLUMNS: &str =
    "id, owner_id, name, address, mobile, email, monthly_rent, deleted, created_at";

const CANDIDATE_COLUMNS: &str = "id, property_id, name, gender, age, dob, mobile, email, \
     room_no, aadhaar, guardian_mobile, address, joining_date, vacate_date, created_at";

const ARCHIVE_COLUMNS: &str = "id, candidate_id, property_id, name, gender, age, dob, mobile, \
     email, room_no, aadhaar, guardian_mobile, joining_date, vacate_date, deleted_at";

const BILLING_ORDER_COLUMNS: &str = "order_id, owner_id, payment_id, created_at, paid_at";

const LEDGER_COLUMNS: &str = "id, candidate_id, property_id, payment_month, payment_year, \
     room_no, payment_method, status, advance, amount_paid, balance, payment_date, \
     transaction_id, receipt_id, created_at, updated_at";

const MIGRATIONS: [&str; 2] = [
    include_str!("../../migrations/0001_init.sql"),
    include_str!("../../migrations/0002_billing_orders.sql"),
];

/// Create the tables this service needs if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> AppResult<()> {
    for migration in MIGRATIONS {
        sqlx::raw_sql(migration)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct OwnerRow {
    id: Uuid,
    owner_name: String,
    email: String,
    mobile: String,
    password_hash: String,
    mpin_hash: Option<String>,
    trial_start_date: Option<NaiveDate>,
    trial_end_date: Option<NaiveDate>,
    trial_expired: bool,
    subscribed: bool,
    subscription_plan: Option<String>,
    subscription_start: Option<NaiveDate>,
    subscription_end: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl From<OwnerRow> for Owner {
    fn from(row: OwnerRow) -> Self {
        Self {
            id: row.id,
            owner_name: row.owner_name,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            mpin_hash: row.mpin_hash,
            trial_start_date: row.trial_start_date,
            trial_end_date: row.trial_end_date,
            trial_expired: row.trial_expired,
            subscribed: row.subscribed,
            subscription_plan: row.subscription_plan,
            subscription_start: row.subscription_start,
            subscription_end: row.subscription_end,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    address: Option<String>,
    mobile: Option<String>,
    email: Option<String>,
    monthly_rent: f64,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            address: row.address,
            mobile: row.mobile,
            email: row.email,
            monthly_rent: row.monthly_rent,
            deleted: row.deleted,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    property_id: Uuid,
    name: String,
    gender: Option<String>,
    age: Option<i32>,
    dob: Option<NaiveDate>,
    mobile: Option<String>,
    email: Option<String>,
    room_no: String,
    aadhaar: Option<String>,
    guardian_mobile: Option<String>,
    address: Option<String>,
    joining_date: Option<NaiveDate>,
    vacate_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            name: row.name,
            gender: row.gender,
            age: row.age,
            dob: row.dob,
            mobile: row.mobile,
            email: row.email,
            room_no: row.room_no,
            aadhaar: row.aadhaar,
            guardian_mobile: row.guardian_mobile,
            address: row.address,
            joining_date: row.joining_date,
            vacate_date: row.vacate_date,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ArchiveRow {
    id: Uuid,
    candidate_id: Uuid,
    property_id: Uuid,
    name: String,
    gender: Option<String>,
    age: Option<i32>,
    dob: Option<NaiveDate>,
    mobile: Option<String>,
    email: Option<String>,
    room_no: String,
    aadhaar: Option<String>,
    guardian_mobile: Option<String>,
    joining_date: Option<NaiveDate>,
    vacate_date: Option<NaiveDate>,
    deleted_at: DateTime<Utc>,
}

impl From<ArchiveRow> for DeletedCandidate {
    fn from(row: ArchiveRow) -> Self {
        Self {
            id: row.id,
            candidate_id: row.candidate_id,
            property_id: row.property_id,
            name: row.name,
            gender: row.gender,
            age: row.age,
            dob: row.dob,
            mobile: row.mobile,
            email: row.email,
            room_no: row.room_no,
            aadhaar: row.aadhaar,
            guardian_mobile: row.guardian_mobile,
            joining_date: row.joining_date,
            vacate_date: row.vacate_date,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    candidate_id: Uuid,
    property_id: Uuid,
    payment_month: i32,
    payment_year: i32,
    room_no: String,
    payment_method: String,
    status: String,
    advance: f64,
    amount_paid: f64,
    balance: f64,
    payment_date: Option<NaiveDate>,
    transaction_id: Option<String>,
    receipt_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<LedgerRow> for PaymentLedgerEntry {
    fn from(row: LedgerRow) -> Self {
        // Rows written by older clients may carry free-form text here.
        let payment_method = coerce(&row.payment_method, PaymentMethod::Cash);
        let status = coerce(&row.status, PaymentStatus::Pending);
        if payment_method.was_defaulted() || status.was_defaulted() {
            tracing::warn!(
                entry_id = %row.id,
                payment_method = %row.payment_method,
                status = %row.status,
                "Ledger row carries an unknown method or status"
            );
        }
        Self {
            id: row.id,
            candidate_id: row.candidate_id,
            property_id: row.property_id,
            payment_month: u32::try_from(row.payment_month).unwrap_or_default(),
            payment_year: row.payment_year,
            room_no: row.room_no,
            payment_method: payment_method.value(),
            status: status.value(),
            advance: row.advance,
            amount_paid: row.amount_paid,
            balance: row.balance,
            payment_date: row.payment_date,
            transaction_id: row.transaction_id,
            receipt_id: row.receipt_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BillingOrderRow {
    order_id: String,
    owner_id: Uuid,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl From<BillingOrderRow> for BillingOrder {
    fn from(row: BillingOrderRow) -> Self {
        Self {
            order_id: row.order_id,
            owner_id: row.owner_id,
            payment_id: row.payment_id,
            created_at: row.created_at,
            paid_at: row.paid_at,
        }
    }
}

fn month_param(period: BillingPeriod) -> i32 {
    // BillingPeriod months are 1..=12.
    period.month() as i32
}

#[async_trait]
impl OwnerRepository for PgStore {
    async fn find_owner(&self, owner_id: Uuid) -> AppResult<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE id = $1"
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Owner::from))
    }

    async fn find_owner_by_email(&self, email: &str) -> AppResult<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Owner::from))
    }

    async fn find_owner_by_mobile(&self, mobile: &str) -> AppResult<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE mobile = $1"
        ))
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Owner::from))
    }

    async fn insert_owner(&self, owner: &Owner) -> AppResult<Owner> {
        let row = sqlx::query_as::<_, OwnerRow>(&format!(
            "INSERT INTO owners ({OWNER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {OWNER_COLUMNS}"
        ))
        .bind(owner.id)
        .bind(&owner.owner_name)
        .bind(&owner.email)
        .bind(&owner.mobile)
        .bind(&owner.password_hash)
        .bind(&owner.mpin_hash)
        .bind(owner.trial_start_date)
        .bind(owner.trial_end_date)
        .bind(owner.trial_expired)
        .bind(owner.subscribed)
        .bind(&owner.subscription_plan)
        .bind(owner.subscription_start)
        .bind(owner.subscription_end)
        .bind(owner.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn mark_trial_expired(&self, owner_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE owners SET trial_expired = TRUE WHERE id = $1 AND trial_expired = FALSE",
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_subscription(
        &self,
        owner_id: Uuid,
        plan: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Option<Owner>> {
        let row = sqlx::query_as::<_, OwnerRow>(&format!(
            "UPDATE owners
             SET subscribed = TRUE,
                 subscription_plan = $2,
                 subscription_start = $3,
                 subscription_end = $4
             WHERE id = $1
             RETURNING {OWNER_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(plan)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Owner::from))
    }
}

#[async_trait]
impl PropertyRepository for PgStore {
    async fn insert_property(&self, property: &Property) -> AppResult<Property> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "INSERT INTO properties ({PROPERTY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(property.id)
        .bind(property.owner_id)
        .bind(&property.name)
        .bind(&property.address)
        .bind(&property.mobile)
        .bind(&property.email)
        .bind(property.monthly_rent)
        .bind(property.deleted)
        .bind(property.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn find_property(&self, property_id: Uuid) -> AppResult<Option<Property>> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Property::from))
    }

    async fn list_properties(&self, owner_id: Uuid, deleted: bool) -> AppResult<Vec<Property>> {
        let rows = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties
             WHERE owner_id = $1 AND deleted = $2
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .bind(deleted)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Property::from).collect())
    }

    async fn set_property_deleted(&self, property_id: Uuid, deleted: bool) -> AppResult<bool> {
        let result = sqlx::query("UPDATE properties SET deleted = $2 WHERE id = $1")
            .bind(property_id)
            .bind(deleted)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CandidateRepository for PgStore {
    async fn insert_candidate(&self, candidate: &Candidate) -> AppResult<Candidate> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "INSERT INTO candidates ({CANDIDATE_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {CANDIDATE_COLUMNS}"
        ))
        .bind(candidate.id)
        .bind(candidate.property_id)
        .bind(&candidate.name)
        .bind(&candidate.gender)
        .bind(candidate.age)
        .bind(candidate.dob)
        .bind(&candidate.mobile)
        .bind(&candidate.email)
        .bind(&candidate.room_no)
        .bind(&candidate.aadhaar)
        .bind(&candidate.guardian_mobile)
        .bind(&candidate.address)
        .bind(candidate.joining_date)
        .bind(candidate.vacate_date)
        .bind(candidate.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn find_candidate(&self, candidate_id: Uuid) -> AppResult<Option<Candidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = $1"
        ))
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Candidate::from))
    }

    async fn update_candidate(&self, candidate: &Candidate) -> AppResult<Option<Candidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "UPDATE candidates
             SET name = $2, gender = $3, age = $4, dob = $5, mobile = $6, email = $7,
                 room_no = $8, aadhaar = $9, guardian_mobile = $10, address = $11,
                 joining_date = $12, vacate_date = $13
             WHERE id = $1
             RETURNING {CANDIDATE_COLUMNS}"
        ))
        .bind(candidate.id)
        .bind(&candidate.name)
        .bind(&candidate.gender)
        .bind(candidate.age)
        .bind(candidate.dob)
        .bind(&candidate.mobile)
        .bind(&candidate.email)
        .bind(&candidate.room_no)
        .bind(&candidate.aadhaar)
        .bind(&candidate.guardian_mobile)
        .bind(&candidate.address)
        .bind(candidate.joining_date)
        .bind(candidate.vacate_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Candidate::from))
    }

    async fn list_candidates(&self, property_id: Uuid) -> AppResult<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates
             WHERE property_id = $1
             ORDER BY room_no ASC, created_at ASC"
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn archive_and_delete_candidate(&self, archive: &DeletedCandidate) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Dependency(format!("Failed to begin candidate delete txn: {error}"))
        })?;

        sqlx::query(&format!(
            "INSERT INTO deleted_candidates ({ARCHIVE_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(archive.id)
        .bind(archive.candidate_id)
        .bind(archive.property_id)
        .bind(&archive.name)
        .bind(&archive.gender)
        .bind(archive.age)
        .bind(archive.dob)
        .bind(&archive.mobile)
        .bind(&archive.email)
        .bind(&archive.room_no)
        .bind(&archive.aadhaar)
        .bind(&archive.guardian_mobile)
        .bind(archive.joining_date)
        .bind(archive.vacate_date)
        .bind(archive.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query("DELETE FROM payment_ledger WHERE candidate_id = $1")
            .bind(archive.candidate_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let deleted = sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(archive.candidate_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        if deleted.rows_affected() == 0 {
            if let Err(error) = tx.rollback().await {
                tracing::warn!(
                    candidate_id = %archive.candidate_id,
                    error = %error,
                    "Failed to roll back candidate delete"
                );
            }
            return Ok(false);
        }

        tx.commit().await.map_err(|error| {
            AppError::Dependency(format!("Failed to commit candidate delete: {error}"))
        })?;
        Ok(true)
    }

    async fn remove_property_candidates(
        &self,
        property_id: Uuid,
    ) -> AppResult<RemovedCandidates> {
        let mut tx = self.pool.begin().await.map_err(|error| {
            AppError::Dependency(format!("Failed to begin candidate purge txn: {error}"))
        })?;

        let ledger = sqlx::query(
            "DELETE FROM payment_ledger
             WHERE candidate_id IN (SELECT id FROM candidates WHERE property_id = $1)",
        )
        .bind(property_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let candidates = sqlx::query("DELETE FROM candidates WHERE property_id = $1")
            .bind(property_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(|error| {
            AppError::Dependency(format!("Failed to commit candidate purge: {error}"))
        })?;

        Ok(RemovedCandidates {
            candidates: candidates.rows_affected(),
            ledger_entries: ledger.rows_affected(),
        })
    }

    async fn list_archived_candidates(
        &self,
        owner_id: Uuid,
        property_id: Option<Uuid>,
    ) -> AppResult<Vec<DeletedCandidate>> {
        let rows = sqlx::query_as::<_, ArchiveRow>(&format!(
            "SELECT {} FROM deleted_candidates d
             JOIN properties p ON p.id = d.property_id
             WHERE p.owner_id = $1 AND ($2::uuid IS NULL OR d.property_id = $2)
             ORDER BY d.deleted_at DESC",
            prefixed(ARCHIVE_COLUMNS, "d")
        ))
        .bind(owner_id)
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(DeletedCandidate::from).collect())
    }
}

#[async_trait]
impl LedgerRepository for PgStore {
    async fn find_ledger_entry(&self, key: LedgerKey) -> AppResult<Option<PaymentLedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM payment_ledger
             WHERE candidate_id = $1 AND property_id = $2
               AND payment_month = $3 AND payment_year = $4"
        ))
        .bind(key.candidate_id)
        .bind(key.property_id)
        .bind(month_param(key.period))
        .bind(key.period.year())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(PaymentLedgerEntry::from))
    }

    async fn insert_ledger_entry_if_absent(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<PaymentLedgerEntry> {
        let inserted = sqlx::query_as::<_, LedgerRow>(&format!(
            "INSERT INTO payment_ledger ({LEDGER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (candidate_id, property_id, payment_month, payment_year) DO NOTHING
             RETURNING {LEDGER_COLUMNS}"
        ))
        .bind(entry.id)
        .bind(entry.candidate_id)
        .bind(entry.property_id)
        .bind(month_param(entry.key().period))
        .bind(entry.payment_year)
        .bind(&entry.room_no)
        .bind(entry.payment_method.as_str())
        .bind(entry.status.as_str())
        .bind(entry.advance)
        .bind(entry.amount_paid)
        .bind(entry.balance)
        .bind(entry.payment_date)
        .bind(&entry.transaction_id)
        .bind(&entry.receipt_id)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        // Lost the race; the winner's row owns the key.
        self.find_ledger_entry(entry.key()).await?.ok_or_else(|| {
            AppError::Internal("Ledger row vanished after key conflict.".to_string())
        })
    }

    async fn save_ledger_entry(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<Option<PaymentLedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "UPDATE payment_ledger
             SET room_no = $2, payment_method = $3, status = $4, advance = $5,
                 amount_paid = $6, balance = $7, payment_date = $8, transaction_id = $9,
                 receipt_id = $10, created_at = $11, updated_at = $12
             WHERE id = $1
             RETURNING {LEDGER_COLUMNS}"
        ))
        .bind(entry.id)
        .bind(&entry.room_no)
        .bind(entry.payment_method.as_str())
        .bind(entry.status.as_str())
        .bind(entry.advance)
        .bind(entry.amount_paid)
        .bind(entry.balance)
        .bind(entry.payment_date)
        .bind(&entry.transaction_id)
        .bind(&entry.receipt_id)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(PaymentLedgerEntry::from))
    }

    async fn ledger_totals(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> AppResult<LedgerTotals> {
        let (advance, paid, balance): (f64, f64, f64) = sqlx::query_as(
            "SELECT COALESCE(SUM(advance), 0)::float8,
                    COALESCE(SUM(amount_paid), 0)::float8,
                    COALESCE(SUM(balance), 0)::float8
             FROM payment_ledger
             WHERE property_id = $1 AND payment_month = $2 AND payment_year = $3",
        )
        .bind(property_id)
        .bind(month_param(period))
        .bind(period.year())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(LedgerTotals {
            advance,
            paid,
            balance,
        })
    }

    async fn ledger_status_tally(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> AppResult<StatusTally> {
        let (total, paid, partial): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*)::bigint,
                    COUNT(*) FILTER (WHERE upper(status) = 'PAID')::bigint,
                    COUNT(*) FILTER (WHERE upper(status) = 'PARTIAL_PAID')::bigint
             FROM payment_ledger
             WHERE property_id = $1 AND payment_month = $2 AND payment_year = $3",
        )
        .bind(property_id)
        .bind(month_param(period))
        .bind(period.year())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(StatusTally {
            total: total.max(0) as u64,
            paid: paid.max(0) as u64,
            partial: partial.max(0) as u64,
        })
    }
}

#[async_trait]
impl BillingRepository for PgStore {
    async fn insert_billing_order(&self, order: &BillingOrder) -> AppResult<BillingOrder> {
        let row = sqlx::query_as::<_, BillingOrderRow>(&format!(
            "INSERT INTO billing_orders ({BILLING_ORDER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BILLING_ORDER_COLUMNS}"
        ))
        .bind(&order.order_id)
        .bind(order.owner_id)
        .bind(&order.payment_id)
        .bind(order.created_at)
        .bind(order.paid_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn find_billing_order(&self, order_id: &str) -> AppResult<Option<BillingOrder>> {
        let row = sqlx::query_as::<_, BillingOrderRow>(&format!(
            "SELECT {BILLING_ORDER_COLUMNS} FROM billing_orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(BillingOrder::from))
    }

    async fn claim_billing_order(
        &self,
        order_id: &str,
        payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Option<BillingOrder>> {
        // The unique payment index turns a reused payment id into Conflict.
        let row = sqlx::query_as::<_, BillingOrderRow>(&format!(
            "UPDATE billing_orders
             SET payment_id = $2, paid_at = $3
             WHERE order_id = $1 AND payment_id IS NULL
             RETURNING {BILLING_ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(payment_id)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(BillingOrder::from))
    }
}

fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(str::trim)
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}
