//! Trial and subscription validity of an owner account.
//!
//! A subscription end date always wins over the trial fields. Remaining days
//! are counted inclusively for subscriptions and exclusively for trials.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{error::AppResult, models::Owner, repository::OwnerRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidityMode {
    Trial,
    Subscription,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountValidity {
    pub mode: ValidityMode,
    pub end_date: Option<NaiveDate>,
    pub remaining_days: Option<i64>,
    pub expired: bool,
}

pub fn evaluate(owner: &Owner, as_of: NaiveDate) -> AccountValidity {
    if let Some(end) = owner.subscription_end {
        return AccountValidity {
            mode: ValidityMode::Subscription,
            end_date: Some(end),
            remaining_days: Some(((end - as_of).num_days() + 1).max(0)),
            expired: as_of > end,
        };
    }
    if let Some(end) = owner.trial_end_date {
        return AccountValidity {
            mode: ValidityMode::Trial,
            end_date: Some(end),
            remaining_days: Some((end - as_of).num_days().max(0)),
            expired: as_of > end,
        };
    }
    AccountValidity {
        mode: ValidityMode::None,
        end_date: None,
        remaining_days: None,
        expired: false,
    }
}

/// Whether this evaluation is the moment the trial runs out for an owner
/// whose flag has not been recorded yet.
pub fn trial_expiry_due(owner: &Owner, validity: &AccountValidity) -> bool {
    validity.mode == ValidityMode::Trial
        && validity.remaining_days == Some(0)
        && !owner.trial_expired
}

/// Evaluate and persist the one-way trial-expiry flag when it first becomes
/// due. Later evaluations find the flag set and write nothing.
pub async fn evaluate_and_record<S>(
    store: &S,
    owner: &Owner,
    as_of: NaiveDate,
) -> AppResult<AccountValidity>
where
    S: OwnerRepository + ?Sized,
{
    let validity = evaluate(owner, as_of);
    if trial_expiry_due(owner, &validity) {
        let changed = store.mark_trial_expired(owner.id).await?;
        if changed {
            tracing::info!(owner_id = %owner.id, trial_end = ?validity.end_date, "Trial expired");
        }
    }
    Ok(validity)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    use super::{evaluate, evaluate_and_record, ValidityMode};
    use crate::models::{Owner, TRIAL_PLAN};
    use crate::repository::{MemoryStore, OwnerRepository};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
    }

    fn owner() -> Owner {
        Owner {
            id: Uuid::new_v4(),
            owner_name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            mobile: "9000000001".to_string(),
            password_hash: "hash".to_string(),
            mpin_hash: None,
            trial_start_date: None,
            trial_end_date: None,
            trial_expired: false,
            subscribed: false,
            subscription_plan: Some(TRIAL_PLAN.to_string()),
            subscription_start: None,
            subscription_end: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn subscription_overrides_expired_trial() {
        let mut account = owner();
        account.subscription_end = Some(today() + Duration::days(10));
        account.trial_end_date = Some(today() - Duration::days(5));
        account.trial_expired = true;

        let validity = evaluate(&account, today());
        assert_eq!(validity.mode, ValidityMode::Subscription);
        assert!(!validity.expired);
        assert_eq!(validity.remaining_days, Some(11));
    }

    #[test]
    fn subscription_end_day_is_still_usable() {
        let mut account = owner();
        account.subscription_end = Some(today());
        let validity = evaluate(&account, today());
        assert_eq!(validity.remaining_days, Some(1));
        assert!(!validity.expired);

        let validity = evaluate(&account, today() + Duration::days(3));
        assert_eq!(validity.remaining_days, Some(0));
        assert!(validity.expired);
    }

    #[test]
    fn trial_counts_days_exclusively() {
        let mut account = owner();
        account.trial_end_date = Some(today() + Duration::days(4));
        let validity = evaluate(&account, today());
        assert_eq!(validity.mode, ValidityMode::Trial);
        assert_eq!(validity.remaining_days, Some(4));

        account.trial_end_date = Some(today() - Duration::days(2));
        let validity = evaluate(&account, today());
        assert_eq!(validity.remaining_days, Some(0));
        assert!(validity.expired);
    }

    #[test]
    fn no_dates_means_no_mode() {
        let validity = evaluate(&owner(), today());
        assert_eq!(validity.mode, ValidityMode::None);
        assert_eq!(validity.remaining_days, None);
        assert_eq!(validity.end_date, None);
        assert!(!validity.expired);
    }

    #[tokio::test]
    async fn trial_expiry_is_written_once() {
        let store = MemoryStore::new();
        let mut account = owner();
        account.trial_end_date = Some(today());
        store.insert_owner(&account).await.unwrap();
        let baseline = store.owner_writes();

        let first = store.find_owner(account.id).await.unwrap().unwrap();
        evaluate_and_record(&store, &first, today()).await.unwrap();
        let stored = store.find_owner(account.id).await.unwrap().unwrap();
        assert!(stored.trial_expired);
        assert_eq!(store.owner_writes(), baseline + 1);

        evaluate_and_record(&store, &stored, today()).await.unwrap();
        assert_eq!(store.owner_writes(), baseline + 1);
    }

    #[tokio::test]
    async fn active_trial_writes_nothing() {
        let store = MemoryStore::new();
        let mut account = owner();
        account.trial_end_date = Some(today() + Duration::days(3));
        store.insert_owner(&account).await.unwrap();
        let baseline = store.owner_writes();

        evaluate_and_record(&store, &account, today()).await.unwrap();
        assert_eq!(store.owner_writes(), baseline);
        assert!(!store.find_owner(account.id).await.unwrap().unwrap().trial_expired);
    }
}
