//! Receipt issuance for PAID ledger entries.
//!
//! The finalize step fills in the payment date, transaction id and receipt
//! id once and persists them before any document is rendered or sent, so a
//! retry after a delivery failure reuses the same numbers. Every outcome is
//! returned as a [`ReceiptResult`]; nothing here fails the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        BillingPeriod, Candidate, Owner, PaymentLedgerEntry, PaymentMethod, PaymentStatus,
        Property,
    },
    repository::Store,
    services::{
        documents::{ReceiptDocumentGenerator, ReceiptSnapshot},
        mailer::{Attachment, OutboundEmail, ReceiptDelivery},
        payment_ledger::ledger_key,
    },
    tenancy::{find_owned_property, OwnerContext},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ReceiptFailure {
    #[error("candidate not found")]
    #[serde(rename = "candidate not found")]
    CandidateNotFound,
    #[error("property not found")]
    #[serde(rename = "property not found")]
    PropertyNotFound,
    #[error("owner not found")]
    #[serde(rename = "owner not found")]
    OwnerNotFound,
    #[error("not payable")]
    #[serde(rename = "not payable")]
    NotPayable,
    #[error("missing recipient")]
    #[serde(rename = "missing recipient")]
    MissingRecipient,
    #[error("document generation failed")]
    #[serde(rename = "document generation failed")]
    DocumentFailed,
    #[error("delivery failed")]
    #[serde(rename = "delivery failed")]
    DeliveryFailed,
    #[error("storage unavailable")]
    #[serde(rename = "storage unavailable")]
    StorageUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptResult {
    pub ok: bool,
    pub reason: Option<ReceiptFailure>,
    pub transaction_id: Option<String>,
    pub receipt_id: Option<String>,
}

impl ReceiptResult {
    fn issued(entry: &PaymentLedgerEntry) -> Self {
        Self {
            ok: true,
            reason: None,
            transaction_id: entry.transaction_id.clone(),
            receipt_id: entry.receipt_id.clone(),
        }
    }

    fn failed(reason: ReceiptFailure, entry: Option<&PaymentLedgerEntry>) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            transaction_id: entry.and_then(|entry| entry.transaction_id.clone()),
            receipt_id: entry.and_then(|entry| entry.receipt_id.clone()),
        }
    }
}

/// Fill in missing payment metadata. Returns whether anything changed.
pub fn finalize(entry: &mut PaymentLedgerEntry, today: NaiveDate, now: DateTime<Utc>) -> bool {
    let stamp = now.timestamp_micros();
    let mut changed = false;

    if entry.payment_date.is_none() {
        entry.payment_date = Some(today);
        changed = true;
    }
    if is_blank(entry.transaction_id.as_deref()) {
        let prefix = if entry.payment_method == PaymentMethod::Cash {
            "CASH"
        } else {
            "TXN"
        };
        entry.transaction_id = Some(format!("{prefix}-{stamp}"));
        changed = true;
    }
    if is_blank(entry.receipt_id.as_deref()) {
        entry.receipt_id = Some(format!("RCPT-{stamp}"));
        changed = true;
    }

    if changed {
        entry.normalize(now);
    }
    changed
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

pub fn receipt_subject(period: BillingPeriod) -> String {
    format!("Payment Receipt - {}/{}", period.month(), period.year())
}

pub fn attachment_name(candidate_name: &str, period: BillingPeriod, extension: &str) -> String {
    format!(
        "{}-{}-{}.{extension}",
        candidate_name.trim(),
        period.month(),
        period.year()
    )
}

pub struct ReceiptIssuer<'a> {
    store: &'a dyn Store,
    documents: &'a dyn ReceiptDocumentGenerator,
    delivery: &'a dyn ReceiptDelivery,
}

enum Stage {
    Done(ReceiptResult),
    Finalized {
        candidate: Candidate,
        property: Property,
        owner: Owner,
        entry: PaymentLedgerEntry,
    },
}

impl<'a> ReceiptIssuer<'a> {
    pub fn new(
        store: &'a dyn Store,
        documents: &'a dyn ReceiptDocumentGenerator,
        delivery: &'a dyn ReceiptDelivery,
    ) -> Self {
        Self {
            store,
            documents,
            delivery,
        }
    }

    pub async fn finalize_and_issue(
        &self,
        ctx: &OwnerContext,
        candidate_id: Uuid,
        property_id: Uuid,
        period: BillingPeriod,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ReceiptResult {
        let stage = match self
            .prepare(ctx, candidate_id, property_id, period, today, now)
            .await
        {
            Ok(stage) => stage,
            Err(error) => {
                tracing::error!(
                    candidate_id = %candidate_id,
                    property_id = %property_id,
                    error = %error,
                    "Receipt finalize failed"
                );
                return ReceiptResult::failed(ReceiptFailure::StorageUnavailable, None);
            }
        };

        let (candidate, property, owner, entry) = match stage {
            Stage::Done(result) => return result,
            Stage::Finalized {
                candidate,
                property,
                owner,
                entry,
            } => (candidate, property, owner, entry),
        };

        self.send(&candidate, &property, &owner, &entry, period, now)
            .await
    }

    async fn prepare(
        &self,
        ctx: &OwnerContext,
        candidate_id: Uuid,
        property_id: Uuid,
        period: BillingPeriod,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Stage> {
        let candidate = match self.store.find_candidate(candidate_id).await? {
            Some(candidate) if candidate.property_id == property_id => candidate,
            _ => {
                return Ok(Stage::Done(ReceiptResult::failed(
                    ReceiptFailure::CandidateNotFound,
                    None,
                )))
            }
        };
        let Some(property) = find_owned_property(self.store, ctx, property_id).await? else {
            return Ok(Stage::Done(ReceiptResult::failed(
                ReceiptFailure::PropertyNotFound,
                None,
            )));
        };

        let key = ledger_key(candidate.id, property.id, period);
        let mut entry = match self.store.find_ledger_entry(key).await? {
            Some(entry) if entry.status == PaymentStatus::Paid => entry,
            other => {
                tracing::info!(
                    candidate_id = %candidate.id,
                    property_id = %property.id,
                    month = period.month(),
                    year = period.year(),
                    status = ?other.as_ref().map(|entry| entry.status),
                    "Receipt refused; period is not paid"
                );
                return Ok(Stage::Done(ReceiptResult::failed(
                    ReceiptFailure::NotPayable,
                    None,
                )));
            }
        };

        if finalize(&mut entry, today, now) {
            entry = match self.store.save_ledger_entry(&entry).await? {
                Some(saved) => saved,
                None => {
                    return Ok(Stage::Done(ReceiptResult::failed(
                        ReceiptFailure::NotPayable,
                        None,
                    )))
                }
            };
            tracing::info!(
                candidate_id = %candidate.id,
                property_id = %property.id,
                month = period.month(),
                year = period.year(),
                receipt_id = ?entry.receipt_id,
                "Receipt identifiers finalized"
            );
        }

        let Some(owner) = self.store.find_owner(property.owner_id).await? else {
            return Ok(Stage::Done(ReceiptResult::failed(
                ReceiptFailure::OwnerNotFound,
                Some(&entry),
            )));
        };

        Ok(Stage::Finalized {
            candidate,
            property,
            owner,
            entry,
        })
    }

    async fn send(
        &self,
        candidate: &Candidate,
        property: &Property,
        owner: &Owner,
        entry: &PaymentLedgerEntry,
        period: BillingPeriod,
        now: DateTime<Utc>,
    ) -> ReceiptResult {
        let Some(recipient) = candidate
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
        else {
            return ReceiptResult::failed(ReceiptFailure::MissingRecipient, Some(entry));
        };

        let snapshot = snapshot_of(candidate, property, owner, entry, period);
        let document = match self.documents.generate_receipt(&snapshot, now) {
            Ok(document) => document,
            Err(error) => {
                tracing::error!(receipt_id = %snapshot.receipt_id, error = %error, "Receipt rendering failed");
                return ReceiptResult::failed(ReceiptFailure::DocumentFailed, Some(entry));
            }
        };

        let email = OutboundEmail {
            to: recipient.to_string(),
            cc: Some(owner.email.clone()).filter(|cc| !cc.trim().is_empty()),
            subject: receipt_subject(period),
            body_html: format!(
                "<p>Hi {},</p><p>Please find attached your payment receipt for {}/{} at {}.</p><p>Thank you.</p>",
                candidate.name,
                period.month(),
                period.year(),
                property.name
            ),
            attachment: Some(Attachment {
                filename: attachment_name(&candidate.name, period, document.extension),
                content: document.bytes,
            }),
        };

        match self.delivery.send(&email).await {
            Ok(()) => ReceiptResult::issued(entry),
            Err(error) => {
                tracing::warn!(
                    receipt_id = %snapshot.receipt_id,
                    error = %error,
                    "Receipt delivery failed; identifiers kept for resend"
                );
                ReceiptResult::failed(ReceiptFailure::DeliveryFailed, Some(entry))
            }
        }
    }
}

fn snapshot_of(
    candidate: &Candidate,
    property: &Property,
    owner: &Owner,
    entry: &PaymentLedgerEntry,
    period: BillingPeriod,
) -> ReceiptSnapshot {
    ReceiptSnapshot {
        candidate_name: candidate.name.clone(),
        room_no: entry.room_no.clone(),
        property_name: property.name.clone(),
        property_address: property.address.clone(),
        property_contact: property.mobile.clone().or_else(|| property.email.clone()),
        owner_name: owner.owner_name.clone(),
        month: period.month(),
        year: period.year(),
        payment_method: entry.payment_method,
        status: entry.status,
        payment_date: entry.payment_date,
        advance: entry.advance,
        amount_paid: entry.amount_paid,
        balance: entry.balance,
        transaction_id: entry.transaction_id.clone().unwrap_or_default(),
        receipt_id: entry.receipt_id.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{finalize, ReceiptFailure, ReceiptIssuer};
    use crate::models::{BillingPeriod, PaymentMethod};
    use crate::repository::{
        CandidateRepository, LedgerRepository, MemoryStore, OwnerRepository, PropertyRepository,
    };
    use crate::services::documents::HtmlReceiptGenerator;
    use crate::services::mailer::{OutboundEmail, ReceiptDelivery};
    use crate::services::payment_ledger::{ledger_key, update, LedgerUpdate};
    use crate::tenancy::OwnerContext;
    use crate::testing::{sample_candidate, sample_owner, sample_property};

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl ReceiptDelivery for RecordingDelivery {
        async fn send(&self, email: &OutboundEmail) -> Result<(), String> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail {
                Err("smtp down".to_string())
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        store: MemoryStore,
        ctx: OwnerContext,
        owner_email: String,
        candidate: crate::models::Candidate,
        property: crate::models::Property,
    }

    fn period() -> BillingPeriod {
        BillingPeriod::new(3, 2024).expect("valid period")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).expect("valid date")
    }

    async fn fixture(status: &str, method: &str) -> Fixture {
        let store = MemoryStore::new();
        let owner = sample_owner();
        store.insert_owner(&owner).await.unwrap();
        let property = sample_property(owner.id);
        store.insert_property(&property).await.unwrap();
        let candidate = sample_candidate(&property, "5");
        store.insert_candidate(&candidate).await.unwrap();
        update(
            &store,
            &candidate,
            &property,
            period(),
            &LedgerUpdate {
                status: Some(status.to_string()),
                payment_method: Some(method.to_string()),
                amount_paid: Some(6500.0),
                ..LedgerUpdate::default()
            },
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
        )
        .await
        .unwrap();
        Fixture {
            store,
            ctx: OwnerContext::new(owner.id),
            owner_email: owner.email,
            candidate,
            property,
        }
    }

    #[tokio::test]
    async fn partial_payment_is_not_payable_and_untouched() {
        let fx = fixture("PARTIAL_PAID", "GPAY").await;
        let key = ledger_key(fx.candidate.id, fx.property.id, period());
        let before = fx.store.find_ledger_entry(key).await.unwrap().unwrap();
        let writes = fx.store.ledger_writes();
        let delivery = RecordingDelivery::default();

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&fx.ctx, fx.candidate.id, fx.property.id, period(), today(), Utc::now())
            .await;

        assert!(!result.ok);
        assert_eq!(result.reason, Some(ReceiptFailure::NotPayable));
        assert_eq!(fx.store.find_ledger_entry(key).await.unwrap().unwrap(), before);
        assert_eq!(fx.store.ledger_writes(), writes);
        assert!(delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_entry_is_not_payable() {
        let fx = fixture("PAID", "CASH").await;
        let delivery = RecordingDelivery::default();
        let april = BillingPeriod::new(4, 2024).unwrap();

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&fx.ctx, fx.candidate.id, fx.property.id, april, today(), Utc::now())
            .await;

        assert_eq!(result.reason, Some(ReceiptFailure::NotPayable));
        assert_eq!(fx.store.ledger_len().await, 1);
    }

    #[tokio::test]
    async fn retried_issuance_reuses_persisted_identifiers() {
        let fx = fixture("PAID", "CASH").await;
        let delivery = RecordingDelivery::default();
        let issuer = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery);
        let first_at = Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap();

        let first = issuer
            .finalize_and_issue(&fx.ctx, fx.candidate.id, fx.property.id, period(), today(), first_at)
            .await;
        let second = issuer
            .finalize_and_issue(
                &fx.ctx,
                fx.candidate.id,
                fx.property.id,
                period(),
                today() + Duration::days(1),
                first_at + Duration::seconds(90),
            )
            .await;

        assert!(first.ok && second.ok);
        assert!(first
            .transaction_id
            .as_deref()
            .is_some_and(|id| id.starts_with("CASH-")));
        assert!(first
            .receipt_id
            .as_deref()
            .is_some_and(|id| id.starts_with("RCPT-")));
        assert_eq!(first.transaction_id, second.transaction_id);
        assert_eq!(first.receipt_id, second.receipt_id);

        let stored = fx
            .store
            .find_ledger_entry(ledger_key(fx.candidate.id, fx.property.id, period()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payment_date, Some(today()));

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Payment Receipt - 3/2024");
        assert_eq!(sent[0].cc.as_deref(), Some(fx.owner_email.as_str()));
        assert_eq!(
            sent[0].attachment.as_ref().map(|a| a.filename.as_str()),
            Some("Tenant 5-3-2024.html")
        );
    }

    #[tokio::test]
    async fn delivery_failure_keeps_finalized_identifiers() {
        let fx = fixture("PAID", "GPAY").await;
        let delivery = RecordingDelivery {
            fail: true,
            ..RecordingDelivery::default()
        };

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&fx.ctx, fx.candidate.id, fx.property.id, period(), today(), Utc::now())
            .await;

        assert!(!result.ok);
        assert_eq!(result.reason, Some(ReceiptFailure::DeliveryFailed));
        let stored = fx
            .store
            .find_ledger_entry(ledger_key(fx.candidate.id, fx.property.id, period()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.receipt_id, result.receipt_id);
        assert!(stored
            .transaction_id
            .as_deref()
            .is_some_and(|id| id.starts_with("TXN-")));
    }

    #[tokio::test]
    async fn candidate_without_email_is_finalized_but_not_sent() {
        let fx = fixture("PAID", "CASH").await;
        let mut silent = fx.candidate.clone();
        silent.email = None;
        fx.store.update_candidate(&silent).await.unwrap();
        let delivery = RecordingDelivery::default();

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&fx.ctx, fx.candidate.id, fx.property.id, period(), today(), Utc::now())
            .await;

        assert_eq!(result.reason, Some(ReceiptFailure::MissingRecipient));
        assert!(result.receipt_id.is_some());
        assert!(delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_owner_sees_property_not_found() {
        let fx = fixture("PAID", "CASH").await;
        let delivery = RecordingDelivery::default();
        let stranger = OwnerContext::new(uuid::Uuid::new_v4());

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&stranger, fx.candidate.id, fx.property.id, period(), today(), Utc::now())
            .await;
        assert_eq!(result.reason, Some(ReceiptFailure::PropertyNotFound));

        let result = ReceiptIssuer::new(&fx.store, &HtmlReceiptGenerator, &delivery)
            .finalize_and_issue(&fx.ctx, uuid::Uuid::new_v4(), fx.property.id, period(), today(), Utc::now())
            .await;
        assert_eq!(result.reason, Some(ReceiptFailure::CandidateNotFound));
    }

    #[test]
    fn finalize_keeps_existing_identifiers() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 10, 0, 0).unwrap();
        let key = ledger_key(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), period());
        let mut entry = crate::models::PaymentLedgerEntry::pending(key, "1", now);
        entry.payment_method = PaymentMethod::Paytm;
        entry.transaction_id = Some("PAYTM-778".to_string());
        entry.receipt_id = Some("RCPT-1".to_string());
        entry.payment_date = Some(today());

        assert!(!finalize(&mut entry, today(), now));
        assert_eq!(entry.transaction_id.as_deref(), Some("PAYTM-778"));
    }
}
