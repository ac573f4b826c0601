use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{PaymentMethod, PaymentStatus};

/// Everything printed on a receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSnapshot {
    pub candidate_name: String,
    pub room_no: String,
    pub property_name: String,
    pub property_address: Option<String>,
    pub property_contact: Option<String>,
    pub owner_name: String,
    pub month: u32,
    pub year: i32,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
    pub advance: f64,
    pub amount_paid: f64,
    pub balance: f64,
    pub transaction_id: String,
    pub receipt_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Renders a receipt. Output depends only on the snapshot and
/// `generated_on`.
pub trait ReceiptDocumentGenerator: Send + Sync {
    fn generate_receipt(
        &self,
        snapshot: &ReceiptSnapshot,
        generated_on: DateTime<Utc>,
    ) -> Result<ReceiptDocument, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReceiptGenerator;

impl ReceiptDocumentGenerator for HtmlReceiptGenerator {
    fn generate_receipt(
        &self,
        snapshot: &ReceiptSnapshot,
        generated_on: DateTime<Utc>,
    ) -> Result<ReceiptDocument, String> {
        if snapshot.receipt_id.trim().is_empty() {
            return Err("Receipt id is required.".to_string());
        }
        Ok(ReceiptDocument {
            bytes: render_html(snapshot, generated_on).into_bytes(),
            content_type: "text/html; charset=utf-8",
            extension: "html",
        })
    }
}

fn render_html(snapshot: &ReceiptSnapshot, generated_on: DateTime<Utc>) -> String {
    let payment_date = snapshot
        .payment_date
        .map(|date| date.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Receipt No", snapshot.receipt_id.clone()),
        ("Transaction ID", snapshot.transaction_id.clone()),
        ("Tenant", snapshot.candidate_name.clone()),
        ("Room", snapshot.room_no.clone()),
        ("Period", format!("{:02}/{}", snapshot.month, snapshot.year)),
        ("Payment Method", snapshot.payment_method.to_string()),
        ("Status", snapshot.status.to_string()),
        ("Payment Date", payment_date),
        ("Advance", format_amount(snapshot.advance)),
        ("Amount Paid", format_amount(snapshot.amount_paid)),
        ("Balance", format_amount(snapshot.balance)),
    ];

    let mut body = String::new();
    for (label, value) in rows {
        body.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(&value)
        ));
    }

    let mut header = format!("<h1>{}</h1>", escape_html(&snapshot.property_name));
    if let Some(address) = snapshot.property_address.as_deref() {
        header.push_str(&format!("<p>{}</p>", escape_html(address)));
    }
    if let Some(contact) = snapshot.property_contact.as_deref() {
        header.push_str(&format!("<p>Contact: {}</p>", escape_html(contact)));
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Payment Receipt {receipt}</title></head>\
         <body style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">{header}\
         <h2>Payment Receipt</h2><table>{body}</table>\
         <p>Issued by {owner}</p><p>Generated on {generated}</p></body></html>",
        receipt = escape_html(&snapshot.receipt_id),
        owner = escape_html(&snapshot.owner_name),
        generated = generated_on.format("%d-%m-%Y %H:%M UTC"),
    )
}

fn format_amount(value: f64) -> String {
    format!("Rs. {value:.2}")
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
