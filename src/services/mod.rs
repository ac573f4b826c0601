pub mod account_validity;
pub mod candidates;
pub mod documents;
pub mod ledger_aggregator;
pub mod mailer;
pub mod owners;
pub mod payment_history;
pub mod payment_ledger;
pub mod properties;
pub mod receipts;
pub mod room_ordering;
pub mod tenancy_window;
