use chrono::NaiveDate;

use crate::models::{BillingPeriod, Candidate};

/// A candidate without a join date is always resident. Otherwise they are
/// resident from their join date onward; the vacate date is not consulted.
pub fn is_resident(joining_date: Option<NaiveDate>, period: BillingPeriod) -> bool {
    match joining_date {
        None => true,
        Some(joined) => joined <= period.last_day(),
    }
}

/// Substring match on the room identifier. A blank filter matches all rooms.
pub fn matches_room(room_no: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|needle| !needle.is_empty()) {
        Some(needle) => room_no.contains(needle),
        None => true,
    }
}

/// Candidates billable for `period`, narrowed by the optional room filter.
pub fn residents_for(
    candidates: Vec<Candidate>,
    period: BillingPeriod,
    room_filter: Option<&str>,
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| matches_room(&candidate.room_no, room_filter))
        .filter(|candidate| is_resident(candidate.joining_date, period))
        .collect()
}
