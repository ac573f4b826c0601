//! Fixtures shared by the unit tests.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{Candidate, Owner, Property, TRIAL_PLAN};

pub fn sample_owner() -> Owner {
    let id = Uuid::new_v4();
    Owner {
        id,
        owner_name: "Meera Nair".to_string(),
        email: format!("owner-{id}@example.com"),
        mobile: id.simple().to_string(),
        password_hash: "opaque-hash".to_string(),
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

pub fn sample_property(owner_id: Uuid) -> Property {
    Property {
        id: Uuid::new_v4(),
        owner_id,
        name: "Green Nest PG".to_string(),
        address: Some("12 MG Road, Kochi".to_string()),
        mobile: Some("9800000000".to_string()),
        email: Some("desk@greennest.example".to_string()),
        monthly_rent: 6500.0,
        deleted: false,
        created_at: Utc::now(),
    }
}

pub fn sample_candidate(property: &Property, room: &str) -> Candidate {
    Candidate {
        id: Uuid::new_v4(),
        property_id: property.id,
        name: format!("Tenant {room}"),
        gender: None,
        age: None,
        dob: None,
        mobile: None,
        email: Some(format!("tenant{room}@example.com")),
        room_no: room.to_string(),
        aadhaar: None,
        guardian_mobile: None,
        address: None,
        joining_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        vacate_date: None,
        created_at: Utc::now(),
    }
}
