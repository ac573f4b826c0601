//! Natural ordering for free-text room identifiers.
//!
//! All-digit identifiers compare by numeric value and come before any other
//! identifier; everything else compares lexicographically on the trimmed,
//! uppercased text. Blank identifiers sort first. Digit strings are compared
//! without parsing, so identifiers longer than any integer type still order
//! correctly.

use std::cmp::Ordering;

/// Rooms that do not parse as an integer sort after every parsed room in
/// candidate listings.
pub const UNPARSEABLE_ROOM_SENTINEL: i32 = i32::MAX / 2;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RoomKey {
    Blank,
    Numeric {
        digits: usize,
        magnitude: String,
        raw: String,
    },
    Text(String),
}

fn room_key(room: Option<&str>) -> RoomKey {
    let normalized = room.unwrap_or_default().trim().to_uppercase();
    if normalized.is_empty() {
        return RoomKey::Blank;
    }
    if normalized.bytes().all(|byte| byte.is_ascii_digit()) {
        let magnitude = normalized.trim_start_matches('0').to_string();
        return RoomKey::Numeric {
            digits: magnitude.len(),
            magnitude,
            raw: normalized,
        };
    }
    RoomKey::Text(normalized)
}

pub fn compare_rooms(left: Option<&str>, right: Option<&str>) -> Ordering {
    room_key(left).cmp(&room_key(right))
}

/// Stable sort of `items` by their room identifier.
pub fn sort_by_room<T, F>(items: &mut [T], room: F)
where
    F: Fn(&T) -> Option<&str>,
{
    items.sort_by_cached_key(|item| room_key(room(item)));
}

/// Integer sort key used by candidate listings.
pub fn listing_key(room: &str) -> i32 {
    room.trim()
        .parse::<i32>()
        .unwrap_or(UNPARSEABLE_ROOM_SENTINEL)
}

/// Stable sort by [`listing_key`]; rooms sharing a key keep their order.
pub fn sort_for_listing<T, F>(items: &mut [T], room: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by_key(|item| listing_key(room(item)));
}
