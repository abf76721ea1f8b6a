//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every entity id in Conspectium is a UUIDv7, so rows sort by creation time
//! and ordered lists (quiz questions, answers) stay stable across reloads.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use conspectium_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(b >= a);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Extract the embedded creation timestamp of a UUIDv7.
///
/// Returns `None` for other UUID versions.
pub fn extract_timestamp(uuid: &Uuid) -> Option<DateTime<Utc>> {
    if uuid.get_version_num() != 7 {
        return None;
    }
    let bytes = uuid.as_bytes();
    let millis = bytes[..6]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_extract_timestamp_close_to_now() {
        let before = Utc::now().timestamp_millis();
        let ts = extract_timestamp(&new_v7()).unwrap().timestamp_millis();
        let after = Utc::now().timestamp_millis();
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_extract_timestamp_rejects_v4() {
        assert!(extract_timestamp(&Uuid::new_v4()).is_none());
    }
}
