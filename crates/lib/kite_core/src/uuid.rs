//! Time-ordered ids for rows created by the services.
//!
//! Posts and refresh tokens take UUIDv7 ids assigned here, so id order
//! follows creation order and breaks `created_at` ties in newest-first
//! listings. User ids come from the database default.

use uuid::Uuid;

/// A fresh UUIDv7.
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn ids_carry_the_creation_time() {
        let before = Utc::now().timestamp_millis();
        let id = uuidv7();
        let after = Utc::now().timestamp_millis();

        assert_eq!(id.get_version_num(), 7);
        let (secs, nanos) = id.get_timestamp().expect("v7 ids embed a timestamp").to_unix();
        let millis = secs as i64 * 1_000 + i64::from(nanos / 1_000_000);
        assert!((before..=after).contains(&millis));
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let ids: Vec<Uuid> = (0..64).map(|_| uuidv7()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
