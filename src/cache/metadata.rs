//! Per-entry metadata.
//!
//! Storage keeps only request → response, so the stored-at time travels inside the
//! response itself. Handlers never touch the header directly; they go through
//! [`EntryMetadata`] so a store with native metadata can replace [`HeaderStamp`].

use time::OffsetDateTime;

use super::store::StoredResponse;

/// Header carrying the stored-at time as unix milliseconds.
pub const STORED_AT_HEADER: &str = "x-newsgate-stored-at";

pub trait EntryMetadata: Send + Sync {
    /// Record `at` as the moment `response` entered the cache.
    fn stamp(&self, response: &mut StoredResponse, at: OffsetDateTime);

    /// Stored-at time, or `None` when the entry was never stamped or the stamp is unreadable.
    fn stored_at(&self, response: &StoredResponse) -> Option<OffsetDateTime>;
}

/// Keeps the stored-at time in [`STORED_AT_HEADER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderStamp;

impl EntryMetadata for HeaderStamp {
    fn stamp(&self, response: &mut StoredResponse, at: OffsetDateTime) {
        let millis = at.unix_timestamp_nanos() / 1_000_000;
        response.set_header(STORED_AT_HEADER, millis.to_string());
    }

    fn stored_at(&self, response: &StoredResponse) -> Option<OffsetDateTime> {
        let millis: i128 = response.header(STORED_AT_HEADER)?.trim().parse().ok()?;
        OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
    }
}

/// Age of an entry at `now`, or `None` when it carries no usable stamp.
pub fn entry_age(
    metadata: &dyn EntryMetadata,
    response: &StoredResponse,
    now: OffsetDateTime,
) -> Option<time::Duration> {
    metadata.stored_at(response).map(|stored| now - stored)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn stamp_then_read_back() {
        let mut response = StoredResponse::new(200, Vec::new(), "{}");
        let at = datetime!(2026-03-01 12:00:00.250 UTC);

        HeaderStamp.stamp(&mut response, at);

        assert_eq!(response.header(STORED_AT_HEADER), Some("1772366400250"));
        assert_eq!(HeaderStamp.stored_at(&response), Some(at));
    }

    #[test]
    fn restamp_replaces_previous_value() {
        let mut response = StoredResponse::new(200, Vec::new(), "{}");
        HeaderStamp.stamp(&mut response, datetime!(2026-03-01 12:00 UTC));
        HeaderStamp.stamp(&mut response, datetime!(2026-03-01 13:00 UTC));

        let stamps = response
            .headers
            .iter()
            .filter(|(name, _)| name == STORED_AT_HEADER)
            .count();
        assert_eq!(stamps, 1);
        assert_eq!(
            HeaderStamp.stored_at(&response),
            Some(datetime!(2026-03-01 13:00 UTC))
        );
    }

    #[test]
    fn garbage_stamp_reads_as_none() {
        let response = StoredResponse::new(
            200,
            vec![(STORED_AT_HEADER.to_string(), "yesterday".to_string())],
            "{}",
        );
        assert!(HeaderStamp.stored_at(&response).is_none());
    }

    #[test]
    fn age_is_measured_from_stamp() {
        let mut response = StoredResponse::new(200, Vec::new(), "{}");
        HeaderStamp.stamp(&mut response, datetime!(2026-03-01 12:00 UTC));

        let age = entry_age(&HeaderStamp, &response, datetime!(2026-03-01 12:10 UTC));
        assert_eq!(age, Some(time::Duration::minutes(10)));
    }
}
