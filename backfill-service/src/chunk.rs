use time::{Date, Duration, OffsetDateTime, Time};

/// Provider-side limit on the span of a single backfill.
pub const MAX_DAYS_PER_CHUNK: u32 = 10;

/// Last whole second of a day.
pub const END_OF_DAY: Time = time::macros::time!(23:59:59);

/// Inclusive `[start, end]` window, whole seconds, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Chunk {
    /// Half-open timeframe sent when opening the backfill: the inclusive end
    /// is pushed forward by one second, so a chunk ending `23:59:59` is
    /// opened up to the following midnight.
    pub fn timeframe(&self) -> (OffsetDateTime, OffsetDateTime) {
        (self.start, self.end + Duration::SECOND)
    }

    /// Calendar days touched by this chunk, in order.
    pub fn days(&self) -> impl Iterator<Item = Date> {
        let last = self.end.date();
        std::iter::successors(Some(self.start.date()), move |d| d.next_day().filter(|n| *n <= last))
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Split `[start, end]` into contiguous chunks, each touching at most
/// `max_days` calendar days. Every chunk but the last ends at `23:59:59` and
/// the next one starts at the following midnight, so the chunks reconstruct
/// the range second-for-second. `start == end` yields one single-instant chunk.
pub fn chunk_range(start: OffsetDateTime, end: OffsetDateTime, max_days: u32) -> Vec<Chunk> {
    let span = i64::from(max_days.max(1)) - 1;
    let mut chunks = Vec::new();
    let mut current = start;

    while current <= end {
        let last_day = current.date().saturating_add(Duration::days(span));
        let day_end = last_day.with_time(END_OF_DAY).assume_offset(current.offset());
        let chunk_end = day_end.min(end);

        chunks.push(Chunk {
            start: current,
            end: chunk_end,
        });
        current = chunk_end + Duration::SECOND;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn short_range_collapses_to_single_chunk() {
        let chunks = chunk_range(
            datetime!(2025-01-01 00:00:00 UTC),
            datetime!(2025-01-03 23:59:59 UTC),
            MAX_DAYS_PER_CHUNK,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].days().count(), 3);
    }

    #[test]
    fn zero_length_range_is_one_chunk() {
        let at = datetime!(2025-03-04 10:15:00 UTC);
        let chunks = chunk_range(at, at, MAX_DAYS_PER_CHUNK);
        assert_eq!(chunks, vec![Chunk { start: at, end: at }]);
        assert_eq!(chunks[0].timeframe().1, datetime!(2025-03-04 10:15:01 UTC));
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let chunks = chunk_range(
            datetime!(2025-01-02 00:00:00 UTC),
            datetime!(2025-01-01 00:00:00 UTC),
            MAX_DAYS_PER_CHUNK,
        );
        assert!(chunks.is_empty());
    }

    #[test]
    fn long_range_is_contiguous_and_bounded() {
        let start = datetime!(2025-01-01 10:30:00 UTC);
        let end = datetime!(2025-02-14 08:00:00 UTC);
        let chunks = chunk_range(start, end, MAX_DAYS_PER_CHUNK);

        assert_eq!(chunks.first().unwrap().start, start);
        assert_eq!(chunks.last().unwrap().end, end);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end + Duration::SECOND, pair[1].start);
        }
        for c in &chunks {
            assert!(c.start <= c.end);
            assert!(c.days().count() <= MAX_DAYS_PER_CHUNK as usize);
        }
        // Jan 1..10, 11..20, 21..30, Jan 31..Feb 9, Feb 10..14
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[1].start, datetime!(2025-01-11 00:00:00 UTC));
        assert_eq!(chunks[0].end, datetime!(2025-01-10 23:59:59 UTC));
    }

    #[test]
    fn day_aligned_chunk_timeframe_ends_at_next_midnight() {
        let chunks = chunk_range(
            datetime!(2025-01-01 00:00:00 UTC),
            datetime!(2025-01-12 23:59:59 UTC),
            MAX_DAYS_PER_CHUNK,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].timeframe(),
            (datetime!(2025-01-01 00:00:00 UTC), datetime!(2025-01-11 00:00:00 UTC))
        );
        assert_eq!(
            chunks[1].timeframe(),
            (datetime!(2025-01-11 00:00:00 UTC), datetime!(2025-01-13 00:00:00 UTC))
        );
    }

    #[test]
    fn zero_max_days_is_treated_as_one() {
        let chunks = chunk_range(
            datetime!(2025-01-01 00:00:00 UTC),
            datetime!(2025-01-03 12:00:00 UTC),
            0,
        );
        assert_eq!(chunks.len(), 3);
    }
}
