use orb_client::domain::Event;
use rand::Rng;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::{chunk::Chunk, config::JobConfig};

use super::properties::{generate_properties, random_uuid};

pub const DEFAULT_FIXED_TIME: Time = time::macros::time!(12:00:00);

const IDEMPOTENCY_PREFIX: &str = "ORB_GENERATED";
const IDEMPOTENCY_SUFFIX_LEN: usize = 16;

const LAST_SECOND_OF_DAY: u32 = 86_399;
const NOON: u32 = 43_200;

/// How many events to produce for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsPerDay {
    Exact(u32),
    Range { min: u32, max: u32 },
}

impl EventsPerDay {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match *self {
            Self::Exact(n) => n,
            Self::Range { min, max } if min >= max => min,
            Self::Range { min, max } => rng.random_range(min..=max),
        }
    }

    /// Lowest count a day may carry. Partial days never scale below it.
    pub fn floor(&self) -> u32 {
        match *self {
            Self::Exact(_) => 0,
            Self::Range { min, .. } => min,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Exact(n) => n.to_string(),
            Self::Range { min, max } => format!("random between {min} and {max}"),
        }
    }
}

/// Where in a day generated timestamps land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Every event of a day shares one time of day; the daily count is
    /// sampled from `EventsPerDay`.
    FixedTime(Time),
    /// Events are spaced evenly across the part of each day that falls
    /// inside the range; partial first and last days get a proportionally
    /// scaled count.
    EvenSpread,
}

impl Distribution {
    pub fn describe(&self) -> String {
        match self {
            Self::FixedTime(at) => format!("fixed time {at}"),
            Self::EvenSpread => "even spread".to_string(),
        }
    }
}

/// `<job id or ORB_GENERATED>_<16 hex chars>`.
pub fn idempotency_key<R: Rng + ?Sized>(job_id: Option<&str>, rng: &mut R) -> String {
    let prefix = job_id.filter(|j| !j.is_empty()).unwrap_or(IDEMPOTENCY_PREFIX);
    let suffix = random_uuid(rng).simple().to_string();
    format!("{prefix}_{}", &suffix[..IDEMPOTENCY_SUFFIX_LEN])
}

/// Generate every event for one chunk according to the job's distribution.
pub fn synthesize<R: Rng + ?Sized>(job: &JobConfig, chunk: &Chunk, rng: &mut R) -> Vec<Event> {
    let events = match job.distribution {
        Distribution::FixedTime(at) => fixed_time_events(job, chunk, at, rng),
        Distribution::EvenSpread => even_spread_events(job, chunk, rng),
    };

    metrics::counter!("backfill_events_generated_total").increment(events.len() as u64);
    events
}

fn fixed_time_events<R: Rng + ?Sized>(job: &JobConfig, chunk: &Chunk, at: Time, rng: &mut R) -> Vec<Event> {
    let mut events = Vec::new();
    let mut days: u32 = 0;

    for day in chunk.days() {
        let count = job.events_per_day.sample(rng);
        let ts = day.with_time(at).assume_utc();
        for _ in 0..count {
            events.push(make_event(job, ts, rng));
        }
        days += 1;
    }

    if days > 0 {
        tracing::info!(
            events = events.len(),
            days,
            average_per_day = events.len() as f64 / f64::from(days),
            "generated fixed-time events"
        );
    }
    events
}

fn even_spread_events<R: Rng + ?Sized>(job: &JobConfig, chunk: &Chunk, rng: &mut R) -> Vec<Event> {
    let first = chunk.start.date();
    let last = chunk.end.date();
    let mut events = Vec::new();

    for day in chunk.days() {
        let target = job.events_per_day.sample(rng);
        let window_start = if day == first { second_of_day(chunk.start) } else { 0 };
        let window_end = if day == last {
            second_of_day(chunk.end)
        } else {
            LAST_SECOND_OF_DAY
        };
        let full_day = window_start == 0 && window_end == LAST_SECOND_OF_DAY;

        let scaled = if full_day || first == last {
            target
        } else if day == first {
            scaled_count(target, 24 - u32::from(chunk.start.hour()))
        } else {
            scaled_count(target, u32::from(chunk.end.hour()) + 1)
        };
        let count = scaled.max(job.events_per_day.floor());

        for offset in spread_offsets(window_start, window_end, count, full_day) {
            events.push(make_event(job, at_second(day, offset), rng));
        }
    }

    events
}

/// Offsets (seconds since midnight) for `count` events spaced evenly over
/// `[window_start, window_end]`. A lone event sits at the window midpoint,
/// or at noon when the window is the whole day.
pub fn spread_offsets(window_start: u32, window_end: u32, count: u32, full_day: bool) -> Vec<u32> {
    let available = u64::from(window_end.saturating_sub(window_start));

    match count {
        0 => Vec::new(),
        1 if full_day => vec![NOON],
        1 => vec![window_start + (available / 2) as u32],
        n => {
            let steps = u64::from(n - 1);
            (0..u64::from(n))
                .map(|i| window_start + (available * i / steps) as u32)
                .collect()
        }
    }
}

/// Daily target scaled to the hours of a partial day, never below one
/// event unless the target itself is zero.
fn scaled_count(target: u32, available_hours: u32) -> u32 {
    if target == 0 {
        return 0;
    }
    let scaled = u64::from(target) * u64::from(available_hours) / 24;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

fn second_of_day(ts: OffsetDateTime) -> u32 {
    let (h, m, s) = ts.to_hms();
    u32::from(h) * 3600 + u32::from(m) * 60 + u32::from(s)
}

fn at_second(day: Date, offset: u32) -> OffsetDateTime {
    day.midnight().assume_utc() + Duration::seconds(i64::from(offset))
}

fn make_event<R: Rng + ?Sized>(job: &JobConfig, timestamp: OffsetDateTime, rng: &mut R) -> Event {
    Event {
        external_customer_id: job.external_customer_id.clone(),
        event_name: job.event_name.clone(),
        timestamp,
        idempotency_key: idempotency_key(job.job_id.as_deref(), rng),
        properties: generate_properties(&job.properties, rng),
    }
}
