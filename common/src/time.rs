use chrono::{DateTime, NaiveTime, Utc};

/// Milliseconds since the Unix epoch, for message headers.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Today at 00:00 UTC. Used as the default zero timepoint of an auction
/// session: every relative time in an STN is measured from this origin.
pub fn today_midnight() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}
