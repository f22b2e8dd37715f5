//! Timeout descriptors and their boundary conversion.
//!
//! Schemas may describe a timeout in many shapes (seconds, ISO-8601
//! durations, dates, callables producing any of those). `TimeoutSpec`
//! captures the raw input; converting it into a `Timeout` resolves the
//! shape once, at definition time, so the engine only ever sees an
//! absolute instant or a relative interval.

use super::error::DefinitionError;
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Deferred callables are re-interpreted at most this many times.
const MAX_DEFERRED_DEPTH: usize = 8;

const SECONDS_PER_DAY: i64 = 86_400;

/// Relative interval: calendar months followed by a fixed span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub months: u32,
    pub span: Duration,
}

impl Interval {
    /// Fixed span of whole seconds; fails past chrono's representable range.
    pub fn seconds(seconds: i64) -> Result<Self, DefinitionError> {
        Duration::try_seconds(seconds).map(Self::from).ok_or_else(|| {
            DefinitionError::invalid_timeout(seconds.to_string(), "duration is too large")
        })
    }

    /// Parse an ISO-8601 duration such as `P1DT2H` or `PT30S`.
    pub fn parse_iso8601(text: &str) -> Result<Self, DefinitionError> {
        let invalid = |reason: &str| DefinitionError::invalid_timeout(text, reason);

        let body = text
            .strip_prefix('P')
            .ok_or_else(|| invalid("duration must start with 'P'"))?;

        let mut months: u32 = 0;
        let mut seconds: i64 = 0;
        let mut in_time = false;
        let mut components = 0;
        let mut digits = String::new();

        for c in body.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if c == 'T' && !in_time && digits.is_empty() {
                in_time = true;
                continue;
            }

            let value: u32 = digits
                .parse()
                .map_err(|_| invalid("expected a number before each designator"))?;
            digits.clear();

            let overflow = || invalid("duration is too large");
            let unit = match (in_time, c) {
                (false, 'Y') => {
                    let add = value.checked_mul(12).ok_or_else(overflow)?;
                    months = months.checked_add(add).ok_or_else(overflow)?;
                    None
                }
                (false, 'M') => {
                    months = months.checked_add(value).ok_or_else(overflow)?;
                    None
                }
                (false, 'W') => Some(7 * SECONDS_PER_DAY),
                (false, 'D') => Some(SECONDS_PER_DAY),
                (true, 'H') => Some(3600),
                (true, 'M') => Some(60),
                (true, 'S') => Some(1),
                _ => return Err(invalid(&format!("unexpected designator '{c}'"))),
            };
            if let Some(unit) = unit {
                seconds = i64::from(value)
                    .checked_mul(unit)
                    .and_then(|add| seconds.checked_add(add))
                    .ok_or_else(overflow)?;
            }
            components += 1;
        }

        if !digits.is_empty() {
            return Err(invalid("number without designator"));
        }
        if components == 0 {
            return Err(invalid("duration has no components"));
        }

        let span =
            Duration::try_seconds(seconds).ok_or_else(|| invalid("duration is too large"))?;
        Ok(Self { months, span })
    }

    /// Add this interval to `instant`, saturating at the representable maximum.
    pub fn add_to(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant
            .checked_add_months(Months::new(self.months))
            .and_then(|shifted| shifted.checked_add_signed(self.span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl From<Duration> for Interval {
    fn from(span: Duration) -> Self {
        Self { months: 0, span }
    }
}

/// Resolved timeout: either a fixed instant or an interval relative to "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    At(DateTime<Utc>),
    After(Interval),
}

impl Timeout {
    /// Relative timeout of whole seconds.
    pub fn seconds(seconds: i64) -> Result<Self, DefinitionError> {
        Self::try_from(TimeoutSpec::Seconds(seconds))
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, Timeout::After(_))
    }

    /// Instant at which the timeout fires, using `now` as the reference
    /// for relative timeouts.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chrono::{Duration, TimeZone, Utc};
    /// use lifecycle::core::Timeout;
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
    ///
    /// let relative = Timeout::seconds(90).unwrap();
    /// assert_eq!(relative.timeout_at(now), now + Duration::seconds(90));
    ///
    /// let fixed = Timeout::At(now);
    /// assert_eq!(fixed.timeout_at(now + Duration::days(1)), now);
    /// ```
    pub fn timeout_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeout::At(instant) => *instant,
            Timeout::After(interval) => interval.add_to(now),
        }
    }
}

/// Callable producing another timeout description.
pub type TimeoutSource = Arc<dyn Fn() -> TimeoutSpec + Send + Sync>;

/// Raw timeout description as it appears at the schema boundary.
#[derive(Clone)]
pub enum TimeoutSpec {
    Instant(DateTime<Utc>),
    Interval(Interval),
    /// Whole seconds from now.
    Seconds(i64),
    /// Digits, an ISO-8601 duration, or a date/time string.
    Text(String),
    Deferred(TimeoutSource),
}

impl TimeoutSpec {
    pub fn deferred<F>(source: F) -> Self
    where
        F: Fn() -> TimeoutSpec + Send + Sync + 'static,
    {
        TimeoutSpec::Deferred(Arc::new(source))
    }

    fn resolve(self, depth: usize) -> Result<Timeout, DefinitionError> {
        match self {
            TimeoutSpec::Instant(instant) => Ok(Timeout::At(instant)),
            TimeoutSpec::Interval(interval) => Ok(Timeout::After(interval)),
            TimeoutSpec::Seconds(seconds) if seconds < 0 => Err(DefinitionError::invalid_timeout(
                seconds.to_string(),
                "seconds can not be negative",
            )),
            TimeoutSpec::Seconds(seconds) => Interval::seconds(seconds).map(Timeout::After),
            TimeoutSpec::Text(text) => parse_text(text.trim()),
            TimeoutSpec::Deferred(_) if depth >= MAX_DEFERRED_DEPTH => Err(
                DefinitionError::invalid_timeout("<deferred>", "too many levels of indirection"),
            ),
            TimeoutSpec::Deferred(source) => source().resolve(depth + 1),
        }
    }
}

impl fmt::Debug for TimeoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutSpec::Instant(instant) => f.debug_tuple("Instant").field(instant).finish(),
            TimeoutSpec::Interval(interval) => f.debug_tuple("Interval").field(interval).finish(),
            TimeoutSpec::Seconds(seconds) => f.debug_tuple("Seconds").field(seconds).finish(),
            TimeoutSpec::Text(text) => f.debug_tuple("Text").field(text).finish(),
            TimeoutSpec::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl TryFrom<TimeoutSpec> for Timeout {
    type Error = DefinitionError;

    fn try_from(spec: TimeoutSpec) -> Result<Self, Self::Error> {
        spec.resolve(0)
    }
}

impl From<i64> for TimeoutSpec {
    fn from(seconds: i64) -> Self {
        TimeoutSpec::Seconds(seconds)
    }
}

impl From<&str> for TimeoutSpec {
    fn from(text: &str) -> Self {
        TimeoutSpec::Text(text.to_string())
    }
}

impl From<String> for TimeoutSpec {
    fn from(text: String) -> Self {
        TimeoutSpec::Text(text)
    }
}

impl From<Duration> for TimeoutSpec {
    fn from(span: Duration) -> Self {
        TimeoutSpec::Interval(Interval::from(span))
    }
}

impl From<Interval> for TimeoutSpec {
    fn from(interval: Interval) -> Self {
        TimeoutSpec::Interval(interval)
    }
}

impl From<DateTime<Utc>> for TimeoutSpec {
    fn from(instant: DateTime<Utc>) -> Self {
        TimeoutSpec::Instant(instant)
    }
}

fn parse_text(text: &str) -> Result<Timeout, DefinitionError> {
    if text.is_empty() {
        return Err(DefinitionError::invalid_timeout(text, "empty value"));
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = text
            .parse()
            .map_err(|_| DefinitionError::invalid_timeout(text, "seconds out of range"))?;
        return Interval::seconds(seconds)
            .map(Timeout::After)
            .map_err(|_| DefinitionError::invalid_timeout(text, "duration is too large"));
    }
    if text.starts_with('P') {
        return Interval::parse_iso8601(text).map(Timeout::After);
    }
    parse_date(text).map(Timeout::At)
}

fn parse_date(text: &str) -> Result<DateTime<Utc>, DefinitionError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(instant) = DateTime::parse_from_rfc2822(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DefinitionError::invalid_timeout(text, "unrecognized date or duration"))
}
