use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone as _};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::{OccupancyError, Result};

// ── Timezone resolution ───────────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name == "auto" || tz_name.parse::<Tz>().is_ok()
}

/// Resolve a configured zone name.  `"auto"` means the system zone.
pub fn resolve_timezone(tz_name: &str) -> Result<Tz> {
    let name = if tz_name == "auto" {
        get_system_timezone()
    } else {
        tz_name.to_string()
    };
    name.parse::<Tz>()
        .map_err(|_| OccupancyError::InvalidConfig(format!("unknown timezone \"{}\"", name)))
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Coerces timestamp cells into instants in the canonical zone.
///
/// Aware inputs are converted; naive inputs are first localised in the
/// source zone.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    canonical: Tz,
    source: Tz,
}

impl TimezoneHandler {
    /// `source` defaults to `canonical` when `None`.
    pub fn new(canonical: &str, source: Option<&str>) -> Result<Self> {
        let canonical = resolve_timezone(canonical)?;
        let source = match source {
            Some(name) => resolve_timezone(name)?,
            None => canonical,
        };
        Ok(Self { canonical, source })
    }

    pub fn canonical(&self) -> Tz {
        self.canonical
    }

    pub fn source(&self) -> Tz {
        self.source
    }

    /// Parse an ISO 8601 / RFC 3339 timestamp, a naive date-time or a bare
    /// date.  Returns `None` for empty strings or unrecognised formats.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Tz>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&self.canonical));
        }

        const AWARE_FMTS: &[&str] = &[
            "%Y-%m-%d %H:%M:%S%.f%:z",
            "%Y-%m-%d %H:%M:%S%:z",
            "%Y-%m-%dT%H:%M:%S%.f%z",
            "%Y-%m-%d %H:%M:%S%.f%z",
            "%Y-%m-%d %H:%M:%S%z",
        ];
        for fmt in AWARE_FMTS {
            if let Ok(dt) = DateTime::parse_from_str(&normalised, fmt) {
                return Some(dt.with_timezone(&self.canonical));
            }
        }

        const NAIVE_FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
        ];
        for fmt in NAIVE_FMTS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return self.localize(naive);
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return self.localize(date.and_time(chrono::NaiveTime::MIN));
        }

        debug!("TimezoneHandler: could not parse timestamp \"{}\"", s);
        None
    }

    /// Interpret `secs` as seconds since the Unix epoch (UTC).
    pub fn parse_epoch_seconds(&self, secs: f64) -> Option<DateTime<Tz>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.with_timezone(&self.canonical))
    }

    /// Attach the source zone to a wall-clock time and convert to the
    /// canonical zone.  Ambiguous times (DST fall-back) take the earlier
    /// instant; non-existent times (DST spring-forward) yield `None`.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        self.source
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&self.canonical))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
