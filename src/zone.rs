//! # Time zones
//!
//! A fixed table of representative zones, each a standard offset from UTC plus the daylight
//! saving rule it follows. The settings record stores an index into [`ZONES`].
//!
//! Computing DST boundaries needs calendar arithmetic, so the current offset of every zone is
//! cached in a [`DstCache`] which the runtime refreshes every half hour.

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::logging::debug;

/// Daylight saving rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rule {
    /// Standard time all year
    None,
    /// Last Sunday of March to last Sunday of October, switching at 01:00 UTC
    Eu,
    /// Second Sunday of March to first Sunday of November, switching at 02:00 local time
    NorthAmerica,
    /// First Sunday of October to first Sunday of April, switching at 02:00 standard time
    Australia,
    /// Last Sunday of September to first Sunday of April, switching at 02:00 standard time
    NewZealand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub name: &'static str,
    /// Standard offset from UTC (minutes)
    pub offset: i16,
    pub rule: Rule,
}

const fn zone(name: &'static str, offset: i16, rule: Rule) -> Zone {
    Zone { name, offset, rule }
}

pub const ZONE_COUNT: usize = 52;

#[rustfmt::skip]
pub static ZONES: [Zone; ZONE_COUNT] = [
    zone("UTC",             0,    Rule::None),
    zone("London",          0,    Rule::Eu),
    zone("Dublin",          0,    Rule::Eu),
    zone("Lisbon",          0,    Rule::Eu),
    zone("Reykjavik",       0,    Rule::None),
    zone("Berlin",          60,   Rule::Eu),
    zone("Paris",           60,   Rule::Eu),
    zone("Lagos",           60,   Rule::None),
    zone("Athens",          120,  Rule::Eu),
    zone("Cairo",           120,  Rule::None),
    zone("Johannesburg",    120,  Rule::None),
    zone("Moscow",          180,  Rule::None),
    zone("Istanbul",        180,  Rule::None),
    zone("Dubai",           240,  Rule::None),
    zone("Tehran",          210,  Rule::None),
    zone("Kabul",           270,  Rule::None),
    zone("Karachi",         300,  Rule::None),
    zone("Kolkata",         330,  Rule::None),
    zone("Kathmandu",       345,  Rule::None),
    zone("Dhaka",           360,  Rule::None),
    zone("Yangon",          390,  Rule::None),
    zone("Bangkok",         420,  Rule::None),
    zone("Shanghai",        480,  Rule::None),
    zone("Singapore",       480,  Rule::None),
    zone("Perth",           480,  Rule::None),
    zone("Tokyo",           540,  Rule::None),
    zone("Seoul",           540,  Rule::None),
    zone("Adelaide",        570,  Rule::Australia),
    zone("Darwin",          570,  Rule::None),
    zone("Brisbane",        600,  Rule::None),
    zone("Sydney",          600,  Rule::Australia),
    zone("Noumea",          660,  Rule::None),
    zone("Auckland",        720,  Rule::NewZealand),
    zone("Tongatapu",       780,  Rule::None),
    zone("Kiritimati",      840,  Rule::None),
    zone("Baker Island",    -720, Rule::None),
    zone("Pago Pago",       -660, Rule::None),
    zone("Honolulu",        -600, Rule::None),
    zone("Anchorage",       -540, Rule::NorthAmerica),
    zone("Los Angeles",     -480, Rule::NorthAmerica),
    zone("Denver",          -420, Rule::NorthAmerica),
    zone("Phoenix",         -420, Rule::None),
    zone("Chicago",         -360, Rule::NorthAmerica),
    zone("Mexico City",     -360, Rule::None),
    zone("New York",        -300, Rule::NorthAmerica),
    zone("Bogota",          -300, Rule::None),
    zone("Halifax",         -240, Rule::NorthAmerica),
    zone("Caracas",         -240, Rule::None),
    zone("St. John's",      -210, Rule::NorthAmerica),
    zone("Sao Paulo",       -180, Rule::None),
    zone("South Georgia",   -120, Rule::None),
    zone("Azores",          -60,  Rule::Eu),
];

/// Seconds in a DST cache period
const CACHE_PERIOD: i64 = 30 * 60;

/// The zone at `index`, UTC if there is no such zone
pub fn get(index: u8) -> &'static Zone {
    match ZONES.get(index as usize) {
        Some(zone) => zone,
        None => {
            debug!("zone {} out of range", index);
            &ZONES[0]
        }
    }
}

/// Day of month of the `n`th Sunday
fn nth_sunday(year: i32, month: Month, n: u8) -> Option<u8> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let offset = (7 - first.weekday().number_days_from_sunday()) % 7;
    Some(1 + offset + (n - 1) * 7)
}

/// Day of month of the last Sunday, for 30 or 31 day months
fn last_sunday(year: i32, month: Month) -> Option<u8> {
    let days = match month {
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    };
    let last = Date::from_calendar_date(year, month, days).ok()?;
    Some(days - last.weekday().number_days_from_sunday())
}

/// Unix time of `hour`:00 UTC on the given day
fn at(year: i32, month: Month, day: u8, hour: i64) -> Option<i64> {
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let midnight = PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc();
    Some(midnight.unix_timestamp() + hour * 3600)
}

impl Zone {
    /// Offset from UTC (seconds) in effect at `unix`
    pub fn offset_at(&self, unix: i64) -> i32 {
        let dst = if self.is_dst(unix) { 3600 } else { 0 };
        self.offset as i32 * 60 + dst
    }

    pub fn is_dst(&self, unix: i64) -> bool {
        let Ok(utc) = time::OffsetDateTime::from_unix_timestamp(unix) else {
            return false;
        };

        match (self.rule, window(self.rule, utc.year(), self.offset as i64 * 60)) {
            (_, None) => false,
            // DST spans the new year
            (Rule::Australia | Rule::NewZealand, Some((start, end))) => unix >= start || unix < end,
            (_, Some((start, end))) => unix >= start && unix < end,
        }
    }
}

/// Unix times at which DST starts and ends in `year`, for a zone `standard` seconds from UTC
fn window(rule: Rule, year: i32, standard: i64) -> Option<(i64, i64)> {
    match rule {
        Rule::None => None,
        Rule::Eu => {
            let start = at(year, Month::March, last_sunday(year, Month::March)?, 1)?;
            let end = at(year, Month::October, last_sunday(year, Month::October)?, 1)?;
            Some((start, end))
        }
        Rule::NorthAmerica => {
            let start = at(year, Month::March, nth_sunday(year, Month::March, 2)?, 2)?;
            // 02:00 daylight time is 01:00 standard time
            let end = at(year, Month::November, nth_sunday(year, Month::November, 1)?, 1)?;
            Some((start - standard, end - standard))
        }
        Rule::Australia => {
            let start = at(year, Month::October, nth_sunday(year, Month::October, 1)?, 2)?;
            let end = at(year, Month::April, nth_sunday(year, Month::April, 1)?, 2)?;
            Some((start - standard, end - standard))
        }
        Rule::NewZealand => {
            let start = at(year, Month::September, last_sunday(year, Month::September)?, 2)?;
            let end = at(year, Month::April, nth_sunday(year, Month::April, 1)?, 2)?;
            Some((start - standard, end - standard))
        }
    }
}

/// Current offsets of every zone, valid for one half hour period
#[derive(Debug, Clone)]
pub struct DstCache {
    /// Offsets from UTC (seconds)
    offsets: [i32; ZONE_COUNT],
    period: Option<i64>,
}

impl Default for DstCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DstCache {
    pub const fn new() -> Self {
        Self {
            offsets: [0; ZONE_COUNT],
            period: None,
        }
    }

    /// Whether `unix` falls outside the period the cache was computed for
    pub fn is_stale(&self, unix: i64) -> bool {
        self.period != Some(unix.div_euclid(CACHE_PERIOD))
    }

    /// Recompute every zone's offset at `unix`. Returns whether any offset changed.
    pub fn refresh(&mut self, unix: i64) -> bool {
        let mut changed = false;
        for (cached, zone) in self.offsets.iter_mut().zip(ZONES.iter()) {
            let offset = zone.offset_at(unix);
            changed |= *cached != offset;
            *cached = offset;
        }
        self.period = Some(unix.div_euclid(CACHE_PERIOD));

        if changed {
            debug!("zone offsets changed");
        }
        changed
    }

    /// Cached offset (seconds) of the zone at `index`, UTC if there is no such zone
    pub fn offset(&self, index: u8) -> i32 {
        self.offsets.get(index as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn unix(dt: time::OffsetDateTime) -> i64 {
        dt.unix_timestamp()
    }

    fn index(name: &str) -> u8 {
        ZONES.iter().position(|z| z.name == name).unwrap() as u8
    }

    #[test]
    fn out_of_range_is_utc() {
        assert_eq!(get(200).name, "UTC");
        assert_eq!(get(0).offset, 0);
        assert!(ZONES.len() <= 64);
    }

    #[test]
    fn sundays() {
        // 2024-03-31 and 2024-10-27 are the EU changeover days
        assert_eq!(last_sunday(2024, Month::March), Some(31));
        assert_eq!(last_sunday(2024, Month::October), Some(27));
        assert_eq!(nth_sunday(2024, Month::March, 2), Some(10));
        assert_eq!(nth_sunday(2024, Month::November, 1), Some(3));
        assert_eq!(last_sunday(2024, Month::September), Some(29));
    }

    #[test]
    fn eu_rule() {
        let berlin = get(index("Berlin"));
        assert_eq!(berlin.offset_at(unix(datetime!(2024-01-15 12:00 UTC))), 3600);
        assert_eq!(berlin.offset_at(unix(datetime!(2024-03-31 00:59 UTC))), 3600);
        assert_eq!(berlin.offset_at(unix(datetime!(2024-03-31 01:00 UTC))), 7200);
        assert_eq!(berlin.offset_at(unix(datetime!(2024-10-27 00:59 UTC))), 7200);
        assert_eq!(berlin.offset_at(unix(datetime!(2024-10-27 01:00 UTC))), 3600);
    }

    #[test]
    fn north_america_rule() {
        let new_york = get(index("New York"));
        // 02:00 EST on 2024-03-10 is 07:00 UTC
        assert!(!new_york.is_dst(unix(datetime!(2024-03-10 06:59 UTC))));
        assert!(new_york.is_dst(unix(datetime!(2024-03-10 07:00 UTC))));
        // 02:00 EDT on 2024-11-03 is 06:00 UTC
        assert!(new_york.is_dst(unix(datetime!(2024-11-03 05:59 UTC))));
        assert!(!new_york.is_dst(unix(datetime!(2024-11-03 06:00 UTC))));
        assert_eq!(new_york.offset_at(unix(datetime!(2024-07-01 00:00 UTC))), -4 * 3600);
    }

    #[test]
    fn southern_rules() {
        let sydney = get(index("Sydney"));
        assert!(sydney.is_dst(unix(datetime!(2024-01-15 00:00 UTC))));
        assert!(!sydney.is_dst(unix(datetime!(2024-07-15 00:00 UTC))));
        assert!(sydney.is_dst(unix(datetime!(2024-12-15 00:00 UTC))));

        let auckland = get(index("Auckland"));
        assert_eq!(auckland.offset_at(unix(datetime!(2024-01-15 00:00 UTC))), 13 * 3600);
        assert_eq!(auckland.offset_at(unix(datetime!(2024-06-15 00:00 UTC))), 12 * 3600);
    }

    #[test]
    fn cache_periods() {
        let mut cache = DstCache::new();
        let summer = unix(datetime!(2024-07-01 12:00 UTC));

        assert!(cache.is_stale(summer));
        assert!(cache.refresh(summer));
        assert!(!cache.is_stale(summer + 29 * 60));
        assert!(cache.is_stale(summer + 30 * 60));
        assert!(cache.is_stale(summer - 1));

        assert_eq!(cache.offset(index("London")), 3600);
        assert_eq!(cache.offset(index("Kathmandu")), 345 * 60);
        assert_eq!(cache.offset(200), 0);

        assert!(!cache.refresh(summer + 30 * 60));
    }
}
