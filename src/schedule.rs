//! Business Hours Module
//!
//! Optional window outside of which arrivals are not alerted. Vehicles that
//! arrive out of hours are not recorded, so they are alerted on the first
//! cycle inside the window if they are still in range.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

/// Days and `[open, close)` hours during which alerts go out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub days: Vec<Weekday>,
}

impl BusinessHours {
    /// Monday to Friday
    pub const WEEKDAYS: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    pub fn new(open_hour: u32, close_hour: u32, days: Vec<Weekday>) -> Result<Self, String> {
        if open_hour >= close_hour || close_hour > 24 {
            return Err(format!(
                "invalid business hours {}-{}, expected 0 <= start < end <= 24",
                open_hour, close_hour
            ));
        }
        if days.is_empty() {
            return Err("business days list is empty".into());
        }
        Ok(Self {
            open_hour,
            close_hour,
            days,
        })
    }

    /// Whether alerts may go out at `at` (local wall-clock time)
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.days.contains(&at.weekday())
            && at.hour() >= self.open_hour
            && at.hour() < self.close_hour
    }

    /// Parse a `mon,tue,...` list
    pub fn parse_days(s: &str) -> Result<Vec<Weekday>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                Weekday::from_str(d).map_err(|_| format!("unknown weekday '{}'", d))
            })
            .collect()
    }
}

/// `START-END`, e.g. `8-18`
impl FromStr for BusinessHours {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (open, close) = s
            .split_once('-')
            .ok_or_else(|| format!("expected START-END hours, got '{}'", s))?;
        let open = open
            .trim()
            .parse()
            .map_err(|_| format!("bad opening hour '{}'", open))?;
        let close = close
            .trim()
            .parse()
            .map_err(|_| format!("bad closing hour '{}'", close))?;
        Self::new(open, close, Self::WEEKDAYS.to_vec())
    }
}

impl fmt::Display for BusinessHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days.iter().map(|d| d.to_string()).collect();
        write!(
            f,
            "{:02}h-{:02}h on {}",
            self.open_hour,
            self.close_hour,
            days.join(",")
        )
    }
}
