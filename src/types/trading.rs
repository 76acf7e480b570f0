use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    M1,   // 1 minute
    #[serde(rename = "5m")]
    M5,   // 5 minutes
    #[serde(rename = "15m")]
    M15,  // 15 minutes
    #[serde(rename = "1h")]
    H1,   // 1 hour
    #[serde(rename = "4h")]
    H4,   // 4 hours
    #[serde(rename = "1d")]
    D1,   // 1 day
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::M1 => "1m",
            TimeFrame::M5 => "5m",
            TimeFrame::M15 => "15m",
            TimeFrame::H1 => "1h",
            TimeFrame::H4 => "4h",
            TimeFrame::D1 => "1d",
        }
    }

    pub fn to_minutes(&self) -> u64 {
        match self {
            TimeFrame::M1 => 1,
            TimeFrame::M5 => 5,
            TimeFrame::M15 => 15,
            TimeFrame::H1 => 60,
            TimeFrame::H4 => 240,
            TimeFrame::D1 => 1440,
        }
    }

    pub fn to_milliseconds(&self) -> u64 {
        self.to_minutes() * 60 * 1000
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "m1" => Ok(TimeFrame::M1),
            "5m" | "m5" => Ok(TimeFrame::M5),
            "15m" | "m15" => Ok(TimeFrame::M15),
            "1h" | "h1" | "60m" => Ok(TimeFrame::H1),
            "4h" | "h4" => Ok(TimeFrame::H4),
            "1d" | "d1" => Ok(TimeFrame::D1),
            _ => Err(format!("Unknown interval: {}", s)),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Look-back window used when no explicit start date is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HistoryPeriod {
    Days(u32),
    Months(u32),
    Years(u32),
    YearToDate,
    Max,
}

impl HistoryPeriod {
    /// First instant covered by this period when counting back from `now`.
    /// `Max` resolves to the Unix epoch; the exchange starts at the listing date.
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let epoch = Utc.timestamp_opt(0, 0).single().unwrap_or(now);
        match *self {
            HistoryPeriod::Days(days) => now
                .checked_sub_signed(Duration::days(days as i64))
                .unwrap_or(epoch),
            HistoryPeriod::Months(months) => now
                .checked_sub_months(Months::new(months))
                .unwrap_or(epoch),
            HistoryPeriod::Years(years) => now
                .checked_sub_months(Months::new(years.saturating_mul(12)))
                .unwrap_or(epoch),
            HistoryPeriod::YearToDate => NaiveDate::from_ymd_opt(now.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
                .unwrap_or(epoch),
            HistoryPeriod::Max => epoch,
        }
    }
}

impl Default for HistoryPeriod {
    fn default() -> Self {
        HistoryPeriod::Years(1)
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "max" => return Ok(HistoryPeriod::Max),
            "ytd" => return Ok(HistoryPeriod::YearToDate),
            _ => {}
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Period is missing a unit: {}", s))?;
        let (amount, unit) = s.split_at(split);
        let amount: u32 = amount
            .parse()
            .map_err(|_| format!("Invalid period amount: {}", s))?;
        if amount == 0 {
            return Err(format!("Period must be positive: {}", s));
        }

        match unit {
            "d" => Ok(HistoryPeriod::Days(amount)),
            "mo" => Ok(HistoryPeriod::Months(amount)),
            "y" => Ok(HistoryPeriod::Years(amount)),
            _ => Err(format!("Unknown period unit '{}' (use d, mo, y, ytd or max)", unit)),
        }
    }
}

impl TryFrom<String> for HistoryPeriod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistoryPeriod> for String {
    fn from(period: HistoryPeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryPeriod::Days(n) => write!(f, "{}d", n),
            HistoryPeriod::Months(n) => write!(f, "{}mo", n),
            HistoryPeriod::Years(n) => write!(f, "{}y", n),
            HistoryPeriod::YearToDate => write!(f, "ytd"),
            HistoryPeriod::Max => write!(f, "max"),
        }
    }
}
