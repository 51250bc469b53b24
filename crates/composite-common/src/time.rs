//! Calendars and gridded time series.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, CompositeResult};
use crate::grid::GridAxes;

/// CF calendars found in model history and observation files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Gregorian calendar with leap years.
    #[default]
    Standard,
    /// 365-day calendar used by ELM.
    NoLeap,
}

impl Calendar {
    /// Number of days in `month` (1-12) of `year`.
    pub fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => {
                let leap = NaiveDate::from_ymd_opt(year, 2, 29).is_some();
                if leap && *self == Calendar::Standard {
                    29
                } else {
                    28
                }
            }
            _ => 0,
        }
    }

    /// Offset a reference date by a (possibly fractional) number of days.
    ///
    /// Fractions are truncated toward the start of the day.
    pub fn add_days(&self, reference: NaiveDate, days: f64) -> CompositeResult<NaiveDate> {
        if !days.is_finite() {
            return Err(CompositeError::format("non-finite time offset"));
        }
        // 30.9999999 from float round-off still means day 31
        let whole = (days + 1e-6).floor() as i64;
        match self {
            Calendar::Standard => reference
                .checked_add_signed(Duration::days(whole))
                .ok_or_else(|| CompositeError::format(format!("time offset {} out of range", days))),
            Calendar::NoLeap => self.add_days_noleap(reference, whole),
        }
    }

    /// Whole days from `reference` to `date` in this calendar.
    pub fn days_since(&self, reference: NaiveDate, date: NaiveDate) -> CompositeResult<i64> {
        match self {
            Calendar::Standard => Ok((date - reference).num_days()),
            Calendar::NoLeap => {
                let years = (date.year() - reference.year()) as i64;
                Ok(years * 365 + self.noleap_day_of_year(date)? - self.noleap_day_of_year(reference)?)
            }
        }
    }

    /// Zero-based day of year with February fixed at 28 days.
    fn noleap_day_of_year(&self, date: NaiveDate) -> CompositeResult<i64> {
        if date.month() == 2 && date.day() == 29 {
            return Err(CompositeError::format(format!(
                "{} does not exist in a noleap calendar",
                date
            )));
        }
        Ok((1..date.month())
            .map(|m| Calendar::NoLeap.days_in_month(2001, m) as i64)
            .sum::<i64>()
            + date.day() as i64
            - 1)
    }

    fn add_days_noleap(&self, reference: NaiveDate, days: i64) -> CompositeResult<NaiveDate> {
        let mut doy = self.noleap_day_of_year(reference)? + days;
        let year = reference.year() as i64 + doy.div_euclid(365);
        doy = doy.rem_euclid(365);

        let mut month = 1;
        while doy >= self.days_in_month(2001, month) as i64 {
            doy -= self.days_in_month(2001, month) as i64;
            month += 1;
        }
        let year = i32::try_from(year)
            .map_err(|_| CompositeError::format(format!("year {} out of range", year)))?;
        NaiveDate::from_ymd_opt(year, month, doy as u32 + 1)
            .ok_or_else(|| CompositeError::format(format!("invalid date {}-{}", year, month)))
    }
}

impl FromStr for Calendar {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Standard),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            other => Err(CompositeError::format(format!("unsupported calendar '{}'", other))),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Standard => f.write_str("standard"),
            Calendar::NoLeap => f.write_str("noleap"),
        }
    }
}

/// Sampling interval of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStep {
    Monthly,
    Daily,
}

/// A gridded time series, `[time][layer][lat][lon]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesField {
    pub name: String,
    pub units: Option<String>,
    pub calendar: Calendar,
    pub times: Vec<NaiveDate>,
    pub axes: GridAxes,
    pub data: Vec<f32>,
}

impl TimeSeriesField {
    pub fn new(
        name: impl Into<String>,
        calendar: Calendar,
        times: Vec<NaiveDate>,
        axes: GridAxes,
        data: Vec<f32>,
    ) -> CompositeResult<Self> {
        if data.len() != times.len() * axes.len() {
            return Err(CompositeError::format(format!(
                "time series data length {} does not match {} steps of {} values",
                data.len(),
                times.len(),
                axes.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            units: None,
            calendar,
            times,
            axes,
            data,
        })
    }

    pub fn ntimes(&self) -> usize {
        self.times.len()
    }

    /// Values of one time step.
    pub fn step(&self, t: usize) -> &[f32] {
        let n = self.axes.len();
        &self.data[t * n..(t + 1) * n]
    }

    /// Monthly if no timestamp falls on day 31, daily otherwise.
    pub fn time_step(&self) -> CompositeResult<TimeStep> {
        let max_day = self
            .times
            .iter()
            .map(|d| d.day())
            .max()
            .ok_or_else(|| CompositeError::format(format!("'{}' has no time steps", self.name)))?;
        Ok(if max_day < 31 {
            TimeStep::Monthly
        } else {
            TimeStep::Daily
        })
    }

    /// Distinct years in ascending order.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.times.iter().map(|d| d.year()).collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(Calendar::Standard.days_in_month(2004, 2), 29);
        assert_eq!(Calendar::NoLeap.days_in_month(2004, 2), 28);
        assert_eq!(Calendar::Standard.days_in_month(2001, 2), 28);
        assert_eq!(Calendar::NoLeap.days_in_month(2001, 7), 31);
        assert_eq!(Calendar::NoLeap.days_in_month(2001, 9), 30);
    }

    #[test]
    fn test_noleap_add_days() {
        let cal = Calendar::NoLeap;
        let base = date(2001, 1, 1);
        assert_eq!(cal.add_days(base, 31.0).unwrap(), date(2001, 2, 1));
        assert_eq!(cal.add_days(base, 59.0).unwrap(), date(2001, 3, 1));
        // 2004 is a leap year but noleap never has Feb 29
        assert_eq!(cal.add_days(date(2004, 1, 1), 59.0).unwrap(), date(2004, 3, 1));
        assert_eq!(cal.add_days(base, 365.0 * 3.0).unwrap(), date(2004, 1, 1));
        assert_eq!(cal.add_days(base, -1.0).unwrap(), date(2000, 12, 31));
        assert_eq!(cal.add_days(base, 30.9999999).unwrap(), date(2001, 2, 1));
    }

    #[test]
    fn test_days_since_inverts_add_days() {
        let base = date(2001, 1, 1);
        for cal in [Calendar::NoLeap, Calendar::Standard] {
            let d = date(2007, 8, 15);
            let n = cal.days_since(base, d).unwrap();
            assert_eq!(cal.add_days(base, n as f64).unwrap(), d);
        }
        assert!(Calendar::NoLeap.days_since(base, date(2004, 2, 29)).is_err());
    }

    #[test]
    fn test_standard_add_days() {
        let cal = Calendar::Standard;
        assert_eq!(cal.add_days(date(2004, 1, 1), 59.0).unwrap(), date(2004, 2, 29));
        assert!(cal.add_days(date(2004, 1, 1), f64::NAN).is_err());
    }

    #[test]
    fn test_calendar_parse() {
        assert_eq!("noleap".parse::<Calendar>().unwrap(), Calendar::NoLeap);
        assert_eq!("Gregorian".parse::<Calendar>().unwrap(), Calendar::Standard);
        assert!("360_day".parse::<Calendar>().is_err());
    }

    #[test]
    fn test_time_step_detection() {
        let axes = GridAxes::new(vec![0.0], vec![0.0]);
        let monthly = TimeSeriesField::new(
            "GPP",
            Calendar::NoLeap,
            vec![date(2001, 1, 15), date(2001, 2, 15)],
            axes.clone(),
            vec![1.0, 2.0],
        )
        .unwrap();
        assert_eq!(monthly.time_step().unwrap(), TimeStep::Monthly);

        let daily = TimeSeriesField::new(
            "GPP",
            Calendar::NoLeap,
            vec![date(2001, 1, 30), date(2001, 1, 31)],
            axes.clone(),
            vec![1.0, 2.0],
        )
        .unwrap();
        assert_eq!(daily.time_step().unwrap(), TimeStep::Daily);

        let empty = TimeSeriesField::new("GPP", Calendar::NoLeap, vec![], axes, vec![]).unwrap();
        assert!(empty.time_step().is_err());
    }
}
