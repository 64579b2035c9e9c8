use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Number of calendar months in one acquisition season.
pub const SEASON_MONTHS: usize = 16;

/// One calendar month, the unit of a single prediction request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct MonthWindow {
    year: i32,
    month: u32,
}

impl MonthWindow {
    /// Returns `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// First day of the month.
    pub fn start_date(self) -> NaiveDate {
        // Month is validated on construction; day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive).
    pub fn end_date(self) -> NaiveDate {
        self.next().start_date() - Duration::days(1)
    }

    pub fn days(self) -> u32 {
        days_in_month(self.year, self.month).unwrap_or(0)
    }

    /// The following calendar month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Whether `date` falls inside this month.
    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The fixed season window for `year`: Nov/Dec of `year - 1`, all of `year`,
    /// Jan/Feb of `year + 1`, in chronological order.
    pub fn season(year: i32) -> [MonthWindow; SEASON_MONTHS] {
        let mut window = MonthWindow {
            year: year - 1,
            month: 11,
        };
        let mut months = [window; SEASON_MONTHS];
        for slot in months.iter_mut().skip(1) {
            window = window.next();
            *slot = window;
        }
        months
    }
}

impl Display for MonthWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_month_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_day_of_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1)?;
    let last_day_of_current_month = first_day_of_next_month - Duration::days(1);
    Some(last_day_of_current_month.day())
}
