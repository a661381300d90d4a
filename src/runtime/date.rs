//! Calendar dates without a time component, counted in days since
//! 1970-01-01 (proleptic Gregorian).

use std::fmt::Write as _;

use super::string::RtString;
use super::trap::rt_trap;

/// Sentinel returned by the runtime entry points for an unparsable date.
pub const INVALID_DATE: i64 = i64::MIN;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

const DAY_NAMES: [&str; 7] = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

/// Upper bound on formatted output.
const FORMAT_BUF: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateOnly {
    days: i64,
}

pub fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

// Howard Hinnant's days_from_civil / civil_from_days.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

impl DateOnly {
    pub fn from_ymd(year: i64, month: i64, day: i64) -> Option<DateOnly> {
        if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month) {
            return None;
        }
        if !(-1_000_000..=1_000_000).contains(&year) {
            return None;
        }
        Some(DateOnly { days: days_from_civil(year, month, day) })
    }

    pub fn from_days(days: i64) -> DateOnly {
        DateOnly { days }
    }

    /// Strict `YYYY-MM-DD`.
    pub fn parse_iso(text: &str) -> Option<DateOnly> {
        let b = text.as_bytes();
        if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
            return None;
        }
        let num = |r: std::ops::Range<usize>| -> Option<i64> {
            let part = &text[r];
            part.bytes().all(|c| c.is_ascii_digit()).then(|| part.parse().ok()).flatten()
        };
        DateOnly::from_ymd(num(0..4)?, num(5..7)?, num(8..10)?)
    }

    pub fn today() -> DateOnly {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        DateOnly { days: secs.div_euclid(86_400) }
    }

    pub fn days(self) -> i64 {
        self.days
    }

    pub fn ymd(self) -> (i64, i64, i64) {
        civil_from_days(self.days)
    }

    pub fn year(self) -> i64 {
        self.ymd().0
    }

    pub fn month(self) -> i64 {
        self.ymd().1
    }

    pub fn day(self) -> i64 {
        self.ymd().2
    }

    /// 0 = Sunday .. 6 = Saturday.
    pub fn day_of_week(self) -> i64 {
        // 1970-01-01 was a Thursday.
        (self.days + 4).rem_euclid(7)
    }

    /// 1-based ordinal day within the year.
    pub fn day_of_year(self) -> i64 {
        let (y, _, _) = self.ymd();
        self.days - days_from_civil(y, 1, 1) + 1
    }

    pub fn is_leap_year(self) -> bool {
        is_leap_year(self.year())
    }

    pub fn days_in_month(self) -> i64 {
        let (y, m, _) = self.ymd();
        days_in_month(y, m)
    }

    pub fn add_days(self, n: i64) -> DateOnly {
        match self.days.checked_add(n) {
            Some(days) => DateOnly { days },
            None => rt_trap("DateOnly.AddDays: overflow"),
        }
    }

    /// Month arithmetic clamps the day to the target month's length.
    pub fn add_months(self, n: i64) -> DateOnly {
        let (y, m, d) = self.ymd();
        let total = y * 12 + (m - 1) + n;
        let ny = total.div_euclid(12);
        let nm = total.rem_euclid(12) + 1;
        let nd = d.min(days_in_month(ny, nm));
        DateOnly { days: days_from_civil(ny, nm, nd) }
    }

    pub fn add_years(self, n: i64) -> DateOnly {
        self.add_months(n * 12)
    }

    pub fn diff_days(self, other: DateOnly) -> i64 {
        self.days - other.days
    }

    pub fn start_of_month(self) -> DateOnly {
        let (y, m, _) = self.ymd();
        DateOnly { days: days_from_civil(y, m, 1) }
    }

    pub fn end_of_month(self) -> DateOnly {
        let (y, m, _) = self.ymd();
        DateOnly { days: days_from_civil(y, m, days_in_month(y, m)) }
    }

    pub fn start_of_year(self) -> DateOnly {
        DateOnly { days: days_from_civil(self.year(), 1, 1) }
    }

    pub fn end_of_year(self) -> DateOnly {
        DateOnly { days: days_from_civil(self.year(), 12, 31) }
    }

    pub fn compare(self, other: DateOnly) -> i64 {
        match self.cmp(&other) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }

    pub fn to_iso(self) -> String {
        let (y, m, d) = self.ymd();
        format!("{y:04}-{m:02}-{d:02}")
    }

    /// Format with `%Y %m %d %B %b %A %a %%`; other characters copy through.
    /// Output is truncated to a fixed buffer size.
    pub fn format(self, fmt: &str) -> String {
        let (y, m, d) = self.ymd();
        let month = MONTH_NAMES[(m - 1) as usize];
        let weekday = DAY_NAMES[self.day_of_week() as usize];
        let mut out = String::new();
        let mut chars = fmt.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
            } else {
                let _ = match chars.next() {
                    Some('Y') => write!(out, "{y:04}"),
                    Some('m') => write!(out, "{m:02}"),
                    Some('d') => write!(out, "{d:02}"),
                    Some('B') => write!(out, "{month}"),
                    Some('b') => write!(out, "{}", &month[..3]),
                    Some('A') => write!(out, "{weekday}"),
                    Some('a') => write!(out, "{}", &weekday[..3]),
                    Some('%') => write!(out, "%"),
                    Some(other) => write!(out, "%{other}"),
                    None => write!(out, "%"),
                };
            }
            if out.len() >= FORMAT_BUF {
                break;
            }
        }
        if out.len() > FORMAT_BUF - 1 {
            let mut cut = FORMAT_BUF - 1;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
        }
        out
    }
}

impl std::fmt::Display for DateOnly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso())
    }
}

// Runtime entry points operate on the day count so dates travel as `i64`.

pub fn rt_date_from_ymd(y: i64, m: i64, d: i64) -> i64 {
    match DateOnly::from_ymd(y, m, d) {
        Some(date) => date.days(),
        None => rt_trap(&format!("DateOnly.Create: invalid date {y:04}-{m:02}-{d:02}")),
    }
}

pub fn rt_date_parse(s: &RtString) -> i64 {
    DateOnly::parse_iso(&s.to_string_lossy()).map_or(INVALID_DATE, DateOnly::days)
}

pub fn rt_date_today() -> i64 {
    DateOnly::today().days()
}

pub fn rt_date_year(d: i64) -> i64 {
    DateOnly::from_days(d).year()
}

pub fn rt_date_month(d: i64) -> i64 {
    DateOnly::from_days(d).month()
}

pub fn rt_date_day(d: i64) -> i64 {
    DateOnly::from_days(d).day()
}

pub fn rt_date_day_of_week(d: i64) -> i64 {
    DateOnly::from_days(d).day_of_week()
}

pub fn rt_date_day_of_year(d: i64) -> i64 {
    DateOnly::from_days(d).day_of_year()
}

pub fn rt_date_is_leap_year(year: i64) -> bool {
    is_leap_year(year)
}

pub fn rt_date_days_in_month(year: i64, month: i64) -> i64 {
    days_in_month(year, month)
}

pub fn rt_date_add_days(d: i64, n: i64) -> i64 {
    DateOnly::from_days(d).add_days(n).days()
}

pub fn rt_date_add_months(d: i64, n: i64) -> i64 {
    DateOnly::from_days(d).add_months(n).days()
}

pub fn rt_date_add_years(d: i64, n: i64) -> i64 {
    DateOnly::from_days(d).add_years(n).days()
}

pub fn rt_date_diff_days(a: i64, b: i64) -> i64 {
    DateOnly::from_days(a).diff_days(DateOnly::from_days(b))
}

pub fn rt_date_start_of_month(d: i64) -> i64 {
    DateOnly::from_days(d).start_of_month().days()
}

pub fn rt_date_end_of_month(d: i64) -> i64 {
    DateOnly::from_days(d).end_of_month().days()
}

pub fn rt_date_start_of_year(d: i64) -> i64 {
    DateOnly::from_days(d).start_of_year().days()
}

pub fn rt_date_end_of_year(d: i64) -> i64 {
    DateOnly::from_days(d).end_of_year().days()
}

pub fn rt_date_compare(a: i64, b: i64) -> i64 {
    DateOnly::from_days(a).compare(DateOnly::from_days(b))
}

pub fn rt_date_equals(a: i64, b: i64) -> bool {
    a == b
}

pub fn rt_date_to_iso(d: i64) -> RtString {
    RtString::from_str(&DateOnly::from_days(d).to_iso())
}

pub fn rt_date_format(d: i64, fmt: &RtString) -> RtString {
    RtString::from_str(&DateOnly::from_days(d).format(&fmt.to_string_lossy()))
}
