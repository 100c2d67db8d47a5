//! Expected park attendance for a date.

use chrono::{DateTime, Datelike, Local, NaiveDate, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub date: NaiveDate,
    pub visitor_count: u32,
    pub day_type: String,
    pub description: String,
    pub timestamp: DateTime<Local>,
}

impl VisitorInfo {
    pub fn formatted(&self) -> String {
        format!("👥 游客量：{}", self.description)
    }
}

/// Day classification and its visitor range. Holidays win over weekends.
pub fn day_type(date: NaiveDate) -> (&'static str, RangeInclusive<u32>) {
    let (month, day) = (date.month(), date.day());

    if month == 10 && (1..=7).contains(&day) {
        ("国庆节假期", 26_000..=35_000)
    } else if month == 5 && (1..=7).contains(&day) {
        ("五一假期", 26_000..=35_000)
    } else if month == 7 || month == 8 {
        ("暑假", 25_000..=30_000)
    } else if (month == 1 && day >= 15) || (month == 2 && day <= 15) {
        ("寒假", 20_000..=25_000)
    } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        ("周末", 15_000..=21_000)
    } else {
        ("工作日", 12_000..=17_000)
    }
}

pub fn crowd_level(count: u32) -> &'static str {
    match count {
        30_000.. => "极高",
        25_000.. => "很高",
        20_000.. => "高",
        15_000.. => "较高",
        _ => "正常",
    }
}

pub struct VisitorService<R = rand::rngs::StdRng> {
    rng: Mutex<R>,
}

impl VisitorService {
    pub fn new() -> Self {
        use rand::SeedableRng;
        Self::with_rng(rand::rngs::StdRng::from_entropy())
    }
}

impl Default for VisitorService {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> VisitorService<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn fetch(&self) -> VisitorInfo {
        self.for_date(Local::now().date_naive())
    }

    pub fn for_date(&self, date: NaiveDate) -> VisitorInfo {
        let (day_type, range) = day_type(date);
        let visitor_count = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(range),
            Err(poisoned) => poisoned.into_inner().gen_range(range),
        };

        VisitorInfo {
            date,
            visitor_count,
            day_type: day_type.to_string(),
            description: format!(
                "{}，预计游客量{}人，人流量{}",
                day_type,
                visitor_count,
                crowd_level(visitor_count)
            ),
            timestamp: Local::now(),
        }
    }
}
