use crate::domain::parse_opt_num;
use crate::upstream::types::RawDailyBar;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SEARCH_RADIUS_DAYS: i64 = 7;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub closes: BTreeMap<NaiveDate, f64>,
}

impl PriceHistory {
    pub fn from_series(series: &BTreeMap<String, RawDailyBar>) -> Self {
        let closes = series
            .iter()
            .filter_map(|(date, bar)| {
                let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
                let close = parse_opt_num(bar.close.as_deref())?;
                Some((date, close))
            })
            .collect();
        Self { closes }
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn close_near(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        search_offsets().find_map(|offset| {
            let day = date.checked_add_signed(Duration::days(offset))?;
            let close = *self.closes.get(&day)?;
            (close > 0.0).then_some((day, close))
        })
    }
}

// 0, +1, -1, +2, -2, ..., +7, -7
pub fn search_offsets() -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..=SEARCH_RADIUS_DAYS).flat_map(|n| [n, -n]))
}
