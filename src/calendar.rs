//! Month grid for the calendar view.

use chrono::{Datelike, Months, NaiveDate};
use std::str::FromStr;

use crate::models::FutsalEvent;

/// Column headings, Sunday first
pub const WEEKDAYS: [&str; 7] = ["日", "月", "火", "水", "木", "金", "土"];

/// A calendar month, always normalized to its first day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn prev(&self) -> Self {
        Self {
            first: self.first.checked_sub_months(Months::new(1)).unwrap_or(self.first),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            first: self.first.checked_add_months(Months::new(1)).unwrap_or(self.first),
        }
    }

    pub fn days_in_month(&self) -> u32 {
        let next = self.next().first;
        if next == self.first {
            31
        } else {
            (next - self.first).num_days() as u32
        }
    }

    /// "2024年 6月"
    pub fn title(&self) -> String {
        format!("{}年 {}月", self.year(), self.month())
    }

    /// `?month=` value, "2024-06"
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year.parse().map_err(|_| format!("bad year in '{}'", s))?;
        let month: u32 = month.parse().map_err(|_| format!("bad month in '{}'", s))?;
        Month::new(year, month).ok_or_else(|| format!("no such month '{}'", s))
    }
}

/// One cell of the grid; `None` cells are the blanks before day 1
#[derive(Debug, Clone)]
pub struct DayCell<'a> {
    pub date: NaiveDate,
    pub events: Vec<&'a FutsalEvent>,
}

/// Cells of a month: leading blanks so day 1 falls under its weekday,
/// then one cell per day with that day's events
pub fn month_grid<'a>(month: Month, events: &'a [FutsalEvent]) -> Vec<Option<DayCell<'a>>> {
    let leading = month.first_day().weekday().num_days_from_sunday() as usize;
    let mut cells: Vec<Option<DayCell<'a>>> = (0..leading).map(|_| None).collect();

    for day in 0..month.days_in_month() {
        let date = month.first_day() + chrono::Duration::days(day as i64);
        let mut day_events: Vec<&FutsalEvent> = events.iter().filter(|e| e.date == date).collect();
        day_events.sort_by_key(|e| e.start_time);
        cells.push(Some(DayCell {
            date,
            events: day_events,
        }));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use chrono::NaiveTime;

    fn event(id: &str, date: NaiveDate) -> FutsalEvent {
        FutsalEvent {
            id: id.to_string(),
            title: id.to_string(),
            event_type: EventType::Match,
            date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            location: "Court".to_string(),
            description: String::new(),
            attendees: Vec::new(),
        }
    }

    #[test]
    fn test_leading_blanks_match_weekday_of_first() {
        // 2024-06-01 is a Saturday
        let month = Month::new(2024, 6).unwrap();
        let grid = month_grid(month, &[]);
        assert_eq!(grid.iter().take_while(|c| c.is_none()).count(), 6);
        assert_eq!(grid.len(), 6 + 30);
    }

    #[test]
    fn test_events_land_on_their_day() {
        let month = Month::new(2024, 2).unwrap();
        let events = vec![
            event("leap", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            event("march", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        ];
        let grid = month_grid(month, &events);
        let cells: Vec<&DayCell> = grid.iter().flatten().collect();

        assert_eq!(cells.len(), 29);
        assert_eq!(cells[28].events.len(), 1);
        assert_eq!(cells[28].events[0].id, "leap");
        assert!(cells.iter().all(|c| c.events.iter().all(|e| e.id != "march")));
    }

    #[test]
    fn test_navigation_crosses_years() {
        let january = Month::new(2025, 1).unwrap();
        assert_eq!(january.prev().key(), "2024-12");
        assert_eq!(january.prev().next(), january);
        assert_eq!(january.title(), "2025年 1月");
        assert_eq!("2024-12".parse::<Month>(), Ok(january.prev()));
        assert!("2024-13".parse::<Month>().is_err());
    }
}
