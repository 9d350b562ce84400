//! Weekday pattern projection ("copy from previous month").
//!
//! # Responsibility
//! - Derive a typical value per weekday and per field from the month before
//!   the target month.
//! - Expand those patterns onto every day of the target month.
//!
//! # Invariants
//! - Pure: reads the given entries only, performs no I/O.
//! - No qualifying source entry means no projection at all.
//! - Ties are won by the value that was counted first; source entries are
//!   visited in ascending date order.
//! - A weekday without observations projects a clearing value.

use crate::model::day_entry::DayEntry;
use crate::model::month::YearMonth;

const WEEKDAYS: usize = 7;

/// Per-weekday values written to every matching day of the target month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayPattern {
    pub text: String,
    pub symbol: Option<String>,
    pub stamp: Option<String>,
    pub time_from: String,
    pub time_to: String,
}

/// Result of projecting one month onto the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub source: YearMonth,
    pub target: YearMonth,
    /// Indexed by weekday, `0 = Sunday`.
    pub patterns: [WeekdayPattern; WEEKDAYS],
    /// One full replacement record per day of `target`, ascending.
    pub days: Vec<DayEntry>,
}

/// Frequency table preserving first-seen order.
#[derive(Debug, Default)]
struct Tally {
    counts: Vec<(String, u32)>,
}

impl Tally {
    fn observe(&mut self, value: &str) {
        match self.counts.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((value.to_string(), 1)),
        }
    }

    /// Highest count wins; on equal counts the earlier value is kept.
    fn plurality(&self) -> Option<&str> {
        let mut best: Option<(&str, u32)> = None;
        for (value, count) in &self.counts {
            if best.map_or(true, |(_, best_count)| *count > best_count) {
                best = Some((value.as_str(), *count));
            }
        }
        best.map(|(value, _)| value)
    }
}

#[derive(Debug, Default)]
struct WeekdayTally {
    text: Tally,
    symbol: Tally,
    stamp: Tally,
    time_from: Tally,
    time_to: Tally,
}

impl WeekdayTally {
    fn observe(&mut self, entry: &DayEntry) {
        if !entry.text.trim().is_empty() {
            self.text.observe(&entry.text);
        }
        if let Some(symbol) = entry.symbol.as_deref().filter(|v| !v.is_empty()) {
            self.symbol.observe(symbol);
        }
        if let Some(stamp) = entry.stamp.as_deref().filter(|v| !v.is_empty()) {
            self.stamp.observe(stamp);
        }
        if !entry.time_from.is_empty() {
            self.time_from.observe(&entry.time_from);
        }
        if !entry.time_to.is_empty() {
            self.time_to.observe(&entry.time_to);
        }
    }

    fn pattern(&self) -> WeekdayPattern {
        WeekdayPattern {
            text: self.text.plurality().unwrap_or_default().to_string(),
            symbol: self.symbol.plurality().map(str::to_string),
            stamp: self.stamp.plurality().map(str::to_string),
            time_from: self.time_from.plurality().unwrap_or_default().to_string(),
            time_to: self.time_to.plurality().unwrap_or_default().to_string(),
        }
    }
}

/// Projects the weekday patterns of the month before `target` onto `target`.
///
/// `entries` may contain records of any month; only those inside the source
/// month that carry content are counted.
pub fn project<'a, I>(entries: I, target: YearMonth) -> Option<Projection>
where
    I: IntoIterator<Item = &'a DayEntry>,
{
    let source = target.previous();
    let mut selected: Vec<&DayEntry> = entries
        .into_iter()
        .filter(|entry| source.contains(entry.date) && entry.has_content())
        .collect();
    if selected.is_empty() {
        return None;
    }
    selected.sort_by_key(|entry| entry.date);

    let mut tallies: [WeekdayTally; WEEKDAYS] = Default::default();
    for entry in selected {
        tallies[entry.weekday_index()].observe(entry);
    }
    let patterns: [WeekdayPattern; WEEKDAYS] = std::array::from_fn(|dow| tallies[dow].pattern());

    let days = target
        .days()
        .into_iter()
        .map(|date| {
            let mut entry = DayEntry::empty(date);
            let pattern = &patterns[entry.weekday_index()];
            entry.text = pattern.text.clone();
            entry.symbol = pattern.symbol.clone();
            entry.stamp = pattern.stamp.clone();
            entry.time_from = pattern.time_from.clone();
            entry.time_to = pattern.time_to.clone();
            entry
        })
        .collect();

    Some(Projection {
        source,
        target,
        patterns,
        days,
    })
}

#[cfg(test)]
mod tests {
    use super::{project, Tally};
    use crate::model::day_entry::DayEntry;
    use crate::model::month::YearMonth;
    use chrono::NaiveDate;

    fn entry(y: i32, m: u32, d: u32, text: &str) -> DayEntry {
        let mut entry = DayEntry::empty(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        entry.text = text.to_string();
        entry
    }

    #[test]
    fn tally_breaks_ties_by_first_seen() {
        let mut tally = Tally::default();
        tally.observe("b");
        tally.observe("a");
        tally.observe("a");
        tally.observe("b");
        assert_eq!(tally.plurality(), Some("b"));

        tally.observe("a");
        assert_eq!(tally.plurality(), Some("a"));
    }

    #[test]
    fn no_content_in_source_month_yields_none() {
        let target = YearMonth::new(2024, 3).unwrap();
        let blank = entry(2024, 3, 4, "   ");
        let other_month = entry(2024, 1, 5, "meeting");
        assert!(project([&blank, &other_month], target).is_none());
    }

    #[test]
    fn plurality_per_weekday_and_clears_the_rest() {
        // March 2024 Mondays: 4, 11, 18.
        let source = [
            entry(2024, 3, 4, "meeting"),
            entry(2024, 3, 11, "meeting"),
            entry(2024, 3, 18, "off"),
        ];
        let target = YearMonth::new(2024, 3).unwrap();
        let projection = project(source.iter(), target).unwrap();

        assert_eq!(projection.source, YearMonth::new(2024, 2).unwrap());
        assert_eq!(projection.days.len(), 30);
        for day in &projection.days {
            if day.weekday_index() == 1 {
                assert_eq!(day.text, "meeting", "{}", day.date_key());
            } else {
                assert_eq!(day.text, "", "{}", day.date_key());
            }
            assert_eq!(day.symbol, None);
        }
    }

    #[test]
    fn fields_are_voted_independently() {
        // 2024-01-05 and 2024-01-12 are Fridays.
        let mut first = entry(2024, 1, 5, "");
        first.stamp = Some("coffee".to_string());
        first.time_from = "09:00".to_string();
        let mut second = entry(2024, 1, 12, "late");
        second.time_from = "11:00".to_string();
        second.time_to = "20:00".to_string();

        let projection = project([&second, &first], YearMonth::new(2024, 1).unwrap()).unwrap();
        let friday = &projection.patterns[5];
        assert_eq!(friday.text, "late");
        assert_eq!(friday.stamp.as_deref(), Some("coffee"));
        // Tie on time_from resolves to the earlier date.
        assert_eq!(friday.time_from, "09:00");
        assert_eq!(friday.time_to, "20:00");
    }

    #[test]
    fn december_projects_onto_january_of_next_year() {
        let source = [entry(2023, 12, 31, "closing")];
        let projection = project(source.iter(), YearMonth::new(2024, 0).unwrap()).unwrap();
        assert_eq!(projection.days.len(), 31);
        // 2023-12-31 is a Sunday; 2024-01-07 is the first Sunday of January.
        let sunday = projection
            .days
            .iter()
            .find(|d| d.date == NaiveDate::from_ymd_opt(2024, 1, 7).unwrap())
            .unwrap();
        assert_eq!(sunday.text, "closing");
    }
}
