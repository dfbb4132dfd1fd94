//! Note storage and the note-increment forward shift.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

/// Separator used when a shifting note lands on an occupied day.
pub const NOTE_JOIN: &str = " • ";

/// One note movement produced by a forward shift, in replication order.
/// `text` is the final content at `to` after any concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteShift {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub text: String,
}

/// Shift every note dated on/after `start` forward by one day.
///
/// Processing is in ascending date order. When a shifting note lands on a day
/// holding a not-yet-shifted note, the two concatenate as
/// `"<shifted> • <existing>"` and the absorbed note does not shift again.
pub fn shift_notes_forward(
    notes: &mut BTreeMap<NaiveDate, String>,
    start: NaiveDate,
) -> Vec<NoteShift> {
    let days: Vec<NaiveDate> = notes.range(start..).map(|(day, _)| *day).collect();
    let mut absorbed: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut shifts = Vec::new();

    for day in days {
        if absorbed.contains(&day) {
            continue;
        }
        let Some(text) = notes.remove(&day) else {
            continue;
        };
        let Some(next) = day.succ_opt() else {
            // Calendar boundary: nowhere to shift to.
            notes.insert(day, text);
            continue;
        };
        let merged = match notes.remove(&next) {
            Some(existing) => {
                absorbed.insert(next);
                format!("{text}{NOTE_JOIN}{existing}")
            }
            None => text,
        };
        notes.insert(next, merged.clone());
        shifts.push(NoteShift {
            from: day,
            to: next,
            text: merged,
        });
    }

    shifts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn adjacent_notes_concatenate_on_shift() {
        let mut notes = BTreeMap::new();
        notes.insert(day(10), "A".to_string());
        notes.insert(day(11), "B".to_string());

        let shifts = shift_notes_forward(&mut notes, day(10));

        assert_eq!(notes.get(&day(10)), None);
        assert_eq!(notes.get(&day(11)).map(String::as_str), Some("A • B"));
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].from, day(10));
        assert_eq!(shifts[0].to, day(11));
    }

    #[test]
    fn isolated_notes_move_one_day() {
        let mut notes = BTreeMap::new();
        notes.insert(day(10), "A".to_string());
        notes.insert(day(15), "C".to_string());

        shift_notes_forward(&mut notes, day(10));

        assert_eq!(notes.get(&day(11)).map(String::as_str), Some("A"));
        assert_eq!(notes.get(&day(16)).map(String::as_str), Some("C"));
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn notes_before_start_stay_put() {
        let mut notes = BTreeMap::new();
        notes.insert(day(5), "before".to_string());
        notes.insert(day(10), "A".to_string());

        shift_notes_forward(&mut notes, day(10));

        assert_eq!(notes.get(&day(5)).map(String::as_str), Some("before"));
        assert_eq!(notes.get(&day(11)).map(String::as_str), Some("A"));
    }

    #[test]
    fn absorbed_note_does_not_shift_again() {
        let mut notes = BTreeMap::new();
        notes.insert(day(10), "A".to_string());
        notes.insert(day(11), "B".to_string());
        notes.insert(day(12), "C".to_string());

        let shifts = shift_notes_forward(&mut notes, day(10));

        // B was absorbed into day 11; C shifts independently.
        assert_eq!(notes.get(&day(11)).map(String::as_str), Some("A • B"));
        assert_eq!(notes.get(&day(13)).map(String::as_str), Some("C"));
        assert_eq!(notes.get(&day(12)), None);
        assert_eq!(shifts.len(), 2);
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let mut notes: BTreeMap<NaiveDate, String> = BTreeMap::new();
        assert!(shift_notes_forward(&mut notes, day(1)).is_empty());
    }
}
