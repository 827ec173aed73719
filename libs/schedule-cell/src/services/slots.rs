use chrono::{Duration, NaiveTime};

use crate::models::SlotStatus;

/// A slot produced by the generator, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: SlotStatus,
}

/// Generate the ordered, non-overlapping slots of `duration_minutes`
/// covering `[start, end)`.
///
/// The cursor walks from `start` in fixed increments and stops once the
/// next slot would run past `end`; a trailing partial interval is dropped,
/// never shortened. A slot is tagged `break` iff its start time falls
/// within `[break_start, break_end)` - a slot that starts just before the
/// break and ends inside it stays `available`.
pub fn generate_time_slots(
    start: NaiveTime,
    end: NaiveTime,
    duration_minutes: i32,
    break_window: Option<(NaiveTime, NaiveTime)>,
) -> Vec<GeneratedSlot> {
    let mut slots = Vec::new();

    if duration_minutes <= 0 || start >= end {
        return slots;
    }

    let step = Duration::minutes(duration_minutes as i64);
    let mut cursor = start;

    loop {
        let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > end {
            break;
        }

        let status = match break_window {
            Some((break_start, break_end))
                if cursor >= break_start && cursor < break_end =>
            {
                SlotStatus::Break
            }
            _ => SlotStatus::Available,
        };

        slots.push(GeneratedSlot {
            start_time: cursor,
            end_time: slot_end,
            duration_minutes,
            status,
        });

        cursor = slot_end;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn full_day_with_lunch_break() {
        let slots = generate_time_slots(t(9, 0), t(17, 0), 30, Some((t(13, 0), t(13, 30))));

        assert_eq!(slots.len(), 16);
        for slot in &slots {
            assert!(slot.end_time <= t(17, 0));
            if slot.start_time == t(13, 0) {
                assert_eq!(slot.status, SlotStatus::Break);
            } else {
                assert_eq!(slot.status, SlotStatus::Available);
            }
        }
        assert_eq!(slots.iter().filter(|s| s.status == SlotStatus::Break).count(), 1);
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        let slots = generate_time_slots(t(9, 0), t(9, 50), 30, None);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, t(9, 0));
        assert_eq!(slots[0].end_time, t(9, 30));
    }

    #[test]
    fn slot_straddling_break_start_stays_available() {
        // Break begins mid-slot; only the start time is checked, so the
        // straddling slot keeps its available tag.
        let slots = generate_time_slots(t(9, 0), t(12, 0), 60, Some((t(9, 30), t(10, 30))));

        assert_eq!(slots[0].start_time, t(9, 0));
        assert_eq!(slots[0].status, SlotStatus::Available);
        assert_eq!(slots[1].start_time, t(10, 0));
        assert_eq!(slots[1].status, SlotStatus::Break);
        assert_eq!(slots[2].status, SlotStatus::Available);
    }

    #[test]
    fn slot_starting_at_break_end_is_available() {
        let slots = generate_time_slots(t(9, 0), t(11, 0), 30, Some((t(9, 30), t(10, 0))));

        let at_break_end = slots.iter().find(|s| s.start_time == t(10, 0)).unwrap();
        assert_eq!(at_break_end.status, SlotStatus::Available);
    }

    #[test]
    fn exact_fit_fills_the_window() {
        let slots = generate_time_slots(t(9, 0), t(10, 0), 30, None);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end_time, t(10, 0));
    }

    #[test]
    fn empty_or_inverted_windows_produce_nothing() {
        assert!(generate_time_slots(t(9, 0), t(9, 0), 30, None).is_empty());
        assert!(generate_time_slots(t(17, 0), t(9, 0), 30, None).is_empty());
        assert!(generate_time_slots(t(9, 0), t(17, 0), 0, None).is_empty());
    }

    #[test]
    fn slots_are_ordered_and_contiguous() {
        let slots = generate_time_slots(t(8, 0), t(12, 0), 20, None);

        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }
}
