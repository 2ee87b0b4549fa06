use crate::model::{TimeSlot, Weekday, WeeklyTimetable};
use chrono::NaiveTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCounts {
    pub total_slots: usize,
    pub occupied_slots: usize,
}

impl WeeklyTimetable {
    pub fn day(&self, day: Weekday) -> &[TimeSlot] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn slot_counts(&self) -> SlotCounts {
        let all = self.days.values().flatten();
        let (total_slots, occupied_slots) = all.fold((0, 0), |(t, o), slot| {
            (t + 1, o + usize::from(slot.subject.is_some()))
        });
        SlotCounts {
            total_slots,
            occupied_slots,
        }
    }

    /// First teaching slot on `day` that starts strictly after `now`.
    pub fn next_class(&self, day: Weekday, now: NaiveTime) -> Option<&TimeSlot> {
        self.day(day).iter().find(|slot| {
            slot.subject.is_some()
                && parse_clock(&slot.start_time)
                    .map(|start| start > now)
                    .unwrap_or(false)
        })
    }

    /// Copy of the week keeping only slots for the given subjects; other
    /// periods become free (subject removed).
    pub fn restricted_to(&self, subject_ids: &[String]) -> WeeklyTimetable {
        let mut out = self.clone();
        for slots in out.days.values_mut() {
            for slot in slots.iter_mut() {
                let keep = slot
                    .subject
                    .as_ref()
                    .map(|s| subject_ids.contains(&s.id))
                    .unwrap_or(false);
                if !keep {
                    slot.subject = None;
                }
            }
        }
        out
    }
}

pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}
