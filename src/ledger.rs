use crate::calc::{self, StudentStats};
use crate::filter::RecordFilter;
use crate::model::{AttendanceRecord, AttendanceStatus, Student, Subject};
use crate::roster::Roster;
use crate::store::{put_json, KeyValueStore, StoreError, RECORDS_KEY};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One mark as a teacher submits it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub student_id: String,
    pub subject_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub time_slot: String,
    #[serde(default)]
    pub marked_by: Option<String>,
    #[serde(default)]
    pub marked_at: Option<String>,
}

impl NewRecord {
    fn replaces(&self, existing: &AttendanceRecord) -> bool {
        existing.same_sitting(&self.student_id, &self.subject_id, &self.date, &self.time_slot)
    }

    fn into_record(self, now: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: Some(self.student_id),
            subject_id: self.subject_id,
            date: self.date,
            status: self.status,
            time_slot: self.time_slot,
            marked_by: self.marked_by,
            marked_at: Some(self.marked_at.unwrap_or_else(|| now.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub status: Option<AttendanceStatus>,
    pub subject_id: Option<String>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub marked_by: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.subject_id.is_none()
            && self.date.is_none()
            && self.time_slot.is_none()
            && self.marked_by.is_none()
    }

    fn apply(&self, record: &mut AttendanceRecord) {
        if let Some(v) = self.status {
            record.status = v;
        }
        if let Some(v) = &self.subject_id {
            record.subject_id = v.clone();
        }
        if let Some(v) = &self.date {
            record.date = v.clone();
        }
        if let Some(v) = &self.time_slot {
            record.time_slot = v.clone();
        }
        if let Some(v) = &self.marked_by {
            record.marked_by = Some(v.clone());
        }
    }
}

/// The live attendance list. Every change rewrites the whole list under
/// `attendanceRecords`; the in-memory copy only changes once that write succeeds.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<AttendanceRecord>,
}

impl Ledger {
    pub fn from_records(records: Vec<AttendanceRecord>) -> Self {
        Self { records }
    }

    /// Stored records win; a missing or unreadable blob falls back to `seed`,
    /// which is then written back so the store and memory agree.
    pub fn load(store: &mut dyn KeyValueStore, seed: &[AttendanceRecord]) -> Self {
        let stored = match store.get(RECORDS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<AttendanceRecord>>(&raw) {
                Ok(records) => Some(records),
                Err(e) => {
                    warn!(error = %e, "stored attendance records unreadable, using seed");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read stored attendance records");
                None
            }
        };

        match stored {
            Some(records) => {
                info!(records = records.len(), "attendance records loaded");
                Self { records }
            }
            None => {
                let ledger = Self::from_records(seed.to_vec());
                if let Err(e) = ledger.persist(store, &ledger.records) {
                    warn!(error = %e, "failed to persist seed attendance records");
                }
                ledger
            }
        }
    }

    fn persist(&self, store: &mut dyn KeyValueStore, records: &[AttendanceRecord]) -> Result<(), StoreError> {
        put_json(store, RECORDS_KEY, records)?;
        debug!(records = records.len(), "attendance records persisted");
        Ok(())
    }

    fn commit(&mut self, store: &mut dyn KeyValueStore, next: Vec<AttendanceRecord>) -> Result<(), StoreError> {
        self.persist(store, &next)?;
        self.records = next;
        Ok(())
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Replaces any earlier mark for the same (student, subject, date, slot).
    pub fn mark(&mut self, store: &mut dyn KeyValueStore, new: NewRecord) -> Result<AttendanceRecord, StoreError> {
        let mut marked = self.mark_many(store, vec![new])?;
        Ok(marked.remove(0))
    }

    /// Batch form of `mark`. Within one batch the last entry for a sitting wins.
    pub fn mark_many(
        &mut self,
        store: &mut dyn KeyValueStore,
        batch: Vec<NewRecord>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut deduped: Vec<NewRecord> = Vec::with_capacity(batch.len());
        for n in batch {
            deduped.retain(|d| {
                !(d.student_id == n.student_id
                    && d.subject_id == n.subject_id
                    && d.date == n.date
                    && d.time_slot == n.time_slot)
            });
            deduped.push(n);
        }

        let mut next: Vec<AttendanceRecord> = self
            .records
            .iter()
            .filter(|r| !deduped.iter().any(|n| n.replaces(r)))
            .cloned()
            .collect();
        let replaced = self.records.len() - next.len();
        let fresh: Vec<AttendanceRecord> = deduped.into_iter().map(|n| n.into_record(&now)).collect();
        next.extend(fresh.iter().cloned());

        self.commit(store, next)?;
        info!(marked = fresh.len(), replaced, "attendance marked");
        Ok(fresh)
    }

    pub fn delete(&mut self, store: &mut dyn KeyValueStore, id: &str) -> Result<bool, StoreError> {
        if !self.records.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        let next: Vec<AttendanceRecord> = self.records.iter().filter(|r| r.id != id).cloned().collect();
        self.commit(store, next)?;
        Ok(true)
    }

    pub fn update(
        &mut self,
        store: &mut dyn KeyValueStore,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let Some(current) = self.get(id) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        patch.apply(&mut updated);

        // Moving onto a sitting that already has a mark replaces that mark.
        let mut next = Vec::with_capacity(self.records.len());
        let mut replaced = 0usize;
        for r in &self.records {
            if r.id == id {
                next.push(updated.clone());
            } else if updated
                .student_id
                .as_deref()
                .map(|sid| r.same_sitting(sid, &updated.subject_id, &updated.date, &updated.time_slot))
                .unwrap_or(false)
            {
                replaced += 1;
            } else {
                next.push(r.clone());
            }
        }
        self.commit(store, next)?;
        info!(id, status = updated.status.as_str(), replaced, "attendance record updated");
        Ok(Some(updated))
    }

    pub fn get(&self, id: &str) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn for_student(&self, student_id: &str) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| r.student_id.as_deref() == Some(student_id))
            .collect()
    }

    /// Marks already taken for one class sitting; subject and slot narrow only when given.
    pub fn for_session(&self, date: &str, subject_id: Option<&str>, time_slot: Option<&str>) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| r.date == date)
            .filter(|r| subject_id.map(|s| r.subject_id == s).unwrap_or(true))
            .filter(|r| time_slot.map(|t| r.time_slot == t).unwrap_or(true))
            .collect()
    }

    pub fn filter(&self, filter: &RecordFilter, roster: &Roster) -> Vec<&AttendanceRecord> {
        filter.apply(&self.records, roster)
    }

    pub fn live_student_stats(&self, student: &Student, subjects: &[Subject]) -> StudentStats {
        calc::student_stats(student, subjects, &self.records)
    }
}
