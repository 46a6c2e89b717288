use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schedule::{IntakeEntry, MedicationSchedule, ScheduleResult};

/// A patient and every schedule generated for them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub user_id: String,
    #[serde(default)]
    pub schedules: Vec<MedicationSchedule>,
    /// Last intake of each stored schedule, in the order they were recorded.
    #[serde(default)]
    pub last_intake_times: Vec<Option<NaiveDateTime>>,
}

impl PatientRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            schedules: Vec::new(),
            last_intake_times: Vec::new(),
        }
    }

    /// Append a generated result to this patient.
    pub fn record(&mut self, result: &ScheduleResult) {
        self.schedules.extend(result.schedules.iter().cloned());
        self.last_intake_times.extend(result.last_intake_times());
    }

    /// Up to `limit` intakes strictly after `now`, across all schedules,
    /// in chronological order.
    pub fn next_intakes(&self, now: NaiveDateTime, limit: usize) -> Vec<&IntakeEntry> {
        let mut upcoming: Vec<&IntakeEntry> = self
            .schedules
            .iter()
            .flat_map(|schedule| {
                // Entries are chronological, so skip the past with a binary search.
                let first = schedule.entries.partition_point(|e| e.timestamp() <= now);
                schedule.entries[first..].iter().take(limit)
            })
            .collect();

        upcoming.sort_by_key(|e| e.timestamp());
        upcoming.truncate(limit);
        upcoming
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientDatabase {
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
}

impl PatientDatabase {
    pub fn patient(&self, user_id: &str) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.user_id == user_id)
    }

    pub fn patient_mut(&mut self, user_id: &str) -> Option<&mut PatientRecord> {
        self.patients.iter_mut().find(|p| p.user_id == user_id)
    }
}

/// JSON file holding every [`PatientRecord`].
#[derive(Debug, Clone)]
pub struct PatientStore {
    path: PathBuf,
}

impl PatientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the patient database from disk.
    ///
    /// A missing file yields an empty database. If the file is corrupted it is
    /// copied to `*.json.corrupted` and an empty database is returned.
    pub fn load(&self) -> Result<PatientDatabase, StoreError> {
        if !self.path.exists() {
            return Ok(PatientDatabase::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        match serde_json::from_str::<PatientDatabase>(&contents) {
            Ok(db) => Ok(db),
            Err(e) => {
                let backup_path = self.path.with_extension("json.corrupted");
                warn!(
                    "Patient store {} is corrupted ({}), backing up to {}",
                    self.path.display(),
                    e,
                    backup_path.display()
                );

                if let Err(backup_err) = fs::copy(&self.path, &backup_path) {
                    warn!("Failed to create backup: {}", backup_err);
                }

                warn!("Starting with an empty patient store");
                Ok(PatientDatabase::default())
            }
        }
    }

    /// Saves the database atomically.
    ///
    /// Writes to a temp file and renames it over the store. Sets file
    /// permissions to 0600 on Unix.
    pub fn save(&self, db: &PatientDatabase) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(db)?;
        let temp_path = self.path.with_extension("json.tmp");

        fs::write(&temp_path, &json).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        #[cfg(unix)]
        {
            if let Ok(metadata) = fs::metadata(&self.path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                if let Err(e) = fs::set_permissions(&self.path, perms) {
                    warn!("Failed to set file permissions: {}", e);
                }
            }
        }

        Ok(())
    }

    pub fn patient(&self, user_id: &str) -> Result<PatientRecord, StoreError> {
        self.load()?
            .patient(user_id)
            .cloned()
            .ok_or_else(|| StoreError::PatientNotFound(user_id.to_string()))
    }

    pub fn add_patient(&self, user_id: &str) -> Result<(), StoreError> {
        let mut db = self.load()?;

        if db.patient(user_id).is_some() {
            return Err(StoreError::PatientExists(user_id.to_string()));
        }

        db.patients.push(PatientRecord::new(user_id));
        self.save(&db)?;
        info!(user_id, "Added patient");
        Ok(())
    }

    pub fn remove_patient(&self, user_id: &str) -> Result<PatientRecord, StoreError> {
        let mut db = self.load()?;

        let index = db
            .patients
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or_else(|| StoreError::PatientNotFound(user_id.to_string()))?;

        let removed = db.patients.remove(index);
        self.save(&db)?;
        info!(user_id, schedules = removed.schedules.len(), "Removed patient");
        Ok(removed)
    }

    /// Appends every schedule of `result` to the patient's record.
    pub fn record_schedule(&self, user_id: &str, result: &ScheduleResult) -> Result<(), StoreError> {
        let mut db = self.load()?;

        let patient = db
            .patient_mut(user_id)
            .ok_or_else(|| StoreError::PatientNotFound(user_id.to_string()))?;
        patient.record(result);

        self.save(&db)?;
        info!(
            user_id,
            medications = result.schedules.len(),
            entries = result.total_entries(),
            "Recorded schedule"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Medication, ScheduleGenerator};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn temp_store() -> (TempDir, PatientStore) {
        let dir = TempDir::new().unwrap();
        let store = PatientStore::new(dir.path().join("patients.json"));
        (dir, store)
    }

    fn sample_result() -> ScheduleResult {
        let meds = vec![
            Medication::new("amoxicillin", 8, Some(2)),
            Medication::new("broken", 0, Some(2)),
        ];
        ScheduleGenerator::default().generate_all(&meds, at(9, 12, 55))
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load().unwrap(), PatientDatabase::default());
    }

    #[test]
    fn add_and_lookup_patient() {
        let (_dir, store) = temp_store();
        store.add_patient("p1").unwrap();
        assert_eq!(store.patient("p1").unwrap(), PatientRecord::new("p1"));
        assert!(matches!(
            store.patient("p2"),
            Err(StoreError::PatientNotFound(id)) if id == "p2"
        ));
    }

    #[test]
    fn duplicate_patient_rejected() {
        let (_dir, store) = temp_store();
        store.add_patient("p1").unwrap();
        assert!(matches!(
            store.add_patient("p1"),
            Err(StoreError::PatientExists(_))
        ));
    }

    #[test]
    fn remove_patient() {
        let (_dir, store) = temp_store();
        store.add_patient("p1").unwrap();
        store.add_patient("p2").unwrap();
        assert_eq!(store.remove_patient("p1").unwrap().user_id, "p1");
        assert_eq!(store.load().unwrap().patients.len(), 1);
        assert!(matches!(
            store.remove_patient("p1"),
            Err(StoreError::PatientNotFound(_))
        ));
    }

    #[test]
    fn record_schedule_appends_and_persists() {
        let (_dir, store) = temp_store();
        store.add_patient("p1").unwrap();

        let result = sample_result();
        store.record_schedule("p1", &result).unwrap();
        store.record_schedule("p1", &result).unwrap();

        let patient = store.patient("p1").unwrap();
        assert_eq!(patient.schedules.len(), 4);
        assert_eq!(
            patient.last_intake_times,
            vec![Some(at(10, 16, 0)), None, Some(at(10, 16, 0)), None]
        );
    }

    #[test]
    fn record_schedule_for_unknown_patient_fails() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.record_schedule("ghost", &sample_result()),
            Err(StoreError::PatientNotFound(_))
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupted_file_is_backed_up() {
        let (dir, store) = temp_store();
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load().unwrap(), PatientDatabase::default());
        assert!(dir.path().join("patients.json.corrupted").exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        let (_dir, store) = temp_store();
        store.add_patient("p1").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn next_intakes_merges_schedules() {
        let meds = vec![
            Medication::new("a", 6, Some(2)),
            Medication::new("b", 4, Some(1)),
        ];
        let result = ScheduleGenerator::default().generate_all(&meds, at(9, 7, 30));
        let mut patient = PatientRecord::new("p1");
        patient.record(&result);

        // a: 08, 14, 20, then 08, 14, 20 on the 10th; b: 08, 12, 16, 20.
        let next: Vec<(NaiveDateTime, &str)> = patient
            .next_intakes(at(9, 12, 0), 4)
            .into_iter()
            .map(|e| (e.timestamp(), e.medication_name()))
            .collect();

        assert_eq!(
            next,
            vec![
                (at(9, 14, 0), "a"),
                (at(9, 16, 0), "b"),
                (at(9, 20, 0), "a"),
                (at(9, 20, 0), "b"),
            ]
        );
    }

    #[test]
    fn next_intakes_after_everything_is_empty() {
        let mut patient = PatientRecord::new("p1");
        patient.record(&sample_result());
        assert!(patient.next_intakes(at(20, 0, 0), 5).is_empty());
    }
}
