//! Medication intake schedule generation.
//!
//! Given a start time and a medication's periodicity and duration, the
//! generator emits one timestamp per dose, confined to a daily active window
//! (08:00-22:00 by default).
//!
//! Rules:
//! * The start time is rounded up to a quarter hour
//!   (see [`round_to_quarter_hour`]).
//! * Day 0 is the rounded start's calendar date. On day 0 dosing begins at the
//!   rounded start time, or at the window start if that is later. Every other
//!   day begins at the window start.
//! * Every day, the last one included, ends at the window end.
//! * Within a day, doses are spaced `periodicity_hours` apart and emitted while
//!   strictly before the window end.
//! * A periodicity of zero or less skips the medication. A missing or
//!   non-positive duration uses the continuous horizon.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::time::{parse_start_time, round_to_quarter_hour};

/// Days generated for a continuous regimen (no duration given).
pub const DEFAULT_CONTINUOUS_HORIZON_DAYS: u32 = 22_250;

/// Default first hour of the active window.
pub const DAY_START_HOUR: u32 = 8;
/// Default end of the active window (exclusive).
pub const DAY_END_HOUR: u32 = 22;

// ── Input types ───────────────────────────────────────────────────────────────

/// A medication regimen as supplied by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Medication {
    #[serde(alias = "drug")]
    pub name: String,
    /// Hours between doses. Values of zero or less make the medication
    /// unschedulable.
    #[serde(alias = "periodicity")]
    pub periodicity_hours: i64,
    /// Treatment length in days; `None` for a continuous regimen.
    #[serde(default)]
    pub duration_days: Option<i64>,
}

impl Medication {
    pub fn new(name: impl Into<String>, periodicity_hours: i64, duration_days: Option<i64>) -> Self {
        Self {
            name: name.into(),
            periodicity_hours,
            duration_days,
        }
    }

    /// `true` when no treatment duration was given.
    pub fn is_continuous(&self) -> bool {
        self.duration_days.is_none()
    }
}

/// The daily span, in whole hours, during which doses may be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    start_hour: u32,
    end_hour: u32,
}

impl ActiveWindow {
    /// Returns `None` unless `start_hour < end_hour <= 24`.
    pub fn new(start_hour: u32, end_hour: u32) -> Option<Self> {
        (start_hour < end_hour && end_hour <= 24).then_some(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Window start on `date`.
    pub fn opens(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        date.and_time(NaiveTime::MIN)
            .checked_add_signed(TimeDelta::hours(i64::from(self.start_hour)))
    }

    /// Window end on `date` (exclusive). An end hour of 24 is the next midnight,
    /// which does not exist on the last representable date.
    pub fn closes(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        date.and_time(NaiveTime::MIN)
            .checked_add_signed(TimeDelta::hours(i64::from(self.end_hour)))
    }

    /// Whether the hour of `at` lies in `[start_hour, end_hour)`.
    pub fn contains_hour(&self, at: NaiveDateTime) -> bool {
        (self.start_hour..self.end_hour).contains(&at.hour())
    }
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self {
            start_hour: DAY_START_HOUR,
            end_hour: DAY_END_HOUR,
        }
    }
}

// ── Output types ──────────────────────────────────────────────────────────────

/// One scheduled dose.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IntakeEntry {
    timestamp: NaiveDateTime,
    medication_name: String,
}

impl IntakeEntry {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn medication_name(&self) -> &str {
        &self.medication_name
    }
}

/// All doses generated for one medication.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MedicationSchedule {
    pub medication: String,
    pub entries: Vec<IntakeEntry>,
    pub last_intake: Option<NaiveDateTime>,
}

/// Schedules for every medication of a request, in request order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleResult {
    pub schedules: Vec<MedicationSchedule>,
}

impl ScheduleResult {
    /// Last intake per medication, aligned with `schedules`.
    pub fn last_intake_times(&self) -> Vec<Option<NaiveDateTime>> {
        self.schedules.iter().map(|s| s.last_intake).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.iter().all(|s| s.entries.is_empty())
    }

    pub fn total_entries(&self) -> usize {
        self.schedules.iter().map(|s| s.entries.len()).sum()
    }
}

/// A schedule request as submitted in JSON.
///
/// ```json
/// {
///   "user_id": "9b2f...",
///   "first_time": "2025-03-09 12:55",
///   "drugs": [{ "name": "amoxicillin", "periodicity_hours": 8, "duration_days": 7 }]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub first_time: String,
    #[serde(alias = "medications")]
    pub drugs: Vec<Medication>,
}

impl ScheduleRequest {
    /// Generate schedules for every drug; empty if `first_time` is unparseable.
    pub fn generate(&self, generator: &ScheduleGenerator) -> ScheduleResult {
        generator.generate_from_str(&self.drugs, &self.first_time)
    }
}

// ── Generator ─────────────────────────────────────────────────────────────────

/// Stateless schedule generator; holds only the window and continuous horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleGenerator {
    window: ActiveWindow,
    continuous_horizon_days: u32,
}

impl Default for ScheduleGenerator {
    fn default() -> Self {
        Self::new(ActiveWindow::default(), DEFAULT_CONTINUOUS_HORIZON_DAYS)
    }
}

impl ScheduleGenerator {
    pub fn new(window: ActiveWindow, continuous_horizon_days: u32) -> Self {
        Self {
            window,
            continuous_horizon_days,
        }
    }

    pub fn window(&self) -> ActiveWindow {
        self.window
    }

    pub fn continuous_horizon_days(&self) -> u32 {
        self.continuous_horizon_days
    }

    /// Number of days to generate for `medication`.
    pub fn effective_duration_days(&self, medication: &Medication) -> u64 {
        match medication.duration_days {
            Some(days) if days > 0 => days.unsigned_abs(),
            Some(days) => {
                warn!(
                    medication = %medication.name,
                    duration_days = days,
                    horizon = self.continuous_horizon_days,
                    "Non-positive treatment duration, using continuous horizon"
                );
                u64::from(self.continuous_horizon_days)
            }
            None => u64::from(self.continuous_horizon_days),
        }
    }

    /// Generate every intake for one medication starting at `start_time`.
    ///
    /// Returns the entries in chronological order and the last entry's
    /// timestamp, or `None` when nothing was scheduled.
    pub fn generate(
        &self,
        medication: &Medication,
        start_time: NaiveDateTime,
    ) -> (Vec<IntakeEntry>, Option<NaiveDateTime>) {
        if medication.periodicity_hours <= 0 {
            warn!(
                medication = %medication.name,
                periodicity_hours = medication.periodicity_hours,
                "Non-positive periodicity, medication skipped"
            );
            return (Vec::new(), None);
        }

        // A step of a day or more leaves one dose per window.
        let step = TimeDelta::hours(medication.periodicity_hours.min(24));
        let Some(rounded) = round_to_quarter_hour(start_time) else {
            warn!(
                medication = %medication.name,
                start = %start_time,
                "Start time rounds past the end of the calendar, medication skipped"
            );
            return (Vec::new(), None);
        };
        let first_day = rounded.date();
        let duration = self.effective_duration_days(medication);

        let mut entries = Vec::new();

        for day in 0..duration {
            let Some(date) = first_day.checked_add_days(Days::new(day)) else {
                warn!(
                    medication = %medication.name,
                    day,
                    "Schedule reached the end of the calendar, truncating"
                );
                break;
            };

            let (Some(opens), Some(closes)) = (self.window.opens(date), self.window.closes(date))
            else {
                warn!(
                    medication = %medication.name,
                    day,
                    "Schedule reached the end of the calendar, truncating"
                );
                break;
            };
            let mut at = if day == 0 { rounded.max(opens) } else { opens };

            while at < closes {
                if self.window.contains_hour(at) {
                    entries.push(IntakeEntry {
                        timestamp: at,
                        medication_name: medication.name.clone(),
                    });
                }
                match at.checked_add_signed(step) {
                    Some(next) => at = next,
                    None => break,
                }
            }
        }

        let last_intake = entries.last().map(IntakeEntry::timestamp);

        debug!(
            medication = %medication.name,
            rounded_start = %rounded,
            days = duration,
            entries = entries.len(),
            last_intake = ?last_intake,
            "Generated intake schedule"
        );

        (entries, last_intake)
    }

    /// Generate schedules for several medications sharing one start time.
    pub fn generate_all(&self, medications: &[Medication], start_time: NaiveDateTime) -> ScheduleResult {
        let schedules = medications
            .iter()
            .map(|medication| {
                let (entries, last_intake) = self.generate(medication, start_time);
                MedicationSchedule {
                    medication: medication.name.clone(),
                    entries,
                    last_intake,
                }
            })
            .collect();

        ScheduleResult { schedules }
    }

    /// Like [`generate_all`](Self::generate_all) but takes the raw start-time
    /// text. An unparseable start yields an empty result.
    pub fn generate_from_str(&self, medications: &[Medication], start_time: &str) -> ScheduleResult {
        match parse_start_time(start_time) {
            Ok(start) => self.generate_all(medications, start),
            Err(e) => {
                warn!("{}; no intakes scheduled", e);
                ScheduleResult::default()
            }
        }
    }
}

/// Generate one medication's schedule with the default window and horizon.
pub fn generate(
    medication: &Medication,
    start_time: NaiveDateTime,
) -> (Vec<IntakeEntry>, Option<NaiveDateTime>) {
    ScheduleGenerator::default().generate(medication, start_time)
}
