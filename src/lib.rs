//! Medication intake scheduling.
//!
//! The core is [`schedule::ScheduleGenerator`]: from a start time and a
//! medication's periodicity and duration it produces every intake timestamp
//! inside the daily active window, plus the last intake.
//!
//! ```
//! use chrono::NaiveDate;
//! use intake::schedule::{generate, Medication};
//!
//! let start = NaiveDate::from_ymd_opt(2025, 3, 9)
//!     .unwrap()
//!     .and_hms_opt(12, 55, 0)
//!     .unwrap();
//! let (entries, last) = generate(&Medication::new("paracetamol", 1, Some(3)), start);
//!
//! assert_eq!(entries.len(), 37);
//! assert_eq!(last.unwrap().to_string(), "2025-03-11 21:00:00");
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod interval;
pub mod schedule;
pub mod store;
pub mod time;

pub use error::{ScheduleError, StoreError};
pub use schedule::{
    generate, ActiveWindow, IntakeEntry, Medication, MedicationSchedule, ScheduleGenerator,
    ScheduleRequest, ScheduleResult,
};
