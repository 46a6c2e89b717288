use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use notify_rust::Notification;
use tracing::{error, info, warn};

use crate::schedule::IntakeEntry;
use crate::store::{PatientDatabase, PatientStore};
use crate::time::format_timestamp;

/// Intakes with `since < timestamp <= until`, paired with their patient id.
pub fn due_between(
    db: &PatientDatabase,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> Vec<(&str, &IntakeEntry)> {
    let mut due: Vec<(&str, &IntakeEntry)> = db
        .patients
        .iter()
        .flat_map(|patient| {
            patient.schedules.iter().flat_map(move |schedule| {
                let first = schedule.entries.partition_point(|e| e.timestamp() <= since);
                schedule.entries[first..]
                    .iter()
                    .take_while(move |e| e.timestamp() <= until)
                    .map(move |e| (patient.user_id.as_str(), e))
            })
        })
        .collect();

    due.sort_by_key(|(_, e)| e.timestamp());
    due
}

fn notify(user_id: &str, entry: &IntakeEntry) {
    let result = Notification::new()
        .summary("Medication Reminder")
        .body(&format!(
            "Time to take: {}\nPatient: {}\nScheduled for: {}",
            entry.medication_name(),
            user_id,
            format_timestamp(entry.timestamp())
        ))
        .icon("medication")
        .timeout(0) // Don't auto-dismiss
        .show();

    match result {
        Ok(_) => info!(
            user_id,
            medication = entry.medication_name(),
            at = %format_timestamp(entry.timestamp()),
            "Reminder sent"
        ),
        Err(e) => warn!(
            user_id,
            medication = entry.medication_name(),
            "Failed to send notification: {}",
            e
        ),
    }
}

/// Poll the store forever and raise a notification for each intake that
/// became due since the previous poll.
pub fn run_daemon(store: &PatientStore, poll_interval: Duration) {
    info!(
        store = %store.path().display(),
        poll_secs = poll_interval.as_secs(),
        "Daemon started. Checking for intake reminders..."
    );
    println!("Press Ctrl+C to stop.");

    let mut last_check = Local::now().naive_local();

    loop {
        thread::sleep(poll_interval);
        poll_store(store, &mut last_check, Local::now().naive_local(), notify);
    }
}

/// Send every intake due in `(last_check, now]` and move `last_check` to `now`.
///
/// When the store cannot be loaded `last_check` stays put, so the next
/// successful poll still covers the missed interval.
fn poll_store<F>(store: &PatientStore, last_check: &mut NaiveDateTime, now: NaiveDateTime, mut send: F)
where
    F: FnMut(&str, &IntakeEntry),
{
    let db = match store.load() {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to load patient store: {}", e);
            return;
        }
    };

    for (user_id, entry) in due_between(&db, *last_check, now) {
        send(user_id, entry);
    }
    *last_check = now;
}
