use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use intake::config::Config;
use intake::daemon::run_daemon;
use intake::interval::parse_medication_arg;
use intake::schedule::{Medication, ScheduleRequest, ScheduleResult};
use intake::store::{PatientRecord, PatientStore};
use intake::time::{format_timestamp, parse_start_time};

#[derive(Parser)]
#[command(name = "intake")]
#[command(
    about = "Medication intake schedule calculator",
    long_about = "Computes when to take each medication: doses are spaced by their periodicity, kept inside a daily active window (08:00-22:00 by default) and run for the treatment duration. Schedules can be stored per patient as JSON and announced by a reminder daemon."
)]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Patient store file (overrides the configuration)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print a schedule without storing it
    #[command(visible_alias = "p")]
    Plan {
        /// First intended dose (e.g. "2025-03-09 12:55")
        #[arg(short, long, required_unless_present = "request")]
        start: Option<String>,
        /// Medications as NAME:PERIODICITY[:DURATION] (e.g. "amoxicillin:8:7", "statin:daily")
        #[arg(value_parser = parse_medication_arg, required_unless_present = "request")]
        medications: Vec<Medication>,
        /// Read a JSON schedule request instead of START and MEDICATIONS
        #[arg(short, long, conflicts_with_all = ["start", "medications"])]
        request: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Only print the last intake per medication
        #[arg(long, conflicts_with = "json")]
        summary: bool,
    },
    /// Register a patient in the store
    #[command(visible_alias = "ap")]
    AddPatient { user_id: String },
    /// Delete a patient and their schedules
    #[command(visible_alias = "rp")]
    RemovePatient { user_id: String },
    /// Compute a schedule and append it to a patient
    #[command(visible_alias = "s")]
    Schedule {
        user_id: String,
        /// First intended dose (e.g. "2025-03-09 12:55")
        #[arg(short, long)]
        start: String,
        /// Medications as NAME:PERIODICITY[:DURATION]
        #[arg(value_parser = parse_medication_arg, required = true)]
        medications: Vec<Medication>,
    },
    /// Show a patient's stored schedules
    #[command(visible_alias = "l")]
    Show {
        user_id: String,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a patient's upcoming intakes
    #[command(visible_alias = "n")]
    Next {
        user_id: String,
        /// Number of intakes to show (default: 5)
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
    /// Start the background daemon for reminders
    #[command(visible_alias = "d")]
    Daemon,
}

fn main() {
    // Level is controlled by RUST_LOG (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_file) = cli.data_file {
        config.data_file = data_file;
    }

    let generator = config.generator();
    let store = PatientStore::new(&config.data_file);

    match cli.command {
        Commands::Plan {
            start,
            medications,
            request,
            json,
            summary,
        } => {
            let result = match request {
                Some(path) => {
                    let contents = fs::read_to_string(&path)
                        .with_context(|| format!("Cannot read request file: {}", path.display()))?;
                    let request: ScheduleRequest = serde_json::from_str(&contents)
                        .with_context(|| format!("Invalid schedule request: {}", path.display()))?;
                    request.generate(&generator)
                }
                None => {
                    let start = start.context("--start is required")?;
                    generator.generate_from_str(&medications, &start)
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if summary {
                print_summary(&result);
            } else {
                print_result(&result);
            }
        }
        Commands::AddPatient { user_id } => {
            store.add_patient(&user_id)?;
            println!("Added patient: {}", user_id);
        }
        Commands::RemovePatient { user_id } => {
            let removed = store.remove_patient(&user_id)?;
            println!(
                "Removed patient: {} ({} schedule(s))",
                user_id,
                removed.schedules.len()
            );
        }
        Commands::Schedule {
            user_id,
            start,
            medications,
        } => {
            // An unparseable start is an error here, not an empty schedule.
            let start = parse_start_time(&start)?;
            let result = generator.generate_all(&medications, start);

            if result.is_empty() {
                warn!(user_id = %user_id, "No intakes fall inside the active window");
            }

            store.record_schedule(&user_id, &result)?;
            println!(
                "Scheduled {} intake(s) for {} medication(s) for {}",
                result.total_entries(),
                result.schedules.len(),
                user_id
            );
            print_summary(&result);
        }
        Commands::Show { user_id, json } => {
            let patient = store.patient(&user_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&patient)?);
            } else {
                print_patient(&patient);
            }
        }
        Commands::Next { user_id, count } => {
            let patient = store.patient(&user_id)?;
            let now = Local::now().naive_local();
            let upcoming = patient.next_intakes(now, count);

            if upcoming.is_empty() {
                println!("No upcoming intakes for {}.", user_id);
                return Ok(());
            }

            println!("\nUpcoming intakes for {}:", user_id);
            println!("{}", "=".repeat(60));
            for entry in upcoming {
                println!(
                    "  {}  {}",
                    format_timestamp(entry.timestamp()),
                    entry.medication_name()
                );
            }
            println!();
        }
        Commands::Daemon => {
            info!(data_file = %config.data_file.display(), "Starting reminder daemon");
            run_daemon(&store, Duration::from_secs(config.poll_interval_secs));
        }
    }

    Ok(())
}

fn print_result(result: &ScheduleResult) {
    if result.schedules.is_empty() {
        println!("No intakes scheduled.");
        return;
    }

    for schedule in &result.schedules {
        println!("\n{}", schedule.medication);
        println!("{}", "=".repeat(60));

        if schedule.entries.is_empty() {
            println!("  (no intakes)");
            continue;
        }

        for entry in &schedule.entries {
            println!("  {}", format_timestamp(entry.timestamp()));
        }
    }
    println!();
    print_summary(result);
}

fn print_summary(result: &ScheduleResult) {
    for schedule in &result.schedules {
        match schedule.last_intake {
            Some(last) => println!(
                "  {}: {} intake(s), last at {}",
                schedule.medication,
                schedule.entries.len(),
                format_timestamp(last)
            ),
            None => println!("  {}: no intakes", schedule.medication),
        }
    }
}

fn print_patient(patient: &PatientRecord) {
    println!("\nPatient {}", patient.user_id);
    println!("{}", "=".repeat(60));

    if patient.schedules.is_empty() {
        println!("  No schedules recorded.");
        println!();
        return;
    }

    for schedule in &patient.schedules {
        let first = schedule.entries.first().map(|e| format_timestamp(e.timestamp()));
        match (first, schedule.last_intake) {
            (Some(first), Some(last)) => println!(
                "  {}: {} intake(s) from {} to {}",
                schedule.medication,
                schedule.entries.len(),
                first,
                format_timestamp(last)
            ),
            _ => println!("  {}: no intakes", schedule.medication),
        }
    }
    println!();
}
