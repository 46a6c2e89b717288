use crate::schedule::Medication;

/// Parse a dosing periodicity into hours between doses.
///
/// Supported formats:
/// - "8", "8h", "8 hours" -> 8
/// - "every 8 hours", "every hour", "hourly" -> 8 / 1 / 1
/// - "daily" -> 24
/// - "twice daily", "bid" -> 12
/// - "three times daily", "tid" -> 8
/// - "four times daily", "qid" -> 6
/// - "prn", "as needed" -> None (no fixed schedule)
///
/// Zero and negative numbers are returned unchanged; the generator skips
/// such medications instead of rejecting them here.
pub fn parse_periodicity_hours(periodicity: &str) -> Option<i64> {
    let lower = periodicity.trim().to_lowercase();

    match lower.as_str() {
        "" | "prn" | "as needed" | "as-needed" | "asneeded" | "when needed" => return None,
        "hourly" | "every hour" => return Some(1),
        "daily" | "every day" | "once daily" | "qd" => return Some(24),
        "twice daily" | "2 times daily" | "twice a day" | "bid" => return Some(12),
        "three times daily" | "3 times daily" | "three times a day" | "tid" => return Some(8),
        "four times daily" | "4 times daily" | "four times a day" | "qid" => return Some(6),
        _ => {}
    }

    let rest = lower.strip_prefix("every ").unwrap_or(&lower);
    let (number, unit) = split_number(rest)?;

    match unit {
        "" | "h" | "hr" | "hrs" | "hour" | "hours" => Some(number),
        _ => None,
    }
}

/// Parse a treatment duration into days.
///
/// Returns `Ok(None)` for continuous regimens ("continuous", "ongoing",
/// "indefinite", "chronic"). Supports "7", "7d", "7 days", "2 weeks",
/// "1 month" (30 days).
pub fn parse_duration_days(duration: &str) -> Result<Option<i64>, String> {
    let lower = duration.trim().to_lowercase();

    if matches!(
        lower.as_str(),
        "continuous" | "ongoing" | "indefinite" | "chronic" | "forever"
    ) {
        return Ok(None);
    }

    let invalid = || format!("invalid duration '{}'", duration.trim());
    let (number, unit) = split_number(&lower).ok_or_else(invalid)?;

    let days = match unit {
        "" | "d" | "day" | "days" => number,
        "w" | "week" | "weeks" => number.checked_mul(7).ok_or_else(invalid)?,
        "month" | "months" => number.checked_mul(30).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    Ok(Some(days))
}

/// Parse a `NAME:PERIODICITY[:DURATION]` command-line medication argument.
///
/// Examples: `amoxicillin:8:7`, `"vitamin d:daily"`, `ibuprofen:every 6 hours:5 days`.
/// A missing duration means a continuous regimen.
pub fn parse_medication_arg(arg: &str) -> Result<Medication, String> {
    let parts: Vec<&str> = arg.split(':').map(str::trim).collect();

    let (name, periodicity, duration) = match parts.as_slice() {
        [name, periodicity] => (*name, *periodicity, None),
        [name, periodicity, duration] => (*name, *periodicity, Some(*duration)),
        _ => {
            return Err(format!(
                "expected NAME:PERIODICITY[:DURATION], got '{}'",
                arg
            ))
        }
    };

    if name.is_empty() {
        return Err("medication name cannot be empty".to_string());
    }

    let periodicity_hours = parse_periodicity_hours(periodicity).ok_or_else(|| {
        format!(
            "'{}' has no fixed periodicity ('{}'); use e.g. '8', 'every 6 hours', 'twice daily'",
            name, periodicity
        )
    })?;

    let duration_days = match duration {
        Some(d) => parse_duration_days(d)?,
        None => None,
    };

    Ok(Medication::new(name, periodicity_hours, duration_days))
}

/// Split "12 hours" / "12h" / "-3" into the leading integer and the unit.
fn split_number(value: &str) -> Option<(i64, &str)> {
    let value = value.trim();
    let digits_end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(value.len());

    let number = value[..digits_end].parse::<i64>().ok()?;
    Some((number, value[digits_end..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_periodicity() {
        assert_eq!(parse_periodicity_hours("8"), Some(8));
        assert_eq!(parse_periodicity_hours("8h"), Some(8));
        assert_eq!(parse_periodicity_hours("8 hours"), Some(8));
        assert_eq!(parse_periodicity_hours("every 6 hours"), Some(6));
        assert_eq!(parse_periodicity_hours("Every 1 Hour"), Some(1));
        assert_eq!(parse_periodicity_hours("hourly"), Some(1));
        assert_eq!(parse_periodicity_hours("daily"), Some(24));
        assert_eq!(parse_periodicity_hours("twice daily"), Some(12));
        assert_eq!(parse_periodicity_hours("BID"), Some(12));
        assert_eq!(parse_periodicity_hours("three times daily"), Some(8));
        assert_eq!(parse_periodicity_hours("qid"), Some(6));
    }

    #[test]
    fn test_parse_periodicity_unschedulable() {
        assert_eq!(parse_periodicity_hours("prn"), None);
        assert_eq!(parse_periodicity_hours("  As Needed "), None);
        assert_eq!(parse_periodicity_hours(""), None);
        assert_eq!(parse_periodicity_hours("garbage"), None);
        assert_eq!(parse_periodicity_hours("every 2 days"), None);
    }

    #[test]
    fn test_parse_periodicity_passes_through_non_positive() {
        assert_eq!(parse_periodicity_hours("0"), Some(0));
        assert_eq!(parse_periodicity_hours("-4"), Some(-4));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_days("7"), Ok(Some(7)));
        assert_eq!(parse_duration_days("7d"), Ok(Some(7)));
        assert_eq!(parse_duration_days("1 day"), Ok(Some(1)));
        assert_eq!(parse_duration_days("10 days"), Ok(Some(10)));
        assert_eq!(parse_duration_days("2 weeks"), Ok(Some(14)));
        assert_eq!(parse_duration_days("1 month"), Ok(Some(30)));
        assert_eq!(parse_duration_days("continuous"), Ok(None));
        assert_eq!(parse_duration_days("Ongoing"), Ok(None));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration_days("").is_err());
        assert!(parse_duration_days("soon").is_err());
        assert!(parse_duration_days("3 fortnights").is_err());
    }

    #[test]
    fn test_parse_medication_arg() {
        let med = parse_medication_arg("amoxicillin:8:7").unwrap();
        assert_eq!(med.name, "amoxicillin");
        assert_eq!(med.periodicity_hours, 8);
        assert_eq!(med.duration_days, Some(7));

        let med = parse_medication_arg("vitamin d : daily").unwrap();
        assert_eq!(med.name, "vitamin d");
        assert_eq!(med.periodicity_hours, 24);
        assert!(med.is_continuous());

        let med = parse_medication_arg("ibuprofen:every 6 hours:2 weeks").unwrap();
        assert_eq!(med.periodicity_hours, 6);
        assert_eq!(med.duration_days, Some(14));
    }

    #[test]
    fn test_parse_medication_arg_invalid() {
        assert!(parse_medication_arg("amoxicillin").is_err());
        assert!(parse_medication_arg(":8:7").is_err());
        assert!(parse_medication_arg("amoxicillin:prn").is_err());
        assert!(parse_medication_arg("amoxicillin:8:soon").is_err());
        assert!(parse_medication_arg("a:8:7:extra").is_err());
    }
}
