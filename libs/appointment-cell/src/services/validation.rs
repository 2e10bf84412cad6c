use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{AppointmentError, AppointmentValidationRules, VitalSigns};

pub fn parse_date(value: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppointmentError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", value))
    })
}

/// Accepts `YYYY-MM-DD HH:MM:SS` and the ISO `T`-separated form.
pub fn parse_appointment_time(value: &str) -> Result<NaiveDateTime, AppointmentError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| {
            AppointmentError::ValidationError(format!(
                "Invalid appointment time '{}', expected YYYY-MM-DD HH:MM:SS",
                value
            ))
        })
}

pub fn resolve_duration(requested: Option<i32>, rules: &AppointmentValidationRules) -> Result<i32, AppointmentError> {
    let duration = requested.unwrap_or(rules.default_duration_minutes);
    if duration < rules.min_duration_minutes || duration > rules.max_duration_minutes {
        return Err(AppointmentError::ValidationError(format!(
            "duration_minutes must be between {} and {}",
            rules.min_duration_minutes, rules.max_duration_minutes
        )));
    }
    Ok(duration)
}

fn check_range<T>(field: &str, value: Option<T>, min: T, max: T) -> Result<(), AppointmentError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    match value {
        Some(v) if v < min || v > max => Err(AppointmentError::ValidationError(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, v
        ))),
        _ => Ok(()),
    }
}

/// Physiological plausibility of a vitals reading.
pub fn validate_vitals(signs: &VitalSigns) -> Result<(), AppointmentError> {
    check_range("bp_systolic", signs.bp_systolic, 50, 300)?;
    check_range("bp_diastolic", signs.bp_diastolic, 30, 200)?;
    check_range("temperature", signs.temperature, 30.0, 45.0)?;
    check_range("pulse_rate", signs.pulse_rate, 30, 200)?;
    check_range("height_cm", signs.height_cm, 50.0, 250.0)?;
    check_range("weight_kg", signs.weight_kg, 1.0, 500.0)?;

    if let (Some(systolic), Some(diastolic)) = (signs.bp_systolic, signs.bp_diastolic) {
        if systolic <= diastolic {
            return Err(AppointmentError::ValidationError(
                "bp_systolic must be greater than bp_diastolic".to_string(),
            ));
        }
    }
    Ok(())
}
