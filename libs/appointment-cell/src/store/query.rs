use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AppointmentValidationRules,
    CheckinQuery, ListAppointmentsParams, ListCheckinsParams, PatientCheckin,
};
use crate::services::validation::parse_date;

/// Default page size, or the requested one up to `max`.
pub fn page_limit(requested: Option<i64>, default: usize, max: usize) -> usize {
    match requested {
        Some(l) if l > 0 => (l as usize).min(max),
        _ => default,
    }
}

pub fn page_offset(requested: Option<i64>) -> usize {
    requested.filter(|o| *o > 0).unwrap_or(0) as usize
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

impl AppointmentQuery {
    /// Build a query from raw listing parameters, clamping the page size.
    pub fn from_params(params: &ListAppointmentsParams, rules: &AppointmentValidationRules) -> Result<Self, AppointmentError> {
        let status = params.status.as_deref().map(str::parse::<AppointmentStatus>).transpose()?;
        let date = params.date.as_deref().map(parse_date).transpose()?;

        Ok(Self {
            clinic_id: params.clinic_id,
            doctor_id: params.doctor_id,
            patient_id: params.patient_id,
            status,
            date,
            limit: page_limit(params.limit, rules.default_page_size, rules.max_page_size),
            offset: page_offset(params.offset),
        })
    }

    /// PostgREST query string for the `appointments` table.
    pub fn to_postgrest(&self) -> String {
        let mut parts = vec!["select=*".to_string()];

        if let Some(id) = self.clinic_id {
            parts.push(format!("clinic_id=eq.{}", id));
        }
        if let Some(id) = self.doctor_id {
            parts.push(format!("doctor_id=eq.{}", id));
        }
        if let Some(id) = self.patient_id {
            parts.push(format!("patient_id=eq.{}", id));
        }
        if let Some(status) = self.status {
            parts.push(format!("status=eq.{}", status.as_str()));
        }
        if let Some(date) = self.date {
            parts.push(format!("appointment_date=eq.{}", date.format("%Y-%m-%d")));
        }

        parts.push("order=appointment_time.desc,booking_number.asc".to_string());
        parts.push(format!("limit={}", self.limit));
        parts.push(format!("offset={}", self.offset));

        parts.join("&")
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.clinic_id.map_or(true, |id| appointment.clinic_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
            && self.date.map_or(true, |d| appointment.appointment_date == d)
    }
}

impl CheckinQuery {
    pub fn from_params(params: &ListCheckinsParams, rules: &AppointmentValidationRules) -> Result<Self, AppointmentError> {
        Ok(Self {
            appointment_id: params.appointment_id,
            clinic_id: params.clinic_id,
            doctor_id: params.doctor_id,
            date: params.date.as_deref().map(parse_date).transpose()?,
            limit: page_limit(params.limit, rules.default_page_size, rules.max_page_size),
            offset: page_offset(params.offset),
        })
    }

    /// `[start, end)` of the check-in day.
    pub fn day_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.date
            .map(|date| (midnight_utc(date), midnight_utc(date + Duration::days(1))))
    }

    /// PostgREST query string for `patient_checkins`. Clinic and doctor
    /// filters go through an inner join on the appointment.
    pub fn to_postgrest(&self) -> String {
        let mut parts = Vec::new();

        if self.clinic_id.is_some() || self.doctor_id.is_some() {
            parts.push("select=*,appointments!inner(clinic_id,doctor_id)".to_string());
        } else {
            parts.push("select=*".to_string());
        }
        if let Some(id) = self.appointment_id {
            parts.push(format!("appointment_id=eq.{}", id));
        }
        if let Some(id) = self.clinic_id {
            parts.push(format!("appointments.clinic_id=eq.{}", id));
        }
        if let Some(id) = self.doctor_id {
            parts.push(format!("appointments.doctor_id=eq.{}", id));
        }
        if let Some((start, end)) = self.day_bounds() {
            // the offset's `+` must not reach PostgREST as a space
            parts.push(format!("checkin_time=gte.{}", urlencoding::encode(&start.to_rfc3339())));
            parts.push(format!("checkin_time=lt.{}", urlencoding::encode(&end.to_rfc3339())));
        }

        parts.push("order=checkin_time.desc".to_string());
        parts.push(format!("limit={}", self.limit));
        parts.push(format!("offset={}", self.offset));

        parts.join("&")
    }

    pub fn matches(&self, checkin: &PatientCheckin, appointment: Option<&Appointment>) -> bool {
        self.appointment_id.map_or(true, |id| checkin.appointment_id == id)
            && self.clinic_id.map_or(true, |id| appointment.map_or(false, |a| a.clinic_id == id))
            && self.doctor_id.map_or(true, |id| appointment.map_or(false, |a| a.doctor_id == id))
            && self
                .day_bounds()
                .map_or(true, |(start, end)| checkin.checkin_time >= start && checkin.checkin_time < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use uuid::Uuid;

    fn params() -> ListAppointmentsParams {
        ListAppointmentsParams {
            clinic_id: None,
            doctor_id: None,
            patient_id: None,
            status: None,
            date: None,
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn page_size_is_defaulted_and_clamped() {
        let rules = AppointmentValidationRules::default();

        let q = AppointmentQuery::from_params(&params(), &rules).unwrap();
        assert_eq!((q.limit, q.offset), (50, 0));

        let q = AppointmentQuery::from_params(&ListAppointmentsParams { limit: Some(1000), offset: Some(-5), ..params() }, &rules).unwrap();
        assert_eq!((q.limit, q.offset), (200, 0));

        let q = AppointmentQuery::from_params(&ListAppointmentsParams { limit: Some(0), ..params() }, &rules).unwrap();
        assert_eq!(q.limit, 50);
    }

    #[test]
    fn filters_translate_to_postgrest() {
        let doctor = Uuid::new_v4();
        let q = AppointmentQuery::from_params(
            &ListAppointmentsParams {
                doctor_id: Some(doctor),
                status: Some("arrived".into()),
                date: Some("2024-01-10".into()),
                limit: Some(10),
                offset: Some(20),
                ..params()
            },
            &AppointmentValidationRules::default(),
        )
        .unwrap();

        assert_eq!(q.status, Some(AppointmentStatus::Arrived));
        assert_eq!(
            q.to_postgrest(),
            format!(
                "select=*&doctor_id=eq.{}&status=eq.arrived&appointment_date=eq.2024-01-10&order=appointment_time.desc,booking_number.asc&limit=10&offset=20",
                doctor
            )
        );
    }

    #[test]
    fn checkin_filters_join_through_the_appointment() {
        let clinic = Uuid::new_v4();
        let q = CheckinQuery::from_params(
            &ListCheckinsParams {
                clinic_id: Some(clinic),
                date: Some("2024-01-10".into()),
                ..Default::default()
            },
            &AppointmentValidationRules::default(),
        )
        .unwrap();

        assert_eq!(
            q.to_postgrest(),
            format!(
                "select=*,appointments!inner(clinic_id,doctor_id)&appointments.clinic_id=eq.{}\
                 &checkin_time=gte.2024-01-10T00%3A00%3A00%2B00%3A00\
                 &checkin_time=lt.2024-01-11T00%3A00%3A00%2B00%3A00\
                 &order=checkin_time.desc&limit=50&offset=0",
                clinic
            )
        );
    }

    #[test]
    fn invalid_filters_are_validation_errors() {
        let rules = AppointmentValidationRules::default();
        let bad_status = ListAppointmentsParams { status: Some("done".into()), ..params() };
        assert!(AppointmentQuery::from_params(&bad_status, &rules).is_err());
        let bad_date = ListAppointmentsParams { date: Some("10-01-2024".into()), ..params() };
        assert!(AppointmentQuery::from_params(&bad_date, &rules).is_err());
    }
}
