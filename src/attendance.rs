use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::Session;
use crate::backend::{Backend, BackendError};
use crate::model::AttendanceRecord;

pub const STATUS_PRESENT: &str = "present";

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Already clocked in on {0}")]
    AlreadyClockedIn(NaiveDate),

    #[error("Not clocked in today")]
    NotClockedIn,

    #[error("Already clocked out on {0}")]
    AlreadyClockedOut(NaiveDate),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AttendanceError {
    pub fn is_user_error(&self) -> bool {
        !matches!(self, AttendanceError::Backend(_))
    }
}

/// Today's record for the user, if they have clocked in. "Today" is the UTC
/// date of `now`.
pub fn today<B: Backend>(
    backend: &B,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<AttendanceRecord>, AttendanceError> {
    Ok(backend.attendance_on(user_id, now.date_naive())?)
}

pub fn clock_in<B: Backend>(
    backend: &B,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord, AttendanceError> {
    let date = now.date_naive();
    if backend.attendance_on(user_id, date)?.is_some() {
        return Err(AttendanceError::AlreadyClockedIn(date));
    }

    let record = AttendanceRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        date,
        clock_in: Some(now),
        clock_out: None,
        status: Some(STATUS_PRESENT.to_string()),
        notes: None,
        created_at: now,
        updated_at: now,
    };
    backend.insert_attendance(&record)?;
    info!(user_id, %date, "clocked in");
    Ok(record)
}

pub fn clock_out<B: Backend>(
    backend: &B,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord, AttendanceError> {
    let date = now.date_naive();
    let mut record = match backend.attendance_on(user_id, date)? {
        Some(r) if r.clock_in.is_some() => r,
        _ => return Err(AttendanceError::NotClockedIn),
    };
    if record.clock_out.is_some() {
        return Err(AttendanceError::AlreadyClockedOut(date));
    }

    record.clock_out = Some(now);
    record.updated_at = now;
    backend.update_attendance(&record)?;
    info!(user_id, %date, "clocked out");
    Ok(record)
}

/// The session's own records, or everyone's for managers and admins.
pub fn list<B: Backend>(
    backend: &B,
    session: &Session,
) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let user_id = (!session.role.is_reviewer()).then_some(session.user_id.as_str());
    Ok(backend.attendance(user_id)?)
}

pub fn worked(record: &AttendanceRecord) -> Option<Duration> {
    match (record.clock_in, record.clock_out) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    }
}

/// `7h 05m`
pub fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
