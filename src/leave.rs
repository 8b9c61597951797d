use chrono::{DateTime, NaiveDate, Utc};
use serde_derive::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::Session;
use crate::backend::{Backend, BackendError};
use crate::model::{LeaveRequest, LeaveStatus, LeaveType};

#[derive(Error, Debug)]
pub enum LeaveError {
    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("Leave request {0} not found")]
    NotFound(String),

    #[error("Leave request {id} is already {status}")]
    AlreadyReviewed { id: String, status: LeaveStatus },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LeaveError {
    pub fn is_user_error(&self) -> bool {
        !matches!(self, LeaveError::Backend(_))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LeaveForm {
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn status(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }
}

pub fn submit<B: Backend>(
    backend: &B,
    user_id: &str,
    form: &LeaveForm,
    now: DateTime<Utc>,
) -> Result<LeaveRequest, LeaveError> {
    if form.end_date < form.start_date {
        return Err(LeaveError::EndBeforeStart {
            start: form.start_date,
            end: form.end_date,
        });
    }

    let reason = form.reason.trim();
    let request = LeaveRequest {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        leave_type: form.leave_type,
        start_date: form.start_date,
        end_date: form.end_date,
        reason: (!reason.is_empty()).then(|| reason.to_string()),
        status: LeaveStatus::Pending,
        created_at: now,
        updated_at: now,
        reviewer_id: None,
        reviewed_at: None,
    };
    backend.insert_leave_request(&request)?;
    info!(user_id, id = request.id, leave_type = %request.leave_type, "leave requested");
    Ok(request)
}

/// Approves or rejects a pending request on behalf of `reviewer_id`.
pub fn review<B: Backend>(
    backend: &B,
    id: &str,
    decision: Decision,
    reviewer_id: &str,
    now: DateTime<Utc>,
) -> Result<LeaveRequest, LeaveError> {
    let mut request = backend
        .leave_request(id)?
        .ok_or_else(|| LeaveError::NotFound(id.to_string()))?;
    if request.status != LeaveStatus::Pending {
        return Err(LeaveError::AlreadyReviewed {
            id: request.id,
            status: request.status,
        });
    }

    request.status = decision.status();
    request.reviewer_id = Some(reviewer_id.to_string());
    request.reviewed_at = Some(now);
    request.updated_at = now;
    if !backend.update_leave_request(&request)? {
        return Err(LeaveError::NotFound(id.to_string()));
    }
    info!(id, reviewer_id, status = %request.status, "leave reviewed");
    Ok(request)
}

pub fn list<B: Backend>(backend: &B, session: &Session) -> Result<Vec<LeaveRequest>, LeaveError> {
    let user_id = (!session.role.is_reviewer()).then_some(session.user_id.as_str());
    Ok(backend.leave_requests(user_id)?)
}

/// Inclusive day count.
pub fn days(request: &LeaveRequest) -> i64 {
    (request.end_date - request.start_date).num_days() + 1
}
