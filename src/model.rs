use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use rusqlite::{ToSql, types::FromSql};
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, VariantArray};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct Employee {
    #[garde(length(min = 1, max = 32))]
    pub empno: String,
    #[garde(length(max = 64))]
    pub firstname: Option<String>,
    #[garde(length(max = 64))]
    pub lastname: Option<String>,
    #[garde(skip)]
    pub birthdate: Option<NaiveDate>,
    #[garde(skip)]
    pub hiredate: Option<NaiveDate>,
    #[garde(length(chars, max = 1))]
    pub gender: Option<String>,
    #[garde(skip)]
    pub sepdate: Option<NaiveDate>,
}

impl Employee {
    /// First and last name joined by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or_default(),
            self.lastname.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct Department {
    #[garde(length(min = 1, max = 32))]
    pub deptcode: String,
    #[garde(length(max = 128))]
    pub deptname: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct Job {
    #[garde(length(min = 1, max = 32))]
    pub jobcode: String,
    #[garde(length(max = 128))]
    pub jobdesc: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Validate)]
pub struct JobHistory {
    #[garde(length(min = 1, max = 32))]
    pub empno: String,
    #[garde(length(min = 1, max = 32))]
    pub jobcode: String,
    #[garde(length(max = 32))]
    pub deptcode: Option<String>,
    #[garde(skip)]
    pub effdate: NaiveDate,
    #[garde(skip)]
    pub salary: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// An account known to the auth store. `role` is kept as the raw metadata
/// value; use [`User::role`] to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_metadata(self.role.as_deref())
    }

    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Default,
    VariantArray,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[default]
    Employee,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::Admin => "Admin",
        }
    }

    /// Reads a role stored in user metadata. Anything unrecognised is an
    /// employee.
    pub fn from_metadata(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse::<Role>().ok())
            .unwrap_or_default()
    }

    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    VariantArray,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Personal,
    Unpaid,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Sick => "sick",
            LeaveType::Personal => "personal",
            LeaveType::Unpaid => "unpaid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeaveType::Annual => "Annual leave",
            LeaveType::Sick => "Sick leave",
            LeaveType::Personal => "Personal leave",
            LeaveType::Unpaid => "Unpaid leave",
        }
    }
}

impl Display for LeaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    VariantArray,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }
}

impl Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which collections the dashboard shows. Anything other than `All` hides
/// every collection except the selected one.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Default, VariantArray, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TableSelector {
    #[default]
    All,
    Employees,
    Departments,
    Jobs,
    JobHistory,
}

impl TableSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableSelector::All => "all",
            TableSelector::Employees => "employees",
            TableSelector::Departments => "departments",
            TableSelector::Jobs => "jobs",
            TableSelector::JobHistory => "jobHistory",
        }
    }

    pub fn shows(&self, other: TableSelector) -> bool {
        *self == TableSelector::All || *self == other
    }
}

impl Display for TableSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

macro_rules! text_enum_sql {
    ($typ:ty, $name:literal) => {
        impl ToSql for $typ {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $typ {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                match value {
                    rusqlite::types::ValueRef::Text(s) => std::str::from_utf8(s)
                        .ok()
                        .and_then(|s| s.parse::<$typ>().ok())
                        .ok_or_else(|| {
                            rusqlite::types::FromSqlError::Other(
                                format!(
                                    "Unrecognized {}: {}",
                                    $name,
                                    String::from_utf8_lossy(s)
                                )
                                .into(),
                            )
                        }),
                    _ => Err(rusqlite::types::FromSqlError::InvalidType),
                }
            }
        }
    };
}

text_enum_sql!(LeaveType, "LeaveType");
text_enum_sql!(LeaveStatus, "LeaveStatus");
