// src/models/student.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::services::progress::StudentProgressReport;

pub const STUDENT_STATUSES: [&str; 3] = ["ACTIVE", "PASSIVE", "GRADUATED"];

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()-]{7,20}$").expect("valid phone regex"));

/// Represents the 'students' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub teacher_id: String,
    pub name: String,
    pub email: Option<String>,

    /// Optional; students without one cannot log in.
    #[serde(skip)]
    pub password: Option<String>,

    pub phone: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub notes: Option<String>,

    /// 'ACTIVE', 'PASSIVE' or 'GRADUATED'.
    pub status: String,

    pub created_at: DateTime<Utc>,
}

/// Student record plus the progress rollup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetails {
    #[serde(flatten)]
    pub student: Student,
    pub progress: StudentProgressReport,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    #[validate(custom(function = validate_phone))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub parent_name: Option<String>,
    #[validate(custom(function = validate_phone))]
    pub parent_phone: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(custom(function = validate_status))]
    pub status: Option<String>,
}

/// DTO for updating a student. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    #[validate(custom(function = validate_phone))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub parent_name: Option<String>,
    #[validate(custom(function = validate_phone))]
    pub parent_phone: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(custom(function = validate_status))]
    pub status: Option<String>,
}

/// Query parameters for listing students.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListParams {
    /// 1-based page (default: 1).
    pub page: Option<i64>,

    /// Page size (default: 20, max: 100).
    pub limit: Option<i64>,

    /// Name or email substring.
    pub q: Option<String>,

    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total_count,
            total_pages,
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    if !PHONE.is_match(phone) {
        return Err(validator::ValidationError::new("invalid_phone"));
    }
    Ok(())
}

fn validate_status(status: &str) -> Result<(), validator::ValidationError> {
    if !STUDENT_STATUSES.contains(&status) {
        return Err(validator::ValidationError::new("invalid_status"));
    }
    Ok(())
}
