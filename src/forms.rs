//! Borrow/reservation form validation.
//!
//! Every field is required: year, department and course must come from the
//! campus catalogs (courses depend on the chosen department), and date/time
//! must be in the shapes the backend expects. Validation runs before any
//! network call; the first violation is surfaced and nothing is sent.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::model::api::{NewBorrowRequest, NewRoomRequest};

pub const YEAR_LEVELS: [&str; 4] = ["1st", "2nd", "3rd", "4th"];

pub const DEPARTMENTS: [&str; 4] = ["CEIT", "CTE", "COT", "CAS"];

const CEIT_COURSES: [&str; 6] = ["BSECE", "BSEE", "BSCoE", "BSIS", "BSInfoTech", "BSCS"];
const CTE_COURSES: [&str; 7] = [
    "BSED-ENGLISH",
    "BSED-FILIPINO",
    "BSED-MATH",
    "BSED-SCIENCES",
    "BEED",
    "BPED",
    "BTVTED",
];
const COT_COURSES: [&str; 12] = [
    "BEET",
    "BEXET",
    "BMET",
    "BMET-MT",
    "BMET-RAC",
    "BSIT-ADT",
    "BSIT-AT",
    "BSIT-ELT",
    "BSIT-ET",
    "BSIT-MT",
    "BSIT-WAF",
    "BSIT-HVACR",
];
const CAS_COURSES: [&str; 3] = ["BSES", "BSMATH", "BA-EL"];

/// Courses offered by a department, None for an unknown department.
pub fn courses_for(department: &str) -> Option<&'static [&'static str]> {
    match department {
        "CEIT" => Some(&CEIT_COURSES),
        "CTE" => Some(&CTE_COURSES),
        "COT" => Some(&COT_COURSES),
        "CAS" => Some(&CAS_COURSES),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("please fill in all fields: {0} is missing")]
    Missing(&'static str),
    #[error("unknown year level '{0}' (expected one of: 1st, 2nd, 3rd, 4th)")]
    UnknownYear(String),
    #[error("unknown department '{0}' (expected one of: CEIT, CTE, COT, CAS)")]
    UnknownDepartment(String),
    #[error("course '{course}' is not offered by {department}")]
    CourseOutsideDepartment { department: String, course: String },
    #[error("date must be YYYY-MM-DD, got '{0}'")]
    BadDate(String),
    #[error("time must be HH:mm, got '{0}'")]
    BadTime(String),
}

/// The borrowing request form, common to items and rooms.
#[derive(Debug, Clone, Default)]
pub struct RequestForm {
    pub name: String,
    pub borrower_id: String,
    pub year: String,
    pub department: String,
    pub course: String,
    pub date: String,
    pub time_in: String,
    pub time_out: String,
}

fn require(value: &str, field: &'static str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        Err(FormError::Missing(field))
    } else {
        Ok(())
    }
}

fn validate_date(raw: &str) -> Result<String, FormError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| FormError::BadDate(raw.to_owned()))
}

fn validate_time(raw: &str) -> Result<String, FormError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| FormError::BadTime(raw.to_owned()))
}

impl RequestForm {
    /// Check the whole form; on success return the normalized
    /// (date, time_in, time_out) triple that goes on the wire.
    fn validate(&self) -> Result<(String, String, String), FormError> {
        require(&self.name, "full name")?;
        require(&self.borrower_id, "ID number")?;
        require(&self.year, "year level")?;
        require(&self.department, "department")?;
        require(&self.course, "course")?;
        require(&self.date, "date")?;
        require(&self.time_in, "time in")?;
        require(&self.time_out, "time out")?;

        if !YEAR_LEVELS.contains(&self.year.as_str()) {
            return Err(FormError::UnknownYear(self.year.clone()));
        }
        let courses = courses_for(&self.department)
            .ok_or_else(|| FormError::UnknownDepartment(self.department.clone()))?;
        if !courses.contains(&self.course.as_str()) {
            return Err(FormError::CourseOutsideDepartment {
                department: self.department.clone(),
                course: self.course.clone(),
            });
        }

        let date = validate_date(&self.date)?;
        let time_in = validate_time(&self.time_in)?;
        let time_out = validate_time(&self.time_out)?;
        Ok((date, time_in, time_out))
    }

    pub fn into_borrow_request(self, item_id: i64) -> Result<NewBorrowRequest, FormError> {
        let (date, time_in, time_out) = self.validate()?;
        Ok(NewBorrowRequest {
            name: self.name,
            borrower_id: self.borrower_id,
            year: self.year,
            department: self.department,
            course: self.course,
            date,
            time_in,
            time_out,
            item_id,
        })
    }

    pub fn into_room_request(self, room_id: i64) -> Result<NewRoomRequest, FormError> {
        let (date, time_in, time_out) = self.validate()?;
        Ok(NewRoomRequest {
            name: self.name,
            borrower_id: self.borrower_id,
            year: self.year,
            department: self.department,
            course: self.course,
            date,
            time_in,
            time_out,
            room_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> RequestForm {
        RequestForm {
            name: "Alice Santos".to_owned(),
            borrower_id: "2021-0042".to_owned(),
            year: "2nd".to_owned(),
            department: "CEIT".to_owned(),
            course: "BSCS".to_owned(),
            date: "2024-05-01".to_owned(),
            time_in: "08:00".to_owned(),
            time_out: "10:30".to_owned(),
        }
    }

    #[test]
    fn complete_form_builds_payload() {
        let req = filled().into_borrow_request(3).unwrap();
        assert_eq!(req.item_id, 3);
        assert_eq!(req.date, "2024-05-01");
        assert_eq!(req.time_in, "08:00");
    }

    #[test]
    fn missing_field_is_rejected_before_any_call() {
        let mut form = filled();
        form.name.clear();
        assert_eq!(
            filled_err(form),
            FormError::Missing("full name")
        );
    }

    fn filled_err(form: RequestForm) -> FormError {
        form.into_borrow_request(1).unwrap_err()
    }

    #[test]
    fn year_must_come_from_catalog() {
        let mut form = filled();
        form.year = "5th".to_owned();
        assert_eq!(filled_err(form), FormError::UnknownYear("5th".to_owned()));
    }

    #[test]
    fn course_must_belong_to_department() {
        let mut form = filled();
        form.department = "CAS".to_owned();
        // BSCS is a CEIT course
        assert_eq!(
            filled_err(form),
            FormError::CourseOutsideDepartment {
                department: "CAS".to_owned(),
                course: "BSCS".to_owned(),
            }
        );
    }

    #[test]
    fn seconds_are_accepted_and_normalized() {
        let mut form = filled();
        form.time_in = "08:00:00".to_owned();
        let req = form.into_room_request(2).unwrap();
        assert_eq!(req.time_in, "08:00");
        assert_eq!(req.room_id, 2);
    }

    #[test]
    fn malformed_date_and_time_are_rejected() {
        let mut form = filled();
        form.date = "01/05/2024".to_owned();
        assert_eq!(filled_err(form), FormError::BadDate("01/05/2024".to_owned()));

        let mut form = filled();
        form.time_out = "25:00".to_owned();
        assert_eq!(filled_err(form), FormError::BadTime("25:00".to_owned()));
    }
}
