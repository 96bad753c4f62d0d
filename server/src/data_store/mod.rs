//! The backend part of the backend: the database interface
//!
//! The primary entry point to this module is the function [get_store_from_env], which returns an
//! object implementing the [PortalStore] trait. This object can be shared between threads in a
//! global application state and be used to create [PortalStoreFacade] instances for interaction
//! with the database. These provide a query interface using the data models from the [models]
//! module.
//!
//! The primary implementation of [PortalStore] ([postgres::PgDataStore]) wraps a PostgreSQL
//! connection pool and its corresponding [PortalStoreFacade] objects
//! ([postgres::PgDataStoreFacade]) hold a reference to one pooled connection each, using the
//! Diesel query DSL for implementing the database interaction.
//!
//! There is also a mock implementation for unittests.
//!
//! The filter structures in this module ([MenuFilter], [CourseSearch]) describe queries
//! declaratively. Each carries a pure `matches()` implementation mirroring the SQL semantics,
//! which is used by the mock store and by unittests of the filter logic itself.

use crate::cli_error::CliError;
use crate::cli_error::CliError::UnexpectedStoreError;
use crate::setup;
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Debug;

pub mod models;
mod postgres;
mod schema;
#[cfg(test)]
pub mod store_mock;

/// Get a [PortalStore] instance, according to the "DATABASE_URL" environment variable.
///
/// The DATABASE_URL must be a PostgreSQL connection url, following the schema
/// "postgres://{user}:{password}@{host}/{database}".
pub fn get_store_from_env() -> Result<impl PortalStore, CliError> {
    postgres::PgDataStore::new(&setup::get_database_url_from_env()?)
        .map_err(|err| UnexpectedStoreError(err.to_string()))
}

pub type MenuId = i32;
pub type DepartmentId = i32;
pub type CourseId = i32;
pub type MeetingId = i32;
pub type PageId = i32;
pub type UserId = i32;
pub type GroupId = i32;
pub type PositionId = i32;
pub type AppointmentId = i32;
pub type DocumentId = uuid::Uuid;

pub trait PortalStore: Send + Sync {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn PortalStoreFacade + 'a>, StoreError>;
}

pub trait PortalStoreFacade {
    /// Get all menus matching the given filter, ordered by (dining_hall, day, meal).
    ///
    /// An empty result is not an error; "nothing matched" is an empty list.
    fn get_menus(&mut self, filter: MenuFilter) -> Result<Vec<models::Menu>, StoreError>;

    /// Get all departments that offer at least one course, ordered by department code
    fn get_departments_with_courses(&mut self) -> Result<Vec<models::Department>, StoreError>;

    /// Execute a course search.
    ///
    /// The result is deduplicated and ordered by course code. See [CourseSearch] for the
    /// filter semantics.
    fn search_courses(
        &mut self,
        search: &CourseSearch,
    ) -> Result<Vec<models::FullCourse>, StoreError>;

    /// Resolve a slash-separated slug path in the page tree.
    ///
    /// The first segment is looked up among top-level non-managed pages, each further segment
    /// among the children of the previously resolved page. Returns
    /// `Err(StoreError::NotExisting)` if any segment has no match.
    fn resolve_page(&mut self, segments: &[&str]) -> Result<models::ResolvedPage, StoreError>;

    /// Get positions with their current appointee (if any), ordered by (sort_order, title).
    ///
    /// With `only_active`, positions marked inactive are skipped. The current appointee is the
    /// earliest-starting appointment with `start <= today <= end` (or no end date).
    fn get_positions(
        &mut self,
        only_active: bool,
        today: NaiveDate,
    ) -> Result<Vec<models::PositionWithAppointee>, StoreError>;

    /// Create a new position. Its sort_order is assigned automatically as the next value after
    /// the current maximum and is never reassigned or reused afterwards.
    fn create_position(&mut self, position: models::NewPosition)
        -> Result<PositionId, StoreError>;

    fn create_appointment(
        &mut self,
        appointment: models::NewAppointment,
    ) -> Result<AppointmentId, StoreError>;

    /// Synchronize group memberships and the staff flag of a user with their appointments.
    ///
    /// This is invoked by the login flow after every successful password authentication.
    /// Expired appointments (end date today or earlier) revoke the position's groups and the
    /// staff flag; an active appointment matching the login id binds the appointment to the
    /// user, sets the staff flag and adds the position's groups (additively). If several
    /// appointments match a lookup, the most recent one wins (latest end date for the
    /// expiry cleanup, latest start date for the grant).
    fn sync_permissions_on_login(
        &mut self,
        username: &str,
        today: NaiveDate,
    ) -> Result<models::SyncReport, StoreError>;

    /// Get all documents, ordered by (uploaded_at, title)
    fn get_documents(&mut self) -> Result<Vec<models::Document>, StoreError>;

    /// Record an uploaded document. The file itself must already have been placed at the
    /// document's `file_path` below the media root; documents are immutable once created.
    fn create_document(&mut self, document: models::NewDocument) -> Result<(), StoreError>;

    fn get_user(&mut self, user_id: UserId) -> Result<models::User, StoreError>;
    fn get_user_by_username(&mut self, username: &str) -> Result<models::User, StoreError>;
    fn get_user_by_api_token(&mut self, token: &str) -> Result<models::User, StoreError>;
    fn create_user(&mut self, user: models::NewUser) -> Result<UserId, StoreError>;

    /// Get the user's API token, creating it with the given candidate value if the user does
    /// not have one yet. The candidate is ignored when a token already exists.
    fn get_or_create_api_token(
        &mut self,
        user_id: UserId,
        candidate_token: String,
    ) -> Result<models::ApiToken, StoreError>;
}

/// Filter options for retrieving menus via [PortalStoreFacade::get_menus]
///
/// All fields are exact-match constraints; a `None` field imposes no constraint. The menu
/// endpoints form a narrowing chain by filling in more and more fields.
#[derive(Default, Clone)]
pub struct MenuFilter {
    pub dining_hall: Option<String>,
    pub day: Option<String>,
    pub meal: Option<String>,
}

impl MenuFilter {
    /// Checks if a given menu matches the filter
    ///
    /// Usually, filtering should be done by the database. This function is used by the mock
    /// store and for separate checks of individual menus in software.
    pub fn matches(&self, menu: &models::Menu) -> bool {
        if let Some(dining_hall) = &self.dining_hall {
            if *dining_hall != menu.dining_hall {
                return false;
            }
        }
        if let Some(day) = &self.day {
            if *day != menu.day {
                return false;
            }
        }
        if let Some(meal) = &self.meal {
            if *meal != menu.meal {
                return false;
            }
        }
        true
    }
}

/// The seven campuses a meeting can take place at, stored as their numeric database id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Campus {
    Cgu = 1,
    Cm = 2,
    Cu = 3,
    Hm = 4,
    Po = 5,
    Pz = 6,
    Sc = 7,
}

impl Campus {
    pub fn name(&self) -> &'static str {
        match self {
            Campus::Cgu => "CGU",
            Campus::Cm => "CM",
            Campus::Cu => "CU",
            Campus::Hm => "HM",
            Campus::Po => "PO",
            Campus::Pz => "PZ",
            Campus::Sc => "SC",
        }
    }
}

impl TryFrom<i32> for Campus {
    type Error = EnumMemberNotExistingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Campus::Cgu),
            2 => Ok(Campus::Cm),
            3 => Ok(Campus::Cu),
            4 => Ok(Campus::Hm),
            5 => Ok(Campus::Po),
            6 => Ok(Campus::Pz),
            7 => Ok(Campus::Sc),
            value => Err(EnumMemberNotExistingError {
                member_value: value,
                enum_name: "Campus",
            }),
        }
    }
}

pub struct EnumMemberNotExistingError {
    pub member_value: i32,
    pub enum_name: &'static str,
}

impl std::fmt::Display for EnumMemberNotExistingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is not a valid value for the {} enum",
            self.member_value, self.enum_name
        )
    }
}

/// How the requested weekday flags of a [CourseSearch] are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayMode {
    /// The course must have a meeting on each requested day; other days don't matter.
    #[default]
    AtLeast,
    /// The course's meeting days must exactly match the requested days: a meeting on each
    /// requested day, no meeting on any non-requested day.
    Only,
}

/// Credit constraint of a [CourseSearch]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CreditFilter {
    /// No constraint
    #[default]
    Any,
    /// credit >= 1.0
    Full,
    /// 0.0 < credit < 1.0
    Partial,
    /// Exact credit value
    Exact(f64),
}

impl CreditFilter {
    pub fn matches(&self, credit: f64) -> bool {
        match self {
            CreditFilter::Any => true,
            CreditFilter::Full => credit >= 1.0,
            CreditFilter::Partial => credit > 0.0 && credit < 1.0,
            CreditFilter::Exact(value) => credit == *value,
        }
    }
}

lazy_static! {
    static ref KEYWORD_REGEX: Regex = Regex::new(r"(\w+)").unwrap();
}

/// Tokenize a free-text keyword input on word boundaries and lowercase the tokens.
pub fn tokenize_keywords(input: &str) -> Vec<String> {
    KEYWORD_REGEX
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// A declarative course search, assembled by the search form and executed via
/// [PortalStoreFacade::search_courses]
///
/// Every field is an optional constraint; [CourseSearch::is_unconstrained] checks whether no
/// constraint is given at all (which the form rejects). `keywords` must already be tokenized
/// with [tokenize_keywords].
#[derive(Debug, Clone, Default)]
pub struct CourseSearch {
    pub department: Option<DepartmentId>,
    pub mode: DayMode,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    /// Require some meeting beginning at or after this time
    pub start_range: Option<NaiveTime>,
    /// Require some meeting ending at or before this time
    pub end_range: Option<NaiveTime>,
    /// Case-insensitive substring match on the instructor name (empty = no constraint)
    pub instructor: String,
    /// Only courses with at least this many spots (0 = no constraint)
    pub min_class_size: i32,
    pub credit: CreditFilter,
    pub keywords: Vec<String>,
    pub campuses: Vec<Campus>,
}

impl CourseSearch {
    pub fn requested_days(&self) -> [bool; 5] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
        ]
    }

    /// Check whether the search carries no constraint at all.
    ///
    /// The day mode on its own is not a constraint.
    pub fn is_unconstrained(&self) -> bool {
        self.department.is_none()
            && !self.requested_days().iter().any(|d| *d)
            && self.start_range.is_none()
            && self.end_range.is_none()
            && self.instructor.is_empty()
            && self.min_class_size <= 0
            && matches!(self.credit, CreditFilter::Any)
            && self.keywords.is_empty()
            && self.campuses.is_empty()
    }

    /// Checks if a given course matches the search
    ///
    /// This is the in-software mirror of the SQL query built by the Postgres store; the mock
    /// store uses it for filtering and the unittests below pin down the search semantics
    /// against it.
    pub fn matches(&self, course: &models::FullCourse) -> bool {
        if let Some(department) = self.department {
            if !course.department_ids.contains(&department) {
                return false;
            }
        }

        let meeting_days =
            |m: &models::Meeting| [m.monday, m.tuesday, m.wednesday, m.thursday, m.friday];
        match self.mode {
            DayMode::Only => {
                // Independently per weekday: a requested day needs some meeting on that day,
                // a non-requested day must have none.
                for (day_index, requested) in self.requested_days().iter().enumerate() {
                    let has_meeting = course
                        .meetings
                        .iter()
                        .any(|m| meeting_days(m)[day_index]);
                    if *requested != has_meeting {
                        return false;
                    }
                }
            }
            DayMode::AtLeast => {
                for (day_index, requested) in self.requested_days().iter().enumerate() {
                    if *requested
                        && !course
                            .meetings
                            .iter()
                            .any(|m| meeting_days(m)[day_index])
                    {
                        return false;
                    }
                }
            }
        }

        if let Some(start_range) = self.start_range {
            if !course.meetings.iter().any(|m| m.begin >= start_range) {
                return false;
            }
        }
        if let Some(end_range) = self.end_range {
            if !course.meetings.iter().any(|m| m.end <= end_range) {
                return false;
            }
        }

        if !self.campuses.is_empty()
            && !course.meetings.iter().any(|m| {
                Campus::try_from(m.campus)
                    .map(|c| self.campuses.contains(&c))
                    .unwrap_or(false)
            })
        {
            return false;
        }

        if !self.instructor.is_empty()
            && !course
                .course
                .instructor
                .to_lowercase()
                .contains(&self.instructor.to_lowercase())
        {
            return false;
        }

        if !self.credit.matches(course.course.credit) {
            return false;
        }

        if self.min_class_size > 0 && course.course.spots < self.min_class_size {
            return false;
        }

        if !self.keywords.is_empty() {
            let description = course.course.description.to_lowercase();
            let name = course.course.name.to_lowercase();
            let all_in = |haystack: &str| self.keywords.iter().all(|kw| haystack.contains(kw));
            if !all_in(&description) && !all_in(&name) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// Connection to the database failed. See string description for details.
    ConnectionError(String),
    /// The query could not be executed because of some error not covered by the other members
    /// (see string description)
    QueryError(diesel::result::Error),
    /// Database transaction could not be committed due to a conflicting concurrent transaction
    TransactionConflict,
    /// The requested entity does not exist
    NotExisting,
    /// The entity could not be created because it already exists
    ConflictEntityExists,
    /// The provided data is invalid, i.e. it does not match the expected ranges or violates a
    /// SQL constraint. See string description for details.
    InvalidInputData(String),
    /// Some data queried from the database could not be deserialized. See string description
    /// for details.
    InvalidDataInDatabase(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => Self::NotExisting,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => Self::ConflictEntityExists,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _,
            ) => Self::TransactionConflict,
            diesel::result::Error::DatabaseError(
                e @ diesel::result::DatabaseErrorKind::ForeignKeyViolation
                | e @ diesel::result::DatabaseErrorKind::CheckViolation,
                _,
            ) => Self::InvalidInputData(format!("{:?}", e)),
            diesel::result::Error::SerializationError(e) => Self::InvalidInputData(e.to_string()),
            diesel::result::Error::DeserializationError(e) => {
                Self::InvalidDataInDatabase(e.to_string())
            }
            _ => Self::QueryError(error),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(error: r2d2::Error) -> Self {
        Self::ConnectionError(error.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Error connecting to database: {}", e),
            Self::QueryError(e) => write!(f, "Error while executing database query: {}", e),
            Self::TransactionConflict => f.write_str(
                "Database transaction could not be committed due to a conflicting concurrent transaction",
            ),
            Self::NotExisting => f.write_str("Database record does not exist."),
            Self::ConflictEntityExists => f.write_str("Database record exists already."),
            Self::InvalidInputData(e) => {
                write!(f, "Data to be stored in database is not valid: {}", e)
            }
            Self::InvalidDataInDatabase(e) => {
                write!(f, "Data queried from database could not be deserialized: {}", e)
            }
        }
    }
}

impl std::error::Error for StoreError {}
