use crate::data_store::{DepartmentId, GroupId, PageId, PositionId, UserId};
use chrono::{naive::NaiveDate, DateTime, NaiveTime, Utc};
use diesel::deserialize::FromSql;
use diesel::prelude::*;
use diesel::query_builder::bind_collector::RawBytesBindCollector;
use diesel::serialize::ToSql;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name=super::schema::menus)]
pub struct Menu {
    pub id: i32,
    pub dining_hall: String,
    pub day: String,
    pub meal: String,
    pub food_items: FoodItems,
}

impl From<Menu> for portal_api_types::Menu {
    fn from(value: Menu) -> Self {
        Self {
            id: value.id,
            dining_hall: value.dining_hall,
            day: value.day,
            meal: value.meal,
            food_items: value.food_items.0,
        }
    }
}

/// The list of food items of a menu, stored as a JSONB array of strings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, AsExpression, FromSqlRow)]
#[diesel(sql_type = diesel::sql_types::Jsonb)]
pub struct FoodItems(pub Vec<String>);

impl<DB> FromSql<diesel::sql_types::Jsonb, DB> for FoodItems
where
    DB: diesel::backend::Backend,
    serde_json::Value: FromSql<diesel::sql_types::Jsonb, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = serde_json::Value::from_sql(bytes)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<DB> ToSql<diesel::sql_types::Jsonb, DB> for FoodItems
where
    DB: diesel::backend::Backend,
    for<'c> DB: diesel::backend::Backend<BindCollector<'c> = RawBytesBindCollector<DB>>,
    serde_json::Value: ToSql<diesel::sql_types::Jsonb, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        let value = serde_json::to_value(self)?;
        value.to_sql(&mut out.reborrow())
    }
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::departments)]
pub struct Department {
    pub id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::courses)]
pub struct Course {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub description: String,
    pub instructor: String,
    pub credit: f64,
    pub spots: i32,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name=super::schema::meetings)]
#[diesel(belongs_to(Course))]
pub struct Meeting {
    pub id: i32,
    pub course_id: i32,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub begin: NaiveTime,
    pub end: NaiveTime,
    pub campus: i32,
}

impl Meeting {
    /// Short textual representation of the meeting days, e.g. "MWF"
    pub fn days_string(&self) -> String {
        [
            (self.monday, "M"),
            (self.tuesday, "T"),
            (self.wednesday, "W"),
            (self.thursday, "R"),
            (self.friday, "F"),
        ]
        .iter()
        .filter(|(day, _)| *day)
        .map(|(_, letter)| *letter)
        .collect()
    }
}

// Introduce type for the Course-Department association, to simplify grouped retrieval of the
// department_ids of a Course using Diesel's .grouped_by() method.
#[derive(Queryable, Associations, Identifiable, Selectable)]
#[diesel(table_name=super::schema::course_departments)]
#[diesel(primary_key(course_id, department_id))]
#[diesel(belongs_to(Course))]
pub struct CourseDepartmentMapping {
    pub course_id: i32,
    pub department_id: i32,
}

/// A course together with its meetings and department associations, as returned by a course
/// search
#[derive(Clone, Debug)]
pub struct FullCourse {
    pub course: Course,
    pub meetings: Vec<Meeting>,
    pub department_ids: Vec<DepartmentId>,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::pages)]
pub struct Page {
    pub id: i32,
    pub parent_id: Option<PageId>,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub managed: bool,
    pub sort_key: i32,
}

/// The result of resolving a slug path in the page tree
#[derive(Clone, Debug)]
pub struct ResolvedPage {
    pub page: Page,
    /// The slug of the top-level page the resolved page belongs to, for navigation highlighting
    pub active_section: String,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_active: bool,
}

#[derive(Insertable)]
#[diesel(table_name=super::schema::users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub is_staff: bool,
    pub is_active: bool,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::groups)]
pub struct Group {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name=super::schema::positions)]
pub struct Position {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub active: bool,
    pub sort_order: i32,
}

/// A new position, without the sort_order, which is assigned by the store on creation
pub struct NewPosition {
    pub title: String,
    pub description: String,
    pub active: bool,
}

#[derive(Queryable, Associations, Identifiable, Selectable)]
#[diesel(table_name=super::schema::position_groups)]
#[diesel(primary_key(position_id, group_id))]
#[diesel(belongs_to(Position))]
pub struct PositionGroupMapping {
    pub position_id: PositionId,
    pub group_id: GroupId,
}

#[derive(Queryable, Associations, Identifiable, Selectable)]
#[diesel(table_name=super::schema::user_groups)]
#[diesel(primary_key(user_id, group_id))]
#[diesel(belongs_to(User))]
pub struct UserGroupMapping {
    pub user_id: UserId,
    pub group_id: GroupId,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name=super::schema::appointments)]
#[diesel(belongs_to(Position))]
pub struct Appointment {
    pub id: i32,
    pub position_id: PositionId,
    pub name: String,
    /// The university login id of the appointee, used to bind the appointment to a user account
    /// on their first login during the term
    pub login_id: String,
    pub user_id: Option<UserId>,
    pub start: NaiveDate,
    /// An appointment without end date is ongoing
    pub end: Option<NaiveDate>,
}

impl Appointment {
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.start <= today && self.end.map(|end| today <= end).unwrap_or(true)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end.map(|end| end <= today).unwrap_or(false)
    }
}

#[derive(Insertable)]
#[diesel(table_name=super::schema::appointments)]
pub struct NewAppointment {
    pub position_id: PositionId,
    pub name: String,
    pub login_id: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// A position with its currently active appointment (if any), for the position listings
#[derive(Clone, Debug)]
pub struct PositionWithAppointee {
    pub position: Position,
    pub appointee: Option<Appointment>,
}

/// The outcome of a permission synchronization run, for logging
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    /// Titles of positions whose permissions have been revoked due to an expired appointment
    pub revoked: Vec<String>,
    /// Titles of positions whose permissions have been granted due to an active appointment
    pub granted: Vec<String>,
}

#[derive(Clone, Debug, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name=super::schema::documents)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub authors: String,
    pub description: String,
    pub uploaded_at: DateTime<Utc>,
    /// The user account that registered the document
    pub uploaded_by: UserId,
    /// Path of the stored file, relative to the media root
    pub file_path: String,
}

pub type NewDocument = Document;

#[derive(Clone, Debug, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name=super::schema::api_tokens)]
pub struct ApiToken {
    pub id: i32,
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiToken> for portal_api_types::TokenInfo {
    fn from(value: ApiToken) -> Self {
        Self {
            token: value.token,
            created_at: value.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name=super::schema::api_tokens)]
pub struct NewApiToken {
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}
