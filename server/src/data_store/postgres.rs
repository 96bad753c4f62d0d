use super::{
    models, schema, AppointmentId, CourseSearch, DayMode, MenuFilter, PortalStore,
    PortalStoreFacade, PositionId, StoreError, UserId,
};
use crate::data_store::CreditFilter;
use chrono::NaiveDate;
use diesel::dsl::{exists, not};
use diesel::expression::AsExpression;
use diesel::pg::PgConnection;
use diesel::prelude::*;

#[derive(Clone)]
pub struct PgDataStore {
    pool: diesel::r2d2::Pool<diesel::r2d2::ConnectionManager<PgConnection>>,
}

impl PgDataStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        let connection_manager = diesel::r2d2::ConnectionManager::<PgConnection>::new(database_url);
        Ok(Self {
            pool: diesel::r2d2::Pool::builder()
                .test_on_check_out(true)
                .min_idle(Some(2))
                .build(connection_manager)?,
        })
    }
}

impl PortalStore for PgDataStore {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn PortalStoreFacade + 'a>, StoreError> {
        Ok(Box::new(PgDataStoreFacade::with_pooled_connection(
            self.pool.get()?,
        )))
    }
}

pub struct PgDataStoreFacade {
    connection: diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
}

impl PgDataStoreFacade {
    pub fn with_pooled_connection(
        connection: diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>,
    ) -> Self {
        Self { connection }
    }
}

impl PortalStoreFacade for PgDataStoreFacade {
    fn get_menus(&mut self, filter: MenuFilter) -> Result<Vec<models::Menu>, StoreError> {
        use schema::menus::dsl::*;

        menus
            .filter(menu_filter_to_sql(filter))
            .order_by((dining_hall.asc(), day.asc(), meal.asc()))
            .select(models::Menu::as_select())
            .load::<models::Menu>(&mut self.connection)
            .map_err(|e| e.into())
    }

    fn get_departments_with_courses(&mut self) -> Result<Vec<models::Department>, StoreError> {
        use schema::departments::dsl::*;

        Ok(departments
            .filter(exists(
                schema::course_departments::table
                    .filter(schema::course_departments::department_id.eq(id)),
            ))
            .order_by(code.asc())
            .select(models::Department::as_select())
            .load::<models::Department>(&mut self.connection)?)
    }

    fn search_courses(
        &mut self,
        search: &CourseSearch,
    ) -> Result<Vec<models::FullCourse>, StoreError> {
        self.connection.transaction(|connection| {
            let the_courses = schema::courses::table
                .filter(course_search_to_sql(search))
                .distinct()
                .order_by(schema::courses::code.asc())
                .select(models::Course::as_select())
                .load::<models::Course>(connection)?;

            let the_meetings = models::Meeting::belonging_to(&the_courses)
                .order_by(schema::meetings::begin.asc())
                .select(models::Meeting::as_select())
                .load::<models::Meeting>(connection)?
                .grouped_by(&the_courses);

            let the_departments = models::CourseDepartmentMapping::belonging_to(&the_courses)
                .select(models::CourseDepartmentMapping::as_select())
                .load::<models::CourseDepartmentMapping>(connection)?
                .grouped_by(&the_courses);

            Ok(the_courses
                .into_iter()
                .zip(the_meetings)
                .zip(the_departments)
                .map(|((course, meetings), departments)| models::FullCourse {
                    course,
                    meetings,
                    department_ids: departments.into_iter().map(|d| d.department_id).collect(),
                })
                .collect())
        })
    }

    fn resolve_page(&mut self, segments: &[&str]) -> Result<models::ResolvedPage, StoreError> {
        use schema::pages::dsl::*;

        let mut segments_iter = segments.iter();
        let first_segment = segments_iter.next().ok_or(StoreError::NotExisting)?;

        self.connection.transaction(|connection| {
            // Managed pages are rendered by dedicated views and not reachable via the generic
            // page tree.
            let mut current_page = pages
                .filter(parent_id.is_null())
                .filter(not(managed))
                .filter(slug.eq(first_segment))
                .select(models::Page::as_select())
                .first::<models::Page>(connection)?;

            for segment in segments_iter {
                current_page = pages
                    .filter(parent_id.eq(current_page.id))
                    .filter(slug.eq(segment))
                    .select(models::Page::as_select())
                    .first::<models::Page>(connection)?;
            }

            Ok(models::ResolvedPage {
                page: current_page,
                active_section: first_segment.to_string(),
            })
        })
    }

    fn get_positions(
        &mut self,
        only_active: bool,
        today: NaiveDate,
    ) -> Result<Vec<models::PositionWithAppointee>, StoreError> {
        use schema::positions::dsl::*;

        self.connection.transaction(|connection| {
            let mut query = positions.into_boxed();
            if only_active {
                query = query.filter(active);
            }
            let the_positions = query
                .order_by((sort_order.asc(), title.asc()))
                .select(models::Position::as_select())
                .load::<models::Position>(connection)?;

            let the_appointments = models::Appointment::belonging_to(&the_positions)
                .order_by(schema::appointments::start.asc())
                .select(models::Appointment::as_select())
                .load::<models::Appointment>(connection)?
                .grouped_by(&the_positions);

            Ok(the_positions
                .into_iter()
                .zip(the_appointments)
                .map(|(position, appointments)| models::PositionWithAppointee {
                    position,
                    appointee: appointments
                        .into_iter()
                        .find(|appointment| appointment.is_active(today)),
                })
                .collect())
        })
    }

    fn create_position(
        &mut self,
        position: models::NewPosition,
    ) -> Result<PositionId, StoreError> {
        use schema::positions::dsl::*;

        self.connection.transaction(|connection| {
            // The sort_order is assigned strictly increasing, so list positions keep their
            // relative order even when earlier positions are deactivated.
            let max_sort_order = positions
                .select(diesel::dsl::max(sort_order))
                .first::<Option<i32>>(connection)?;

            Ok(diesel::insert_into(positions)
                .values((
                    title.eq(position.title),
                    description.eq(position.description),
                    active.eq(position.active),
                    sort_order.eq(max_sort_order.unwrap_or(0) + 1),
                ))
                .returning(id)
                .get_result::<PositionId>(connection)?)
        })
    }

    fn create_appointment(
        &mut self,
        appointment: models::NewAppointment,
    ) -> Result<AppointmentId, StoreError> {
        use schema::appointments::dsl::*;

        Ok(diesel::insert_into(appointments)
            .values(&appointment)
            .returning(id)
            .get_result::<AppointmentId>(&mut self.connection)?)
    }

    fn sync_permissions_on_login(
        &mut self,
        the_username: &str,
        today: NaiveDate,
    ) -> Result<models::SyncReport, StoreError> {
        use schema::appointments::dsl::*;

        self.connection.transaction(|connection| {
            let user = schema::users::table
                .filter(schema::users::username.eq(the_username))
                .select(models::User::as_select())
                .first::<models::User>(connection)?;

            let mut report = models::SyncReport::default();

            // Revoke permissions of an expired appointment bound to this user. If several have
            // expired, the most recently ended one determines the position (the others were
            // already handled on earlier logins or are superseded).
            let expired_appointment = appointments
                .filter(user_id.eq(user.id))
                .filter(end.le(today).assume_not_null())
                .order_by(end.desc())
                .select(models::Appointment::as_select())
                .first::<models::Appointment>(connection)
                .optional()?;
            if let Some(appointment) = &expired_appointment {
                remove_position_groups(user.id, appointment.position_id, connection)?;
                diesel::update(schema::users::table)
                    .filter(schema::users::id.eq(user.id))
                    .set(schema::users::is_staff.eq(false))
                    .execute(connection)?;
                report.revoked.push(position_title(appointment.position_id, connection)?);
            }

            // Grant permissions of an active appointment matching the login id. The latest
            // started one wins.
            let active_appointment = appointments
                .filter(login_id.eq(&user.username))
                .filter(start.le(today))
                .filter(end.is_null().or(end.ge(today).assume_not_null()))
                .order_by(start.desc())
                .select(models::Appointment::as_select())
                .first::<models::Appointment>(connection)
                .optional()?;
            if let Some(appointment) = &active_appointment {
                diesel::update(appointments)
                    .filter(id.eq(appointment.id))
                    .set(user_id.eq(user.id))
                    .execute(connection)?;
                add_position_groups(user.id, appointment.position_id, connection)?;
                diesel::update(schema::users::table)
                    .filter(schema::users::id.eq(user.id))
                    .set(schema::users::is_staff.eq(true))
                    .execute(connection)?;
                report.granted.push(position_title(appointment.position_id, connection)?);
            }

            Ok(report)
        })
    }

    fn get_documents(&mut self) -> Result<Vec<models::Document>, StoreError> {
        use schema::documents::dsl::*;

        Ok(documents
            .order_by((uploaded_at.asc(), title.asc()))
            .select(models::Document::as_select())
            .load::<models::Document>(&mut self.connection)?)
    }

    fn create_document(&mut self, document: models::NewDocument) -> Result<(), StoreError> {
        use schema::documents::dsl::*;

        diesel::insert_into(documents)
            .values(&document)
            .execute(&mut self.connection)?;
        Ok(())
    }

    fn get_user(&mut self, the_user_id: UserId) -> Result<models::User, StoreError> {
        use schema::users::dsl::*;

        users
            .filter(id.eq(the_user_id))
            .select(models::User::as_select())
            .first::<models::User>(&mut self.connection)
            .map_err(|e| e.into())
    }

    fn get_user_by_username(&mut self, the_username: &str) -> Result<models::User, StoreError> {
        use schema::users::dsl::*;

        users
            .filter(username.eq(the_username))
            .select(models::User::as_select())
            .first::<models::User>(&mut self.connection)
            .map_err(|e| e.into())
    }

    fn get_user_by_api_token(&mut self, the_token: &str) -> Result<models::User, StoreError> {
        schema::api_tokens::table
            .inner_join(schema::users::table)
            .filter(schema::api_tokens::token.eq(the_token))
            .select(models::User::as_select())
            .first::<models::User>(&mut self.connection)
            .map_err(|e| e.into())
    }

    fn create_user(&mut self, user: models::NewUser) -> Result<UserId, StoreError> {
        use schema::users::dsl::*;

        Ok(diesel::insert_into(users)
            .values(&user)
            .returning(id)
            .get_result::<UserId>(&mut self.connection)?)
    }

    fn get_or_create_api_token(
        &mut self,
        the_user_id: UserId,
        candidate_token: String,
    ) -> Result<models::ApiToken, StoreError> {
        use schema::api_tokens::dsl::*;

        self.connection.transaction(|connection| {
            diesel::insert_into(api_tokens)
                .values(models::NewApiToken {
                    user_id: the_user_id,
                    token: candidate_token,
                    created_at: chrono::Utc::now(),
                })
                .on_conflict(user_id)
                .do_nothing()
                .execute(connection)?;

            Ok(api_tokens
                .filter(user_id.eq(the_user_id))
                .select(models::ApiToken::as_select())
                .first::<models::ApiToken>(connection)?)
        })
    }
}

fn position_title(
    the_position_id: PositionId,
    connection: &mut PgConnection,
) -> Result<String, diesel::result::Error> {
    schema::positions::table
        .filter(schema::positions::id.eq(the_position_id))
        .select(schema::positions::title)
        .first::<String>(connection)
}

fn remove_position_groups(
    the_user_id: UserId,
    the_position_id: PositionId,
    connection: &mut PgConnection,
) -> Result<(), diesel::result::Error> {
    use schema::user_groups::dsl::*;

    diesel::delete(
        user_groups.filter(user_id.eq(the_user_id)).filter(
            group_id.eq_any(
                schema::position_groups::table
                    .filter(schema::position_groups::position_id.eq(the_position_id))
                    .select(schema::position_groups::group_id),
            ),
        ),
    )
    .execute(connection)
    .map(|_| ())
}

fn add_position_groups(
    the_user_id: UserId,
    the_position_id: PositionId,
    connection: &mut PgConnection,
) -> Result<(), diesel::result::Error> {
    use schema::user_groups::dsl::*;

    let the_group_ids = schema::position_groups::table
        .filter(schema::position_groups::position_id.eq(the_position_id))
        .select(schema::position_groups::group_id)
        .load::<i32>(connection)?;

    diesel::insert_into(user_groups)
        .values(
            the_group_ids
                .iter()
                .map(|the_group_id| (user_id.eq(the_user_id), group_id.eq(the_group_id)))
                .collect::<Vec<_>>(),
        )
        .on_conflict((user_id, group_id))
        .do_nothing()
        .execute(connection)
        .map(|_| ())
}

type BoxedBoolExpression<'a, Table> =
    Box<dyn BoxableExpression<Table, diesel::pg::Pg, SqlType = diesel::sql_types::Bool> + 'a>;

fn menu_filter_to_sql<'a>(filter: MenuFilter) -> BoxedBoolExpression<'a, schema::menus::table> {
    use schema::menus::dsl::*;

    let mut expression: BoxedBoolExpression<'a, schema::menus::table> =
        Box::new(diesel::dsl::sql::<diesel::sql_types::Bool>("TRUE"));
    if let Some(the_dining_hall) = filter.dining_hall {
        expression = Box::new(expression.as_expression().and(dining_hall.eq(the_dining_hall)));
    }
    if let Some(the_day) = filter.day {
        expression = Box::new(expression.as_expression().and(day.eq(the_day)));
    }
    if let Some(the_meal) = filter.meal {
        expression = Box::new(expression.as_expression().and(meal.eq(the_meal)));
    }
    expression
}

/// Escape a string for use within an SQL LIKE pattern
fn like_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn course_search_to_sql<'a>(
    search: &CourseSearch,
) -> BoxedBoolExpression<'a, schema::courses::table> {
    use schema::courses::dsl::*;
    use schema::meetings;

    let mut expression: BoxedBoolExpression<'a, schema::courses::table> =
        Box::new(diesel::dsl::sql::<diesel::sql_types::Bool>("TRUE"));

    if let Some(the_department_id) = search.department {
        expression = Box::new(
            expression.as_expression().and(exists(
                schema::course_departments::table
                    .filter(schema::course_departments::course_id.eq(id))
                    .filter(schema::course_departments::department_id.eq(the_department_id)),
            )),
        );
    }

    // Each weekday is handled as an independent subquery on the course's meetings, because a
    // course can meet e.g. Mon+Wed in one meeting and Fri in another.
    macro_rules! day_meeting_exists {
        ($day:ident) => {
            exists(
                meetings::table
                    .filter(meetings::course_id.eq(id))
                    .filter(meetings::$day),
            )
        };
    }
    macro_rules! apply_day_filter {
        ($day:ident, $requested:expr) => {
            match search.mode {
                DayMode::Only => {
                    expression = if $requested {
                        Box::new(expression.as_expression().and(day_meeting_exists!($day)))
                    } else {
                        Box::new(expression.as_expression().and(not(day_meeting_exists!($day))))
                    };
                }
                DayMode::AtLeast => {
                    if $requested {
                        expression =
                            Box::new(expression.as_expression().and(day_meeting_exists!($day)));
                    }
                }
            }
        };
    }
    apply_day_filter!(monday, search.monday);
    apply_day_filter!(tuesday, search.tuesday);
    apply_day_filter!(wednesday, search.wednesday);
    apply_day_filter!(thursday, search.thursday);
    apply_day_filter!(friday, search.friday);

    if let Some(start_range) = search.start_range {
        expression = Box::new(
            expression.as_expression().and(exists(
                meetings::table
                    .filter(meetings::course_id.eq(id))
                    .filter(meetings::begin.ge(start_range)),
            )),
        );
    }
    if let Some(end_range) = search.end_range {
        expression = Box::new(
            expression.as_expression().and(exists(
                meetings::table
                    .filter(meetings::course_id.eq(id))
                    .filter(meetings::end.le(end_range)),
            )),
        );
    }

    if !search.campuses.is_empty() {
        expression = Box::new(
            expression.as_expression().and(exists(
                meetings::table
                    .filter(meetings::course_id.eq(id))
                    .filter(
                        meetings::campus
                            .eq_any(search.campuses.iter().map(|c| *c as i32).collect::<Vec<_>>()),
                    ),
            )),
        );
    }

    if !search.instructor.is_empty() {
        expression = Box::new(
            expression
                .as_expression()
                .and(instructor.ilike(format!("%{}%", like_escape(&search.instructor)))),
        );
    }

    match search.credit {
        CreditFilter::Any => {}
        CreditFilter::Full => {
            expression = Box::new(expression.as_expression().and(credit.ge(1.0)));
        }
        CreditFilter::Partial => {
            expression =
                Box::new(expression.as_expression().and(credit.lt(1.0).and(credit.gt(0.0))));
        }
        CreditFilter::Exact(value) => {
            expression = Box::new(expression.as_expression().and(credit.eq(value)));
        }
    }

    if search.min_class_size > 0 {
        expression = Box::new(expression.as_expression().and(spots.ge(search.min_class_size)));
    }

    if !search.keywords.is_empty() {
        // Every keyword must appear in the description, or every keyword must appear in the
        // name.
        let keyword_chain = |column: KeywordColumn| {
            let mut chain: BoxedBoolExpression<'a, schema::courses::table> =
                Box::new(diesel::dsl::sql::<diesel::sql_types::Bool>("TRUE"));
            for keyword in &search.keywords {
                let pattern = format!("%{}%", like_escape(keyword));
                chain = match column {
                    KeywordColumn::Description => {
                        Box::new(chain.as_expression().and(description.ilike(pattern)))
                    }
                    KeywordColumn::Name => Box::new(chain.as_expression().and(name.ilike(pattern))),
                };
            }
            chain
        };
        expression = Box::new(
            expression.as_expression().and(
                keyword_chain(KeywordColumn::Description)
                    .as_expression()
                    .or(keyword_chain(KeywordColumn::Name)),
            ),
        );
    }

    expression
}

#[derive(Clone, Copy)]
enum KeywordColumn {
    Description,
    Name,
}
