use crate::data_store::models::{
    ApiToken, Appointment, Document, FullCourse, Group, Menu, NewAppointment, NewDocument,
    NewPosition, NewUser, Page, Position, PositionWithAppointee, ResolvedPage, SyncReport, User,
};
use crate::data_store::{
    models, AppointmentId, CourseSearch, GroupId, MenuFilter, PortalStore, PortalStoreFacade,
    PositionId, StoreError, UserId,
};
use chrono::NaiveDate;
use std::sync::Mutex;

/**
 * A mock [PortalStore] implementation for testing.
 *
 * The simulated database consists of the [StoreMockData] structure with vectors of entities.
 * These can be directly modified by the tests.
 *
 * Except from checking for entity existence, the interface functions of this mock don't do any
 * error checking. Instead, the [StoreMockData.next_error] attribute can be set to simulate a
 * database error.
 */
#[derive(Default)]
pub struct StoreMock {
    pub data: Mutex<StoreMockData>,
}

impl PortalStore for StoreMock {
    fn get_facade<'a>(&'a self) -> Result<Box<dyn PortalStoreFacade + 'a>, StoreError> {
        Ok(Box::new(StoreMockFacade { store: self }))
    }
}

#[derive(Default)]
pub struct StoreMockData {
    pub menus: Vec<Menu>,
    pub departments: Vec<models::Department>,
    pub courses: Vec<FullCourse>,
    pub pages: Vec<Page>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub user_groups: Vec<(UserId, GroupId)>,
    pub positions: Vec<Position>,
    pub position_groups: Vec<(PositionId, GroupId)>,
    pub appointments: Vec<Appointment>,
    pub documents: Vec<Document>,
    pub api_tokens: Vec<ApiToken>,
    /// If not none, the next call to a store facade method will return this error.
    pub next_error: Option<StoreError>,
}

struct StoreMockFacade<'a> {
    store: &'a StoreMock,
}

impl<'a> PortalStoreFacade for StoreMockFacade<'a> {
    fn get_menus(&mut self, filter: MenuFilter) -> Result<Vec<Menu>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut result: Vec<Menu> = data
            .menus
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            (&a.dining_hall, &a.day, &a.meal).cmp(&(&b.dining_hall, &b.day, &b.meal))
        });
        Ok(result)
    }

    fn get_departments_with_courses(&mut self) -> Result<Vec<models::Department>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut result: Vec<models::Department> = data
            .departments
            .iter()
            .filter(|d| {
                data.courses
                    .iter()
                    .any(|c| c.department_ids.contains(&d.id))
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(result)
    }

    fn search_courses(&mut self, search: &CourseSearch) -> Result<Vec<FullCourse>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut result: Vec<FullCourse> = data
            .courses
            .iter()
            .filter(|c| search.matches(c))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.course.code.cmp(&b.course.code));
        Ok(result)
    }

    fn resolve_page(&mut self, segments: &[&str]) -> Result<ResolvedPage, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut segments_iter = segments.iter();
        let first_segment = segments_iter.next().ok_or(StoreError::NotExisting)?;
        let mut current_page = data
            .pages
            .iter()
            .find(|p| p.parent_id.is_none() && !p.managed && p.slug == *first_segment)
            .ok_or(StoreError::NotExisting)?;
        for segment in segments_iter {
            current_page = data
                .pages
                .iter()
                .find(|p| p.parent_id == Some(current_page.id) && p.slug == *segment)
                .ok_or(StoreError::NotExisting)?;
        }
        Ok(ResolvedPage {
            page: current_page.clone(),
            active_section: first_segment.to_string(),
        })
    }

    fn get_positions(
        &mut self,
        only_active: bool,
        today: NaiveDate,
    ) -> Result<Vec<PositionWithAppointee>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut positions: Vec<Position> = data
            .positions
            .iter()
            .filter(|p| !only_active || p.active)
            .cloned()
            .collect();
        positions.sort_by(|a, b| (a.sort_order, &a.title).cmp(&(b.sort_order, &b.title)));
        Ok(positions
            .into_iter()
            .map(|position| {
                let appointee = data
                    .appointments
                    .iter()
                    .filter(|a| a.position_id == position.id && a.is_active(today))
                    .min_by_key(|a| a.start)
                    .cloned();
                PositionWithAppointee {
                    position,
                    appointee,
                }
            })
            .collect())
    }

    fn create_position(&mut self, position: NewPosition) -> Result<PositionId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let position_id = data.positions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let sort_order = data
            .positions
            .iter()
            .map(|p| p.sort_order)
            .max()
            .unwrap_or(0)
            + 1;
        data.positions.push(Position {
            id: position_id,
            title: position.title,
            description: position.description,
            active: position.active,
            sort_order,
        });
        Ok(position_id)
    }

    fn create_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<AppointmentId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        if !data
            .positions
            .iter()
            .any(|p| p.id == appointment.position_id)
        {
            return Err(StoreError::InvalidInputData(
                "position does not exist".to_owned(),
            ));
        }
        let appointment_id = data.appointments.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        data.appointments.push(Appointment {
            id: appointment_id,
            position_id: appointment.position_id,
            name: appointment.name,
            login_id: appointment.login_id,
            user_id: None,
            start: appointment.start,
            end: appointment.end,
        });
        Ok(appointment_id)
    }

    fn sync_permissions_on_login(
        &mut self,
        username: &str,
        today: NaiveDate,
    ) -> Result<SyncReport, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let user = data
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotExisting)?;
        let mut report = SyncReport::default();

        let expired_position = data
            .appointments
            .iter()
            .filter(|a| a.user_id == Some(user.id) && a.is_expired(today))
            .max_by_key(|a| a.end)
            .map(|a| a.position_id);
        if let Some(position_id) = expired_position {
            let group_ids: Vec<GroupId> = data
                .position_groups
                .iter()
                .filter(|(p, _)| *p == position_id)
                .map(|(_, g)| *g)
                .collect();
            data.user_groups
                .retain(|(u, g)| *u != user.id || !group_ids.contains(g));
            if let Some(u) = data.users.iter_mut().find(|u| u.id == user.id) {
                u.is_staff = false;
            }
            report
                .revoked
                .push(position_title(&data.positions, position_id)?);
        }

        let active_appointment_id = data
            .appointments
            .iter()
            .filter(|a| a.login_id == user.username && a.is_active(today))
            .max_by_key(|a| a.start)
            .map(|a| a.id);
        if let Some(appointment_id) = active_appointment_id {
            let position_id = {
                let appointment = data
                    .appointments
                    .iter_mut()
                    .find(|a| a.id == appointment_id)
                    .ok_or(StoreError::NotExisting)?;
                appointment.user_id = Some(user.id);
                appointment.position_id
            };
            let group_ids: Vec<GroupId> = data
                .position_groups
                .iter()
                .filter(|(p, _)| *p == position_id)
                .map(|(_, g)| *g)
                .collect();
            for group_id in group_ids {
                if !data.user_groups.contains(&(user.id, group_id)) {
                    data.user_groups.push((user.id, group_id));
                }
            }
            if let Some(u) = data.users.iter_mut().find(|u| u.id == user.id) {
                u.is_staff = true;
            }
            report
                .granted
                .push(position_title(&data.positions, position_id)?);
        }

        Ok(report)
    }

    fn get_documents(&mut self) -> Result<Vec<Document>, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let mut result = data.documents.clone();
        result.sort_by(|a, b| (a.uploaded_at, &a.title).cmp(&(b.uploaded_at, &b.title)));
        Ok(result)
    }

    fn create_document(&mut self, document: NewDocument) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        if data.documents.iter().any(|d| d.id == document.id) {
            return Err(StoreError::ConflictEntityExists);
        }
        data.documents.push(document);
        Ok(())
    }

    fn get_user(&mut self, user_id: UserId) -> Result<User, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        data.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn get_user_by_username(&mut self, username: &str) -> Result<User, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        data.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn get_user_by_api_token(&mut self, token: &str) -> Result<User, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        let user_id = data
            .api_tokens
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.user_id)
            .ok_or(StoreError::NotExisting)?;
        data.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StoreError::NotExisting)
    }

    fn create_user(&mut self, user: NewUser) -> Result<UserId, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        if data.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::ConflictEntityExists);
        }
        let user_id = data.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        data.users.push(User {
            id: user_id,
            username: user.username,
            password_hash: user.password_hash,
            display_name: user.display_name,
            is_staff: user.is_staff,
            is_active: user.is_active,
        });
        Ok(user_id)
    }

    fn get_or_create_api_token(
        &mut self,
        user_id: UserId,
        candidate_token: String,
    ) -> Result<ApiToken, StoreError> {
        let mut data = self.store.data.lock().expect("Error while locking mutex.");
        if let Some(e) = data.next_error.take() {
            return Err(e);
        }
        if let Some(token) = data.api_tokens.iter().find(|t| t.user_id == user_id) {
            return Ok(token.clone());
        }
        let token = ApiToken {
            id: data.api_tokens.iter().map(|t| t.id).max().unwrap_or(0) + 1,
            user_id,
            token: candidate_token,
            created_at: chrono::Utc::now(),
        };
        data.api_tokens.push(token.clone());
        Ok(token)
    }
}

fn position_title(positions: &[Position], position_id: PositionId) -> Result<String, StoreError> {
    positions
        .iter()
        .find(|p| p.id == position_id)
        .map(|p| p.title.clone())
        .ok_or(StoreError::NotExisting)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: i32, parent_id: Option<i32>, slug: &str, managed: bool) -> Page {
        Page {
            id,
            parent_id,
            slug: slug.to_string(),
            title: slug.to_string(),
            body: String::new(),
            managed,
            sort_key: 0,
        }
    }

    fn user(id: UserId, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            password_hash: String::new(),
            display_name: username.to_string(),
            is_staff: false,
            is_active: true,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_resolve_page_path() {
        let store = StoreMock::default();
        {
            let mut data = store.data.lock().unwrap();
            data.pages = vec![
                page(1, None, "about", false),
                page(2, Some(1), "history", false),
                page(3, Some(2), "founding", false),
                page(4, None, "events", true),
            ];
        }
        let mut facade = store.get_facade().unwrap();

        let resolved = facade.resolve_page(&["about", "history", "founding"]).unwrap();
        assert_eq!(resolved.page.id, 3);
        assert_eq!(resolved.active_section, "about");

        // A missing final segment fails even if the prefix resolves
        assert!(matches!(
            facade.resolve_page(&["about", "history", "nope"]),
            Err(StoreError::NotExisting)
        ));
        // Managed pages are not reachable as top-level pages
        assert!(matches!(
            facade.resolve_page(&["events"]),
            Err(StoreError::NotExisting)
        ));
        assert!(matches!(
            facade.resolve_page(&[]),
            Err(StoreError::NotExisting)
        ));
    }

    #[test]
    fn test_sync_grants_active_appointment() {
        let store = StoreMock::default();
        {
            let mut data = store.data.lock().unwrap();
            data.users = vec![user(1, "jdoe")];
            data.groups = vec![Group {
                id: 10,
                name: "senate".to_string(),
            }];
            data.positions = vec![Position {
                id: 5,
                title: "Treasurer".to_string(),
                description: String::new(),
                active: true,
                sort_order: 1,
            }];
            data.position_groups = vec![(5, 10)];
            data.appointments = vec![Appointment {
                id: 1,
                position_id: 5,
                name: "Jane Doe".to_string(),
                login_id: "jdoe".to_string(),
                user_id: None,
                start: date(2024, 9, 1),
                end: None,
            }];
        }
        let mut facade = store.get_facade().unwrap();

        let report = facade
            .sync_permissions_on_login("jdoe", date(2024, 10, 1))
            .unwrap();
        assert_eq!(report.granted, vec!["Treasurer".to_string()]);
        assert!(report.revoked.is_empty());

        let data = store.data.lock().unwrap();
        assert!(data.user_groups.contains(&(1, 10)));
        assert!(data.users[0].is_staff);
        assert_eq!(data.appointments[0].user_id, Some(1));
    }

    #[test]
    fn test_sync_revokes_expired_appointment() {
        let store = StoreMock::default();
        {
            let mut data = store.data.lock().unwrap();
            let mut u = user(1, "jdoe");
            u.is_staff = true;
            data.users = vec![u];
            data.positions = vec![Position {
                id: 5,
                title: "Treasurer".to_string(),
                description: String::new(),
                active: true,
                sort_order: 1,
            }];
            data.position_groups = vec![(5, 10)];
            data.user_groups = vec![(1, 10), (1, 11)];
            data.appointments = vec![Appointment {
                id: 1,
                position_id: 5,
                name: "Jane Doe".to_string(),
                login_id: "jdoe".to_string(),
                user_id: Some(1),
                start: date(2023, 9, 1),
                end: Some(date(2024, 5, 1)),
            }];
        }
        let mut facade = store.get_facade().unwrap();

        let report = facade
            .sync_permissions_on_login("jdoe", date(2024, 10, 1))
            .unwrap();
        assert_eq!(report.revoked, vec!["Treasurer".to_string()]);
        assert!(report.granted.is_empty());

        let data = store.data.lock().unwrap();
        // Only the groups of the expired position are removed
        assert_eq!(data.user_groups, vec![(1, 11)]);
        assert!(!data.users[0].is_staff);
    }

    #[test]
    fn test_sync_unknown_user() {
        let store = StoreMock::default();
        let mut facade = store.get_facade().unwrap();
        assert!(matches!(
            facade.sync_permissions_on_login("nobody", date(2024, 10, 1)),
            Err(StoreError::NotExisting)
        ));
    }

    fn document(title: &str, timestamp: i64, uploaded_by: UserId) -> Document {
        Document {
            id: uuid::Uuid::now_v7(),
            title: title.to_string(),
            authors: String::new(),
            description: String::new(),
            uploaded_at: chrono::DateTime::from_timestamp(timestamp, 0).unwrap(),
            uploaded_by,
            file_path: format!("documents/2024/09/01/{}.pdf", title),
        }
    }

    #[test]
    fn test_create_and_list_documents() {
        let store = StoreMock::default();
        let mut facade = store.get_facade().unwrap();
        facade.create_document(document("minutes", 2000, 1)).unwrap();
        facade.create_document(document("budget", 1000, 2)).unwrap();

        let documents = facade.get_documents().unwrap();
        assert_eq!(documents.len(), 2);
        // Ordered by upload time, and the uploader reference is retained
        assert_eq!(documents[0].title, "budget");
        assert_eq!(documents[0].uploaded_by, 2);
        assert_eq!(documents[1].title, "minutes");
    }

    #[test]
    fn test_create_position_sort_order() {
        let store = StoreMock::default();
        let mut facade = store.get_facade().unwrap();
        for title in ["President", "Treasurer", "Secretary"] {
            facade
                .create_position(NewPosition {
                    title: title.to_string(),
                    description: String::new(),
                    active: true,
                })
                .unwrap();
        }
        let data = store.data.lock().unwrap();
        let sort_orders: Vec<i32> = data.positions.iter().map(|p| p.sort_order).collect();
        assert_eq!(sort_orders, vec![1, 2, 3]);
    }
}
