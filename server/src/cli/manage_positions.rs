use crate::cli::util::{query_user, query_user_and_check, query_user_bool};
use crate::cli_error::CliError;
use crate::data_store::models::{NewAppointment, NewPosition};
use crate::data_store::{get_store_from_env, PortalStore, PositionId};
use std::str::FromStr;

/// Print all positions (including inactive ones) with their current appointee.
pub fn print_position_list() -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let today = chrono::Local::now().date_naive();
    let positions = data_store.get_positions(false, today)?;

    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED)
        .set_header(vec!["id", "title", "active", "current appointee", "since"])
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic)
        .add_rows(positions.into_iter().map(|entry| {
            [
                entry.position.id.to_string(),
                entry.position.title,
                if entry.position.active { "yes" } else { "no" }.to_string(),
                entry
                    .appointee
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or("".to_string()),
                entry
                    .appointee
                    .as_ref()
                    .map(|a| a.start.to_string())
                    .unwrap_or("".to_string()),
            ]
        }));

    println!("{table}");
    Ok(())
}

/// Interactively create a new position. The position's sort order is assigned automatically.
pub fn add_position() -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let title: String = query_user_and_check("Enter position title", |value: &String| {
        if value.is_empty() {
            Err("Title must not be empty")
        } else {
            Ok(())
        }
    });
    let description: String = query_user("Enter position description");
    let active = query_user_bool("Shall the position be shown on the positions page?", Some(true));

    let position_id = data_store.create_position(NewPosition {
        title,
        description,
        active,
    })?;
    println!("Success. New position id: {}", position_id);
    Ok(())
}

/// Interactively appoint a person to a position.
///
/// The appointment is bound to a university login id. Group memberships and the staff flag are
/// only granted when the appointee logs in the next time.
pub fn add_appointment() -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let today = chrono::Local::now().date_naive();
    let positions = data_store.get_positions(false, today)?;
    let position_ids: Vec<PositionId> = positions.iter().map(|p| p.position.id).collect();

    print_position_list()?;
    let position_id: PositionId =
        query_user_and_check("Enter position id", |value: &PositionId| {
            if position_ids.contains(value) {
                Ok(())
            } else {
                Err("No position with this id exists")
            }
        });
    let name: String = query_user_and_check("Enter appointee name", |value: &String| {
        if value.is_empty() {
            Err("Name must not be empty")
        } else {
            Ok(())
        }
    });
    let login_id: String = query_user_and_check(
        "Enter appointee university login id",
        |value: &String| {
            if value.is_empty() {
                Err("Login id must not be empty")
            } else {
                Ok(())
            }
        },
    );
    let start = query_user::<IsoDate>("Appointment starts on (YYYY-MM-DD; empty value for today)")
        .0
        .unwrap_or(today);
    let end = query_user::<IsoDate>(
        "Appointment ends on (YYYY-MM-DD; empty value for an ongoing appointment)",
    )
    .0;

    let appointment_id = data_store.create_appointment(NewAppointment {
        position_id,
        name,
        login_id,
        start,
        end,
    })?;
    println!("Success. New appointment id: {}", appointment_id);
    Ok(())
}

struct IsoDate(Option<chrono::NaiveDate>);

impl FromStr for IsoDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self(None));
        }
        Ok(Self(Some(
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| format!("Could not parse as ISO date: {e}"))?,
        )))
    }
}
