use crate::auth_password::{generate_api_token, hash_password};
use crate::cli::util::{query_user, query_user_and_check, query_user_bool};
use crate::cli_error::CliError;
use crate::data_store::models::NewUser;
use crate::data_store::{get_store_from_env, PortalStore};

/// Interactively create a new user account.
pub fn add_user() -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let username: String = query_user_and_check("Enter username", |value: &String| {
        if value.is_empty() {
            Err("Username must not be empty")
        } else {
            Ok(())
        }
    });
    let display_name: String = query_user("Enter display name");
    let password: String = query_user_and_check("Enter password", |value: &String| {
        if value.len() < 8 {
            Err("Password must be at least 8 characters long")
        } else {
            Ok(())
        }
    });
    let is_staff = query_user_bool("Shall the user have staff permissions?", Some(false));

    let password_hash = hash_password(&password)
        .map_err(|e| CliError::DataError(format!("Could not hash password: {}", e)))?;
    let user_id = data_store.create_user(NewUser {
        username,
        password_hash,
        display_name,
        is_staff,
        is_active: true,
    })?;
    println!("Success. New user id: {}", user_id);
    Ok(())
}

/// Print the API token of the given user, creating one if they do not have one yet.
pub fn create_token(username: &str) -> Result<(), CliError> {
    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let user = data_store.get_user_by_username(username)?;
    let candidate_token = generate_api_token()
        .map_err(|e| CliError::DataError(format!("Could not generate token: {}", e)))?;
    let token = data_store.get_or_create_api_token(user.id, candidate_token)?;
    println!("API token of user '{}': {}", user.username, token.token);
    Ok(())
}
