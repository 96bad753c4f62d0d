use crate::cli::util::{query_user, query_user_and_check};
use crate::cli_error::CliError;
use crate::data_store::models::NewDocument;
use crate::data_store::{get_store_from_env, PortalStore};
use crate::setup::get_media_root_from_env;
use chrono::{Datelike, Utc};
use std::path::Path;

/// Interactively register a new document and copy its file into the media directory.
///
/// The file is stored in a date-partitioned sub directory of the media root, so its public URL
/// stays stable even when another file with the same name is uploaded later.
pub fn add_document(source: &Path) -> Result<(), CliError> {
    if !source.is_file() {
        return Err(CliError::FileError(format!(
            "'{}' does not exist or is not a regular file",
            source.display()
        )));
    }
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            CliError::FileError(format!(
                "'{}' does not have a valid UTF-8 file name",
                source.display()
            ))
        })?;

    let data_store_pool = get_store_from_env()?;
    let mut data_store = data_store_pool.get_facade()?;

    let title: String = query_user_and_check("Enter document title", |value: &String| {
        if value.is_empty() {
            Err("Title must not be empty")
        } else {
            Ok(())
        }
    });
    let authors: String = query_user("Enter document authors");
    let description: String = query_user("Enter document description");
    let uploader_username: String =
        query_user_and_check("Enter uploader username", |value: &String| {
            if value.is_empty() {
                Err("Username must not be empty")
            } else {
                Ok(())
            }
        });
    let uploader = data_store
        .get_user_by_username(&uploader_username)
        .map_err(|e| match e {
            crate::data_store::StoreError::NotExisting => {
                CliError::DataError(format!("No user with username '{}'", uploader_username))
            }
            e => e.into(),
        })?;

    let uploaded_at = Utc::now();
    let file_path = format!(
        "documents/{:04}/{:02}/{:02}/{}",
        uploaded_at.year(),
        uploaded_at.month(),
        uploaded_at.day(),
        file_name
    );

    let media_root = get_media_root_from_env()?;
    let target = media_root.join(&file_path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::FileError(format!(
                "Could not create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }
    std::fs::copy(source, &target).map_err(|e| {
        CliError::FileError(format!(
            "Could not copy file to '{}': {}",
            target.display(),
            e
        ))
    })?;

    let document = NewDocument {
        id: uuid::Uuid::now_v7(),
        title,
        authors,
        description,
        uploaded_at,
        uploaded_by: uploader.id,
        file_path,
    };
    data_store.create_document(document.clone())?;
    println!(
        "Success. Document '{}' is now available at /media/{}",
        document.title, document.file_path
    );
    Ok(())
}
