//! `entry` subcommands.

use prasword_crypto_core::{generate_random_password, CharsetConfig, DEFAULT_PASSWORD_LENGTH};
use prasword_store::{NewPassword, PasswordEntry, PasswordUpdate, DEFAULT_FOLDER_ID};

use crate::cli::{EntryCommand, EntryFields};
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat};

use super::require_non_empty;

const LIST_HEADERS: [&str; 5] = ["ID", "FOLDER", "TITLE", "USERNAME", "URL"];

pub fn run(ctx: &Context, cmd: EntryCommand) -> Result<()> {
    let mut store = ctx.open_store()?;
    let format = ctx.format();

    match cmd {
        EntryCommand::Add(fields) => {
            let entry = new_entry(fields)?;
            let id = store.add_password(&entry)?;
            output::status(format, &format!("Added entry {id}"))?;
        }
        EntryCommand::List { folder } => {
            let rows = list_rows(store.get_passwords(folder)?);
            output::emit(format, &LIST_HEADERS, &rows)?;
        }
        EntryCommand::Show { id, reveal } => {
            show(format, &store.get_password(id)?, reveal)?;
        }
        EntryCommand::Update { id, fields } => {
            let update = entry_update(fields)?;
            store.update_password(id, &update)?;
            output::status(format, &format!("Updated entry {id}"))?;
        }
        EntryCommand::Delete { id } => {
            store.delete_password(id)?;
            output::status(format, &format!("Deleted entry {id}"))?;
        }
        EntryCommand::Search { term } => {
            let rows = list_rows(store.search_passwords(&term)?);
            output::emit(format, &LIST_HEADERS, &rows)?;
        }
    }

    store.close();
    Ok(())
}

fn generated() -> Result<String> {
    Ok(generate_random_password(
        DEFAULT_PASSWORD_LENGTH,
        &CharsetConfig::default(),
    )?)
}

fn new_entry(fields: EntryFields) -> Result<NewPassword> {
    let title = fields
        .title
        .ok_or_else(|| CliError::usage("--title is required"))?;
    require_non_empty("title", &title)?;

    let password = match (fields.password, fields.generate) {
        (_, true) => generated()?,
        (Some(password), false) => password,
        (None, false) => {
            return Err(CliError::usage(
                "--secret, PRASWORD_ENTRY_PASSWORD or --generate is required",
            ))
        }
    };
    require_non_empty("password", &password)?;

    Ok(NewPassword {
        title,
        username: fields.username.unwrap_or_default(),
        password,
        folder_id: fields.folder.unwrap_or(DEFAULT_FOLDER_ID),
        url: fields.url.unwrap_or_default(),
        notes: fields.notes.unwrap_or_default(),
    })
}

fn entry_update(fields: EntryFields) -> Result<PasswordUpdate> {
    if let Some(title) = &fields.title {
        require_non_empty("title", title)?;
    }
    let password = if fields.generate {
        Some(generated()?)
    } else {
        fields.password
    };
    if let Some(password) = &password {
        require_non_empty("password", password)?;
    }

    Ok(PasswordUpdate {
        title: fields.title,
        username: fields.username,
        password,
        url: fields.url,
        notes: fields.notes,
        folder_id: fields.folder,
    })
}

fn list_rows(entries: Vec<PasswordEntry>) -> Vec<Vec<String>> {
    entries
        .into_iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.folder_name,
                e.title,
                e.username,
                e.url,
            ]
        })
        .collect()
}

fn show(format: OutputFormat, entry: &PasswordEntry, reveal: bool) -> Result<()> {
    let password = if reveal {
        entry.password.clone()
    } else {
        "********".to_string()
    };
    let fields = [
        ("id", entry.id.to_string()),
        ("folder", entry.folder_name.clone()),
        ("title", entry.title.clone()),
        ("username", entry.username.clone()),
        ("password", password),
        ("url", entry.url.clone()),
        ("notes", entry.notes.clone()),
        ("created", entry.created_at.clone().unwrap_or_default()),
        ("updated", entry.updated_at.clone().unwrap_or_default()),
    ];

    match format {
        OutputFormat::Human => {
            for (key, value) in &fields {
                println!("{key:>9}: {value}");
            }
        }
        OutputFormat::Json => {
            let object: serde_json::Map<String, serde_json::Value> = fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&object)?);
        }
    }
    Ok(())
}
