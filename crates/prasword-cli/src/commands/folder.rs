//! `folder` subcommands.

use std::fs;

use prasword_store::FolderUpdate;

use crate::cli::FolderCommand;
use crate::context::Context;
use crate::error::Result;
use crate::output;

use super::require_non_empty;

pub fn run(ctx: &Context, cmd: FolderCommand) -> Result<()> {
    let mut store = ctx.open_store()?;
    let format = ctx.format();

    match cmd {
        FolderCommand::List => {
            let rows: Vec<Vec<String>> = store
                .list_folders()?
                .into_iter()
                .map(|f| {
                    vec![
                        f.id.to_string(),
                        f.name,
                        f.color,
                        if f.icon.is_some() { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            output::emit(format, &["ID", "NAME", "COLOR", "ICON"], &rows)?;
        }
        FolderCommand::Add { name, color, icon } => {
            require_non_empty("folder name", &name)?;
            let icon = icon.map(fs::read).transpose()?;
            let color = color.unwrap_or_else(|| ctx.config.default_folder_color.clone());
            let id = store.create_folder(&name, icon.as_deref(), Some(&color))?;
            output::status(format, &format!("Created folder {id}"))?;
        }
        FolderCommand::Update {
            id,
            name,
            color,
            icon,
        } => {
            if let Some(name) = &name {
                require_non_empty("folder name", name)?;
            }
            let update = FolderUpdate {
                name,
                icon: icon.map(fs::read).transpose()?,
                color,
            };
            store.update_folder(id, &update)?;
            output::status(format, &format!("Updated folder {id}"))?;
        }
        FolderCommand::Delete { id, move_to } => {
            let moved = store.delete_folder(id, move_to)?;
            output::status(
                format,
                &format!("Deleted folder {id}; moved {moved} entries to folder {move_to}"),
            )?;
        }
        FolderCommand::Counts => {
            let rows: Vec<Vec<String>> = store
                .count_by_folder()?
                .into_iter()
                .map(|c| vec![c.id.to_string(), c.name, c.password_count.to_string()])
                .collect();
            output::emit(format, &["ID", "NAME", "ENTRIES"], &rows)?;
        }
    }

    store.close();
    Ok(())
}
