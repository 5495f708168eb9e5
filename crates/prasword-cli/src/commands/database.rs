//! `init` and `change-password`.

use crate::cli::ChangePasswordArgs;
use crate::context::Context;
use crate::error::Result;
use crate::output;

use super::require_non_empty;

pub fn init(ctx: &Context) -> Result<()> {
    let store = ctx.create_store()?;
    let kind = store.backend_kind();
    store.close();
    output::status(ctx.format(), &format!("Initialised {kind} database"))
}

pub fn change_password(ctx: &Context, args: &ChangePasswordArgs) -> Result<()> {
    require_non_empty("new master password", &args.new_password)?;
    let mut store = ctx.open_store()?;
    store.change_master_password(&args.new_password)?;
    store.close();
    output::status(ctx.format(), "Master password changed")
}
