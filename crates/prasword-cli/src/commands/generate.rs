//! `generate`: print a random password.

use prasword_crypto_core::{generate_random_password, CharsetConfig};

use crate::cli::GenerateArgs;
use crate::context::Context;
use crate::error::Result;
use crate::output;

pub fn charset(args: &GenerateArgs) -> CharsetConfig {
    CharsetConfig {
        uppercase: !args.no_uppercase,
        lowercase: !args.no_lowercase,
        digits: !args.no_digits,
        symbols: !args.no_symbols,
    }
}

pub fn run(ctx: &Context, args: &GenerateArgs) -> Result<()> {
    let password = generate_random_password(args.length, &charset(args))?;
    output::status(ctx.format(), &password)
}
