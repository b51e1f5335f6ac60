//! One module per subcommand, plus shared flag parsing.

pub mod drop;
pub mod dump;
pub mod remove;
pub mod run;
pub mod status;
pub mod submit;

use anyhow::{bail, Result};

/// Value of `name` in `args`, if the flag is present.
pub fn flag<'a>(args: &'a [&str], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == name)
        .and_then(|i| args.get(i + 1).copied())
}

/// Like [`flag`], but the flag is mandatory.
pub fn required_flag<'a>(args: &'a [&str], name: &str, what: &str) -> Result<&'a str> {
    match flag(args, name) {
        Some(value) => Ok(value),
        None => bail!("{what} is required ({name})"),
    }
}
