//! Command handlers

pub mod semester;
pub mod user;
pub mod wallet;

use anyhow::Result;
use serde::Serialize;

/// Pretty-printed JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
