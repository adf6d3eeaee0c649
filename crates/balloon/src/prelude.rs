pub use crate::error::Error;

pub use anstream::eprintln;
pub use anstream::println;
pub use color_eyre::eyre::{eyre, Context, Result};
pub use std::format as f;

pub fn new_table() -> prettytable::Table {
    let mut table = prettytable::Table::new();

    let format = prettytable::format::FormatBuilder::new()
        .padding(1, 1)
        .build();

    table.set_format(format);

    table
}

/// Read a whole input file, naming it in the error.
pub fn read_input(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).wrap_err_with(|| f!("Failed to read {}", path.display()))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| eyre!("JSON serialization failed: {}", e))?;
    println!("{}", json);
    Ok(())
}
