use crate::prelude::{println, *};
use docx_template::Template;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Path to the DOCX template
    pub template: std::path::PathBuf,
}

pub fn run(options: Options) -> Result<()> {
    let template = Template::open(&options.template).map_err(|e| eyre!(e))?;

    println!("{} is a valid report template\n", options.template.display());

    let mut table = new_table();
    for (index, row) in template.table_rows().iter().enumerate() {
        table.add_row(prettytable::row![index, row]);
    }
    table.printstd();

    let placeholders = template.unresolved_placeholders();
    if !placeholders.is_empty() {
        println!("\nPlaceholders: {}", placeholders.join(", "));
    }
    Ok(())
}
