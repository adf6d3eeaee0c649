use crate::prelude::{println, *};
use balloon_core::config::Settings;
use balloon_core::matching::best_match;
use balloon_core::MatchResult;
use docx_template::Template;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Candidate values, comma separated (e.g. "R5,14.76")
    #[arg(long, value_delimiter = ',', required = true)]
    pub candidates: Vec<String>,

    /// DOCX document whose table rows are matched
    #[arg(long, required_unless_present = "row")]
    pub rows_from: Option<std::path::PathBuf>,

    /// Extra row text, may be repeated
    #[arg(long)]
    pub row: Vec<String>,

    /// Numeric tolerance, overriding the configured one
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn collect_rows(options: &Options) -> Result<Vec<String>> {
    let mut rows = Vec::new();
    if let Some(path) = &options.rows_from {
        let document = Template::read_file(path)
            .wrap_err_with(|| f!("Failed to read rows from {}", path.display()))?;
        rows.extend(document.table_rows());
    }
    rows.extend(options.row.iter().cloned());
    Ok(rows)
}

fn match_rows(options: &Options, rows: &[String], settings: &Settings) -> Result<MatchResult> {
    let tolerance = options
        .tolerance
        .unwrap_or(settings.matching.numeric_tolerance);
    best_match(options.candidates.as_slice(), rows, tolerance).ok_or_else(|| Error::NoRows.into())
}

pub fn run(options: Options, settings: &Settings) -> Result<()> {
    let rows = collect_rows(&options)?;
    log::debug!("matching {:?} against {} rows", options.candidates, rows.len());
    let result = match_rows(&options, &rows, settings)?;

    if options.json {
        return print_json(&result);
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Row", result.index]);
    table.add_row(prettytable::row!["Text", result.row]);
    table.add_row(prettytable::row!["Score", result.score]);
    table.add_row(prettytable::row![
        "Kind",
        if result.numeric { "numeric" } else { "fuzzy" }
    ]);
    println!();
    table.printstd();
    Ok(())
}
