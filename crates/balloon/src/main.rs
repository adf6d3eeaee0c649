use crate::prelude::*;
use clap::Parser;

mod error;
mod fill;
mod prelude;
mod resolve;
mod rows;
mod settings;
mod spans;
#[cfg(test)]
mod testing;
mod validate;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Resolve balloon markers on drawing PDFs and populate inspection report templates"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// TOML settings file
    #[clap(long, env = "BALLOON_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "BALLOON_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Print the word spans of a PDF page
    Spans(crate::spans::Options),

    /// Find the text nearest to a balloon position
    Resolve(crate::resolve::Options),

    /// Pick the table row that best matches candidate values
    #[clap(name = "match")]
    Match(crate::rows::Options),

    /// Populate a report template with balloon records
    Fill(crate::fill::Options),

    /// Check that a report template has a usable table
    Validate(crate::validate::Options),
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let app = App::parse();

    init_logging(app.global.verbose);
    color_eyre::install()?;

    let settings = crate::settings::load(&app.global)?;

    match app.command {
        SubCommands::Spans(options) => crate::spans::run(options, &settings),
        SubCommands::Resolve(options) => crate::resolve::run(options, &settings),
        SubCommands::Match(options) => crate::rows::run(options, &settings),
        SubCommands::Fill(options) => crate::fill::run(options, &settings),
        SubCommands::Validate(options) => crate::validate::run(options),
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
