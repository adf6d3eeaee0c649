use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::prelude::{eprintln, *};
use balloon_core::config::Settings;
use balloon_core::Balloon;
use docx_template::Template;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// One generated row per balloon, from the pattern row
    #[default]
    Expand,
    /// Set the value cell of rows whose first cell names a balloon
    Reference,
}

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Path to the DOCX template
    pub template: PathBuf,

    /// JSON array of balloon records
    #[arg(long)]
    pub balloons: PathBuf,

    /// JSON object of document-wide metadata
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Where to write the populated document
    #[arg(long, short)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Expand)]
    pub mode: Mode,

    /// Also replace bare metadata keys, not only ${key} and {{key}}
    #[arg(long)]
    pub bare_keys: bool,
}

/// Balloon records from a JSON array.
fn parse_balloons(text: &str, path: &Path) -> Result<Vec<Balloon>> {
    serde_json::from_str(text).map_err(|e| {
        Error::InvalidInput {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Metadata from a JSON object. Scalar values are rendered as text; `null`
/// becomes an empty string.
fn parse_metadata(text: &str, path: &Path) -> Result<BTreeMap<String, String>> {
    let invalid = |reason: String| Error::InvalidInput {
        path: path.display().to_string(),
        reason,
    };
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;

    object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(invalid(f!("field {key:?} is not a scalar: {other}")).into())
                }
            };
            Ok((key, text))
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum FillOutcome {
    Expand(docx_template::FillReport),
    Reference {
        matched: Vec<docx_template::ReferenceMatch>,
    },
}

/// Populate `template` and write the result to `output`.
///
/// The document is first written into a scratch directory that is removed
/// however this function returns; `output` is only touched once the
/// populated package has been written and re-read successfully.
fn fill_to(
    template_bytes: &[u8],
    balloons: &[Balloon],
    metadata: &BTreeMap<String, String>,
    options: &Options,
    settings: &Settings,
) -> Result<FillOutcome> {
    let mut template = Template::from_bytes(template_bytes).map_err(|e| eyre!(e))?;

    let mut substitution = settings.template.substitution_options();
    substitution.bare_keys |= options.bare_keys;

    let outcome = match options.mode {
        Mode::Expand => FillOutcome::Expand(
            template
                .fill(metadata, balloons, substitution)
                .map_err(|e| eyre!(e))?,
        ),
        Mode::Reference => {
            template.substitute(metadata, substitution);
            FillOutcome::Reference {
                matched: template
                    .fill_by_reference(balloons)
                    .map_err(|e| eyre!(e))?,
            }
        }
    };

    let workdir = tempfile::TempDir::new().wrap_err("Failed to create working directory")?;
    let staged = workdir.path().join("report.docx");
    template.save(&staged).map_err(|e| eyre!(e))?;

    let written = Template::read_file(&staged).map_err(|e| eyre!(e))?;
    for token in written.unresolved_placeholders() {
        log::warn!("placeholder {token} is still present in the output");
    }

    std::fs::copy(&staged, &options.output)
        .wrap_err_with(|| f!("Failed to write {}", options.output.display()))?;
    Ok(outcome)
}

pub fn run(options: Options, settings: &Settings) -> Result<()> {
    let template_bytes = read_input(&options.template)?;

    let balloons_text = String::from_utf8(read_input(&options.balloons)?)
        .wrap_err("Balloon file is not UTF-8")?;
    let balloons = parse_balloons(&balloons_text, &options.balloons)?;

    let metadata = match &options.metadata {
        Some(path) => {
            let text =
                String::from_utf8(read_input(path)?).wrap_err("Metadata file is not UTF-8")?;
            parse_metadata(&text, path)?
        }
        None => BTreeMap::new(),
    };

    let outcome = fill_to(&template_bytes, &balloons, &metadata, &options, settings)?;
    print_json(&outcome)?;
    eprintln!("Wrote {}", options.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{docx_with_table, row};

    // -- parse_balloons -------------------------------------------------------

    #[test]
    fn test_parse_balloons_with_extra_fields() {
        let text = r#"[{"id": "B1", "text": "14.76"}, {"id": "B2", "text": "7.72", "type": "diameter", "tol": "0.1"}]"#;
        let balloons = parse_balloons(text, Path::new("b.json")).unwrap();
        assert_eq!(balloons.len(), 2);
        assert_eq!(balloons[1].kind.as_deref(), Some("diameter"));
        assert_eq!(balloons[1].fields.get("tol").map(String::as_str), Some("0.1"));
    }

    #[test]
    fn test_parse_balloons_rejects_object() {
        let err = parse_balloons(r#"{"id": "B1"}"#, Path::new("b.json")).unwrap_err();
        assert!(err.to_string().contains("b.json"));
    }

    // -- parse_metadata -------------------------------------------------------

    #[test]
    fn test_parse_metadata_renders_scalars() {
        let text = r#"{"part": "1244890", "rev": 3, "final": true, "note": null}"#;
        let metadata = parse_metadata(text, Path::new("m.json")).unwrap();
        assert_eq!(metadata["part"], "1244890");
        assert_eq!(metadata["rev"], "3");
        assert_eq!(metadata["final"], "true");
        assert_eq!(metadata["note"], "");
    }

    #[test]
    fn test_parse_metadata_rejects_nested_values() {
        let err = parse_metadata(r#"{"part": {"no": 1}}"#, Path::new("m.json")).unwrap_err();
        assert!(err.to_string().contains("not a scalar"));
    }

    // -- fill_to --------------------------------------------------------------

    fn options_for(output: &Path, mode: Mode) -> Options {
        Options {
            template: "template.docx".into(),
            balloons: "balloons.json".into(),
            metadata: None,
            output: output.to_path_buf(),
            mode,
            bare_keys: false,
        }
    }

    fn report_template() -> Vec<u8> {
        docx_with_table(&[row(&["Ref", "Value"]), row(&["{{id}}", "{{text}}"])])
    }

    #[test]
    fn test_fill_to_writes_header_only_for_no_balloons() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.docx");

        let outcome = fill_to(
            &report_template(),
            &[],
            &BTreeMap::new(),
            &options_for(&output, Mode::Expand),
            &Settings::default(),
        )
        .unwrap();

        assert!(matches!(outcome, FillOutcome::Expand(ref report) if report.rows_written == 0));
        let written = Template::read_file(&output).unwrap();
        assert_eq!(written.table_rows(), vec!["Ref | Value"]);
    }

    #[test]
    fn test_fill_to_expands_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.docx");

        fill_to(
            &report_template(),
            &[Balloon::new("B1", "14.76"), Balloon::new("B2", "7.72")],
            &BTreeMap::new(),
            &options_for(&output, Mode::Expand),
            &Settings::default(),
        )
        .unwrap();

        let written = Template::read_file(&output).unwrap();
        assert_eq!(
            written.table_rows(),
            vec!["Ref | Value", "B1 | 14.76", "B2 | 7.72"]
        );
    }

    #[test]
    fn test_fill_to_reference_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.docx");
        let template = docx_with_table(&[
            row(&["Sr. No", "Observed"]),
            row(&["1", "-"]),
            row(&["2", "-"]),
        ]);

        let outcome = fill_to(
            &template,
            &[Balloon::new("2", "7.72")],
            &BTreeMap::new(),
            &options_for(&output, Mode::Reference),
            &Settings::default(),
        )
        .unwrap();

        assert!(matches!(outcome, FillOutcome::Reference { ref matched } if matched.len() == 1));
        let written = Template::read_file(&output).unwrap();
        assert_eq!(
            written.table_rows(),
            vec!["Sr. No | Observed", "1 | -", "2 | 7.72"]
        );
    }

    #[test]
    fn test_fill_to_leaves_output_untouched_on_bad_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.docx");
        let options = options_for(&output, Mode::Expand);

        let result = fill_to(
            b"not a docx",
            &[Balloon::new("B1", "1.0")],
            &BTreeMap::new(),
            &options,
            &Settings::default(),
        );
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
