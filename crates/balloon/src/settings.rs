use crate::prelude::*;
use balloon_core::config::{parse_settings, Settings};

/// Settings from `--config`, or the defaults when no file is given.
pub fn load(global: &crate::Global) -> Result<Settings> {
    let Some(path) = &global.config else {
        return Ok(Settings::default());
    };

    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| f!("Failed to read settings file {}", path.display()))?;
    let settings = parse_settings(&text).map_err(|e| Error::InvalidInput {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    log::debug!("loaded settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn global(config: Option<std::path::PathBuf>) -> crate::Global {
        crate::Global {
            config,
            verbose: false,
        }
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = load(&global(None)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_overrides_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ocr]\ndpi = 200\n\n[template]\nbare_keys = true").unwrap();

        let settings = load(&global(Some(file.path().to_path_buf()))).unwrap();
        assert_eq!(settings.ocr.dpi, 200);
        assert!(settings.template.bare_keys);
        assert_eq!(settings.ocr.language, "eng");
    }

    #[test]
    fn test_load_reports_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ocr]\ndpi = \"high\"").unwrap();

        let err = load(&global(Some(file.path().to_path_buf()))).unwrap_err();
        assert!(err.to_string().contains("Invalid input"));
    }
}
