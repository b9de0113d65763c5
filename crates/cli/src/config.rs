//! Per-directory transpiler settings.
//!
//! A `tryexpr.toml` next to the input file may set any field of
//! [`TranspileOptions`]; command-line flags win over the file.

use std::path::{Path, PathBuf};
use tryexpr_core::TranspileOptions;

pub(crate) const CONFIG_FILE: &str = "tryexpr.toml";

/// Where the settings for `input` would live.
pub(crate) fn config_path(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE)
}

/// Resolve the options for `input`: defaults, then `tryexpr.toml`, then
/// the `--temp-prefix` flag.
pub(crate) fn load_options(
    input: &Path,
    temp_prefix: Option<&str>,
) -> Result<TranspileOptions, String> {
    let path = config_path(input);
    let mut options = if path.is_file() {
        let src = std::fs::read_to_string(&path)
            .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
        let parsed: TranspileOptions = toml::from_str(&src)
            .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?;
        tracing::debug!(config = %path.display(), "loaded options");
        parsed
    } else {
        TranspileOptions::default()
    };
    if let Some(prefix) = temp_prefix {
        options.temp_prefix = prefix.to_owned();
    }
    options.check()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let options = load_options(&tmp.path().join("a.js"), None).unwrap();
        assert_eq!(options, TranspileOptions::default());
    }

    #[test]
    fn file_values_are_applied() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "temp_prefix = \"$t\"\nmax_errors = 3\n",
        )
        .unwrap();
        let options = load_options(&tmp.path().join("a.js"), None).unwrap();
        assert_eq!(options.temp_prefix, "$t");
        assert_eq!(options.max_errors, 3);
    }

    #[test]
    fn flag_overrides_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "temp_prefix = \"$t\"\n").unwrap();
        let options = load_options(&tmp.path().join("a.js"), Some("_x")).unwrap();
        assert_eq!(options.temp_prefix, "_x");
    }

    #[test]
    fn unknown_keys_and_bad_prefixes_are_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "prefix = \"__\"\n").unwrap();
        let err = load_options(&tmp.path().join("a.js"), None).unwrap_err();
        assert!(err.starts_with("invalid config"), "{}", err);

        let other = TempDir::new().unwrap();
        let err = load_options(&other.path().join("a.js"), Some("9")).unwrap_err();
        assert!(err.contains("not a valid identifier prefix"), "{}", err);
    }
}
