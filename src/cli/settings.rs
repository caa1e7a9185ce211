//! The `settings` subcommands, for viewing and editing the program settings file
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Edit the program settings file, creating it first if needed
    Edit,
    /// Print the path the settings file is read from
    Path,
    /// Print the settings in effect, with defaults filled in for any not in the settings file
    Show,
    /// Print a settings file with every setting commented out and described
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Edit => handle_edit_command(),
            Self::Path => {
                println!("{}", get_settings_file_path().display());
                Ok(())
            }
            Self::Show => {
                print!("{}", effective_settings(&get_settings_file_path())?);
                Ok(())
            }
            Self::DumpDefault => {
                print!("{}", Settings::default_file_contents()?);
                Ok(())
            }
        }
    }
}

/// The settings read from `file_path`, as TOML
fn effective_settings(file_path: &Path) -> Result<String> {
    let settings = Settings::load_from_path(file_path)
        .with_context(|| format!("Invalid settings file: {}", file_path.display()))?;
    settings.to_toml()
}

/// Write the default settings file to `file_path` unless a file is already there
fn ensure_settings_file_exists(file_path: &Path) -> Result<()> {
    if file_path.is_file() {
        return Ok(());
    }

    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path)
            .with_context(|| format!("Failed to create directory: {}", dir_path.display()))?;
    }
    fs::write(file_path, Settings::default_file_contents()?)?;

    Ok(())
}

/// Handle the `edit` command
fn handle_edit_command() -> Result<()> {
    let file_path = get_settings_file_path();
    ensure_settings_file_exists(&file_path)?;

    println!("Opening settings file for editing: {}", file_path.display());
    edit::edit_file(&file_path)?;

    // Catch mistakes now rather than on the next sweep
    Settings::load_from_path(&file_path)
        .with_context(|| format!("Edited settings file is invalid: {}", file_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_settings_file_exists() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("poverty-sweep").join("settings.toml");
        ensure_settings_file_exists(&file_path).unwrap();
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            Settings::default_file_contents().unwrap()
        );

        // An existing file is left alone
        fs::write(&file_path, "log_level = \"debug\"\n").unwrap();
        ensure_settings_file_exists(&file_path).unwrap();
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "log_level = \"debug\"\n"
        );
    }

    #[test]
    fn test_effective_settings() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("settings.toml");

        // No file: all defaults
        let shown = effective_settings(&file_path).unwrap();
        assert!(shown.contains("results_dir = \"poverty_sweep_results\""));

        fs::write(&file_path, "draw_maps = true\n").unwrap();
        let shown = effective_settings(&file_path).unwrap();
        assert!(shown.contains("draw_maps = true"));
        assert!(shown.contains("log_level = \"info\""));

        fs::write(&file_path, "overwrite = 3\n").unwrap();
        assert!(effective_settings(&file_path).is_err());
    }
}
