//! The command line interface for the program.
use crate::log;
use crate::map::render_maps;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_maps_dir, get_output_dir};
use crate::project::Project;
use crate::settings::Settings;
use crate::sweep::run_sweep;
use ::log::{info, warn};
use anyhow::{Context, Result, bail, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::path::{self, Path, PathBuf};

pub mod demo;
use demo::DemoSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the program.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the sweep command
#[derive(Args, Default)]
pub struct SweepOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// Options for the maps command
#[derive(Args, Default)]
pub struct MapsOpts {
    /// Directory for map images [default: `maps` inside the lines directory]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Directory containing the threshold lookup tables written by `sweep`
    #[arg(long)]
    pub lines_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Sweep poverty lines over a project and compute poverty indices.
    Sweep {
        /// Path to the project directory.
        project_dir: PathBuf,
        /// Other sweep options
        #[command(flatten)]
        opts: SweepOpts,
    },
    /// Render maps classed by the poverty lines of a previous sweep.
    Maps {
        /// Path to the project directory.
        project_dir: PathBuf,
        /// Other map options
        #[command(flatten)]
        opts: MapsOpts,
    },
    /// Validate a project.
    Validate {
        /// The path to the project directory.
        project_dir: PathBuf,
    },
    /// Manage demo projects.
    Demo {
        /// The available subcommands for managing demo projects.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Manage program settings.
    Settings {
        /// The subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Sweep { project_dir, opts } => handle_sweep_command(&project_dir, &opts, None),
            Self::Maps { project_dir, opts } => handle_maps_command(&project_dir, &opts, None),
            Self::Validate { project_dir } => handle_validate_command(&project_dir, None),
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ poverty-sweep --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Create the output folder and start logging to it.
///
/// # Returns
///
/// Whether an existing folder was overwritten.
fn prepare_output_dir(output_path: &Path, overwrite: bool, settings: &Settings) -> Result<bool> {
    let overwritten = create_output_directory(output_path, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;

    Ok(overwritten)
}

/// Handle the `sweep` command.
///
/// If the `draw_maps` setting is enabled, maps are drawn into the `maps` folder of the output
/// folder once the sweep completes.
pub fn handle_sweep_command(
    project_path: &Path,
    opts: &SweepOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(project_path, &settings.results_dir)?;
        &pathbuf
    };

    let overwritten =
        prepare_output_dir(output_path, opts.overwrite || settings.overwrite, &settings)?;

    let project = Project::from_path(project_path).context("Failed to load project.")?;
    info!("Loaded project from {}", project_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder was overwritten");
    }

    write_metadata(output_path, project_path, &project.parameters.sweep.strategies)
        .context("Failed to save metadata.")?;

    run_sweep(&project, output_path)?;
    info!("Sweep complete!");

    if settings.draw_maps {
        // The logger is already running, so only the folder needs creating
        let maps_dir = get_maps_dir(output_path);
        create_output_directory(&maps_dir, false)?;
        render_maps(&project, output_path, &maps_dir)?;
        info!("Maps written to {}", maps_dir.display());
    }

    Ok(())
}

/// Check that preparing the maps folder cannot delete the poverty lines it is drawn from
fn check_maps_dir(maps_dir: &Path, lines_dir: &Path) -> Result<()> {
    let maps_dir = path::absolute(maps_dir)?;
    let lines_dir = path::absolute(lines_dir)?;
    ensure!(
        !lines_dir.starts_with(&maps_dir),
        "Maps folder {} must not be the poverty lines folder {} or contain it",
        maps_dir.display(),
        lines_dir.display()
    );

    Ok(())
}

/// Handle the `maps` command.
pub fn handle_maps_command(
    project_path: &Path,
    opts: &MapsOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    let lines_dir = match &opts.lines_dir {
        Some(dir) => dir.clone(),
        None => get_output_dir(project_path, &settings.results_dir)?,
    };
    let maps_dir = match &opts.output_dir {
        Some(dir) => dir.clone(),
        None => get_maps_dir(&lines_dir),
    };
    check_maps_dir(&maps_dir, &lines_dir)?;

    let overwritten =
        prepare_output_dir(&maps_dir, opts.overwrite || settings.overwrite, &settings)?;

    let project = Project::from_path(project_path).context("Failed to load project.")?;
    info!("Loaded project from {}", project_path.display());
    info!("Reading poverty lines from {}", lines_dir.display());
    info!("Output folder: {}", maps_dir.display());

    if overwritten {
        warn!("Output folder was overwritten");
    }

    render_maps(&project, &lines_dir, &maps_dir)?;
    info!("Maps complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(project_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let project = Project::from_path(project_path).context("Failed to validate project.")?;
    let missing = project.find_missing_inputs()?;
    if !missing.is_empty() {
        bail!(
            "Project is missing {} input file(s):\n{}",
            missing.len(),
            missing.iter().map(|path| path.display()).join("\n")
        );
    }
    info!("Project validation successful!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_check_maps_dir() {
        let dir = tempdir().unwrap();
        let lines_dir = dir.path().join("results");
        assert!(check_maps_dir(&lines_dir.join("maps"), &lines_dir).is_ok());
        assert!(check_maps_dir(&dir.path().join("maps"), &lines_dir).is_ok());
        assert!(check_maps_dir(&lines_dir, &lines_dir).is_err());
        assert!(check_maps_dir(dir.path(), &lines_dir).is_err());
    }

    #[test]
    fn test_maps_command_keeps_lines() {
        let dir = tempdir().unwrap();
        let lines_dir = dir.path().join("results");
        fs::create_dir(&lines_dir).unwrap();
        let lines_file = lines_dir.join("fraction_lines.csv");
        fs::write(&lines_file, "region,tod,p,value\n").unwrap();

        let opts = MapsOpts {
            output_dir: Some(lines_dir.clone()),
            lines_dir: Some(lines_dir),
            overwrite: true,
        };
        let settings = Settings {
            overwrite: true,
            ..Settings::default()
        };
        assert!(handle_maps_command(dir.path(), &opts, Some(settings)).is_err());
        assert!(lines_file.exists());
    }
}
