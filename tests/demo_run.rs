//! Integration tests for the `demo run` command.
use poverty_sweep::cli::demo::handle_demo_run_command;
use poverty_sweep::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `demo run` command.
#[test]
fn test_handle_demo_run_command() {
    unsafe { std::env::set_var("POVERTY_SWEEP_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("simple");
    handle_demo_run_command(
        "simple",
        Some(&output_dir),
        false,
        Some(Settings::default()),
    )
    .unwrap();

    assert!(output_dir.join("fraction.csv").is_file());
    assert!(output_dir.join("percentile_lines.csv").is_file());
    assert!(output_dir.join("maps").join("BOS_fractional.png").is_file());
}
