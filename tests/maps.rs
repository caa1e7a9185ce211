//! Integration tests for the `maps` command.
use map_macro::hash_set;
use poverty_sweep::cli::{MapsOpts, handle_maps_command};
use poverty_sweep::project::Project;
use poverty_sweep::settings::Settings;
use poverty_sweep::sweep::run_sweep;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo project.
fn get_project_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `maps` command.
#[test]
fn test_handle_maps_command() {
    unsafe { std::env::set_var("POVERTY_SWEEP_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    let project = Project::from_path(get_project_dir()).unwrap();
    run_sweep(&project, dir.path()).unwrap();

    let maps_dir = dir.path().join("maps");
    let opts = MapsOpts {
        output_dir: Some(maps_dir.clone()),
        lines_dir: Some(dir.path().to_path_buf()),
        overwrite: false,
    };
    handle_maps_command(&get_project_dir(), &opts, Some(Settings::default())).unwrap();

    let images: HashSet<String> = fs::read_dir(&maps_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".png"))
        .collect();
    let expected = hash_set! {
        "WAS_fractional.png".to_string(),
        "WAS_auto.png".to_string(),
        "WAS_percentile.png".to_string(),
        "BOS_fractional.png".to_string(),
        "BOS_auto.png".to_string(),
        "BOS_percentile.png".to_string(),
    };
    assert_eq!(images, expected);

    // Check image size and embedded title
    let decoder = png::Decoder::new(File::open(maps_dir.join("WAS_auto.png")).unwrap());
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    assert_eq!((info.width, info.height), (400, 400));
    let title = info
        .uncompressed_latin1_text
        .iter()
        .find(|chunk| chunk.keyword == "Title")
        .unwrap();
    assert_eq!(title.text, "Auto Ratio Disadvantage Lines in Washington, DC");
}
