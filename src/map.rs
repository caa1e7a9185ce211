//! Classed maps of accessibility, with classes set at the poverty lines found by the sweep.
//!
//! The map phase only depends on the sweep through the threshold lookup tables it wrote, so maps
//! can be regenerated without sweeping again.
use crate::access::{AccessTable, ScoreKind};
use crate::error::{UnitFailure, report_failures};
use crate::output::{lines_file_path, write_atomically};
use crate::poverty_line::{LineMode, Percent};
use crate::project::parameters::MapParameters;
use crate::project::{Project, SweepSource};
use crate::region::{Region, RegionID};
use crate::threshold::ThresholdTable;
use crate::time_of_day::{TimeOfDayID, layer_name};
use anyhow::{Context, Result};
use geo::LineString;
use itertools::Itertools;
use log::info;
use std::fmt;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use strum::{EnumIter, IntoEnumIterator};

pub mod layer;
use layer::{PolygonFeature, join_scores, read_line_layer, read_polygon_layer};
pub mod render;
use render::{MapText, render_map};
pub mod scale;
use scale::{LabelFormat, ThresholdScale};
pub mod text;

/// The kinds of map drawn for each region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MapVariant {
    /// Transit access in jobs, classed by fractions of the region's supply
    Fractional,
    /// Transit access as a fraction of auto access, classed by the same fractions
    Auto,
    /// Transit access in jobs, classed by percentiles
    Percentile,
}

impl MapVariant {
    /// The poverty-line mode whose threshold lookup table classifies this map
    pub fn line_mode(self) -> LineMode {
        match self {
            Self::Fractional => LineMode::FractionOfSupply,
            Self::Auto => LineMode::AutoRatio,
            Self::Percentile => LineMode::Percentile,
        }
    }

    /// The accessibility measure shown on the map
    pub fn score_kind(self) -> ScoreKind {
        match self {
            Self::Fractional | Self::Percentile => ScoreKind::Absolute,
            Self::Auto => ScoreKind::Ratio,
        }
    }

    /// The classification breaks for this map, as parameters of the sweep
    pub fn markers(self, params: &MapParameters) -> Result<Vec<Percent>> {
        let markers = match self {
            Self::Fractional => &params.fraction_markers,
            Self::Auto => &params.auto_markers,
            Self::Percentile => &params.percentile_markers,
        };
        markers.iter().map(|&p| Percent::new(p)).collect()
    }

    /// The image file name for a region, e.g. `WAS_fractional.png`
    pub fn file_name(self, region: &RegionID) -> String {
        format!("{region}_{self}.png")
    }

    fn title(self, region: &Region) -> String {
        let kind = match self {
            Self::Fractional => "Fractional",
            Self::Auto => "Auto Ratio",
            Self::Percentile => "Percentile",
        };
        format!("{kind} Disadvantage Lines in {}", region.description)
    }

    /// The heading of the legend
    pub fn legend_title(self) -> &'static str {
        match self {
            Self::Fractional | Self::Percentile => "Jobs Reachable",
            Self::Auto => "Transit/Auto Access",
        }
    }

    /// How the legend's break values are written
    pub fn label_format(self) -> LabelFormat {
        match self {
            Self::Fractional => LabelFormat::Thousands,
            Self::Auto => LabelFormat::Ratio,
            Self::Percentile => LabelFormat::SiPrefix,
        }
    }

    fn subtitle(self) -> &'static str {
        match self {
            Self::Fractional => {
                "Distribution of jobs reachable in 45 minutes for various disadvantage lines"
            }
            Self::Auto => {
                "Distribution of the ratio of transit:auto jobs accessible for various \
                 disadvantage lines"
            }
            Self::Percentile => {
                "Distribution of jobs accessible for various disadvantage lines set with \
                 percentiles."
            }
        }
    }
}

impl fmt::Display for MapVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fractional => "fractional",
            Self::Auto => "auto",
            Self::Percentile => "percentile",
        };
        write!(f, "{label}")
    }
}

/// The input layers shared by every map of a region
pub struct RegionLayers {
    polygons: Vec<PolygonFeature>,
    scores: AccessTable,
    transit_lines: Vec<LineString<f64>>,
}

/// Composes the maps for one time of day of a project
pub struct MapComposer<'a> {
    project: &'a Project,
    tod: &'a TimeOfDayID,
    layer_title: String,
}

impl<'a> MapComposer<'a> {
    /// Create a new [`MapComposer`] for the project's mapped time of day
    pub fn new(project: &'a Project) -> Self {
        let params = &project.parameters;
        let tod = params.map_time_of_day();
        let layer_title = params
            .maps
            .layer_title
            .clone()
            .unwrap_or_else(|| layer_name(&params.week_of, tod));

        Self {
            project,
            tod,
            layer_title,
        }
    }

    /// Load the polygons, scores and transit lines for a region
    pub fn load_layers(&self, region: &RegionID) -> Result<RegionLayers> {
        let project = self.project;
        let polygons_path = project.polygons_path(region, self.tod)?;
        let polygons = read_polygon_layer(&polygons_path, &project.parameters.columns.id)?;
        let scores = project.load_access(region, self.tod)?;
        let transit_lines = read_line_layer(&project.transit_lines_path(region)?)?;
        info!(
            "Loaded {} polygons and {} transit lines for region {region}",
            polygons.len(),
            transit_lines.len()
        );

        Ok(RegionLayers {
            polygons,
            scores,
            transit_lines,
        })
    }

    /// The text drawn on a map image
    fn map_text(
        &self,
        region: &Region,
        variant: MapVariant,
        markers: &[Percent],
        domain: &[f64],
    ) -> MapText {
        let format = variant.label_format();
        MapText {
            title: variant.title(region),
            subtitles: vec![
                variant.subtitle().to_string(),
                format!(
                    "Data for the week of {}. Major transit lines are shown in white.",
                    self.layer_title
                ),
                format!("Disadvantage lines are set at p = {}.", markers.iter().join(", ")),
            ],
            legend_title: variant.legend_title().to_string(),
            break_labels: domain.iter().map(|&value| format.format(value)).collect(),
        }
    }

    /// Render one map and write it to `file_path`.
    ///
    /// Fails if any classification break is missing from the threshold lookup table.
    pub fn compose(
        &self,
        region: &Region,
        variant: MapVariant,
        layers: &RegionLayers,
        thresholds: &ThresholdTable,
        file_path: &Path,
    ) -> Result<()> {
        let params = &self.project.parameters.maps;
        let markers = variant.markers(params)?;
        let domain = thresholds.resolve(&region.id, self.tod, &markers)?;
        let scale = ThresholdScale::new(domain);

        let features = join_scores(&layers.polygons, &layers.scores, variant.score_kind())?;
        let text = self.map_text(region, variant, &markers, scale.domain());
        let canvas = render_map(
            &features,
            &scale,
            &layers.transit_lines,
            &text,
            params.width,
            params.height,
        )?;

        let chunks = text_chunks(&text, scale.domain());
        write_atomically(file_path, |file| canvas.write_png(BufWriter::new(file), &chunks))
    }
}

/// The text stored alongside a map image
fn text_chunks(text: &MapText, domain: &[f64]) -> Vec<(&'static str, String)> {
    vec![
        ("Title", text.title.clone()),
        ("Description", text.subtitles.join("\n")),
        ("Comment", format!("Class breaks: {}", domain.iter().join(", "))),
        (
            "Software",
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        ),
    ]
}

/// Render every map variant for every mapped region of the project.
///
/// Each (region, variant) is independent: failures are reported once all other maps are written.
///
/// # Arguments
///
/// * `project` - The project to map
/// * `lines_dir` - The folder containing the sweep's threshold lookup tables
/// * `maps_dir` - The folder to which images will be written
pub fn render_maps(project: &Project, lines_dir: &Path, maps_dir: &Path) -> Result<()> {
    let mut failures = Vec::new();

    let mut variants = Vec::new();
    for variant in MapVariant::iter() {
        let mode = variant.line_mode();
        if !project.parameters.sweep.strategies.contains(&mode) {
            info!("Skipping {variant} maps as {mode} poverty lines are not swept");
            continue;
        }

        let file_path = lines_file_path(lines_dir, mode.output_stem());
        match ThresholdTable::from_path(&file_path) {
            Ok(thresholds) => variants.push((variant, thresholds)),
            Err(err) => failures.push(UnitFailure::new(format!("{variant} maps"), err)),
        }
    }

    let composer = MapComposer::new(project);
    for region in project.map_regions() {
        let layers = match composer.load_layers(&region.id) {
            Ok(layers) => layers,
            Err(err) => {
                failures.push(UnitFailure::new(format!("maps for {}", region.id), err));
                continue;
            }
        };

        for (variant, thresholds) in &variants {
            let file_path: PathBuf = maps_dir.join(variant.file_name(&region.id));
            match composer
                .compose(region, *variant, &layers, thresholds, &file_path)
                .with_context(|| format!("Failed to draw {}", file_path.display()))
            {
                Ok(()) => info!("Wrote {}", file_path.display()),
                Err(err) => failures.push(UnitFailure::new(
                    format!("{} map for {}", variant, region.id),
                    err,
                )),
            }
        }
    }

    report_failures("Map rendering", &failures)
}
