//! Rasterisation of classed maps to PNG.
use super::layer::MapFeature;
use super::scale::{Rgb, ThresholdScale};
use super::text::{LINE_SPACING, Typeface};
use anyhow::{Result, bail, ensure};
use geo::{BoundingRect, Contains, Coord, LineString, MapCoords, MultiPolygon, Point, Rect};
use rstar::{AABB, RTree, RTreeObject};
use std::f64::consts::FRAC_PI_4;
use std::io::Write;

/// Radius of the sphere used by the Web Mercator projection, in metres
const EARTH_RADIUS: f64 = 6_378_137.0;

/// The largest latitude which can be projected
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Fraction of the map area left empty around the features
const MARGIN: f64 = 0.05;

/// The image width at which the sizes below apply; other widths scale them proportionally
const REFERENCE_WIDTH: f32 = 2000.0;

/// Transit line width
const LINE_WIDTH: f32 = 4.0;
const TITLE_SIZE: f32 = 80.0;
const SUBTITLE_SIZE: f32 = 48.0;
const LEGEND_TITLE_SIZE: f32 = 68.0;
const LABEL_SIZE: f32 = 48.0;
const SWATCH_HEIGHT: f32 = 50.0;
const PADDING: f32 = 20.0;

/// Text is never scaled below this size, in pixels
const MIN_FONT_SIZE: f32 = 8.0;

/// Fraction of the image width left empty either side of the legend swatches
const LEGEND_MARGIN: f32 = 0.1;

const BACKGROUND: Rgb = [255, 255, 255];
const LINE_COLOUR: Rgb = [255, 255, 255];
const LEGEND_BACKGROUND: Rgb = [245, 245, 245];
const TITLE_COLOUR: Rgb = [112, 128, 144];
const LEGEND_TEXT_COLOUR: Rgb = [40, 40, 40];

/// Project longitude/latitude in degrees to spherical Web Mercator metres
pub fn web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: EARTH_RADIUS * coord.x.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Maps projected coordinates onto the pixels of a map area
#[derive(Debug, Clone, Copy)]
struct Viewport {
    origin: Coord<f64>,
    scale: f64,
    offset: Coord<f64>,
}

impl Viewport {
    /// Fit projected bounds into a `width` × `height` pixel area starting `top` pixels down the
    /// image, centred and with a margin
    fn fit(bounds: Rect<f64>, width: f64, height: f64, top: f64) -> Self {
        let span_x = bounds.width().max(f64::EPSILON);
        let span_y = bounds.height().max(f64::EPSILON);
        let usable = 1.0 - 2.0 * MARGIN;
        let scale = (width * usable / span_x).min(height * usable / span_y);

        Self {
            origin: Coord {
                x: bounds.min().x,
                y: bounds.max().y,
            },
            scale,
            offset: Coord {
                x: (width - span_x * scale) / 2.0,
                y: top + (height - span_y * scale) / 2.0,
            },
        }
    }

    /// Pixel coordinates of a projected point, with y increasing downwards
    fn to_pixel(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.offset.x + (coord.x - self.origin.x) * self.scale,
            y: self.offset.y + (self.origin.y - coord.y) * self.scale,
        }
    }
}

/// A polygon in pixel space, indexed by its bounding box
struct PixelPolygon {
    polygon: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
    colour: Rgb,
}

impl RTreeObject for PixelPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn compute_envelope(polygon: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

/// An RGB image
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Create a canvas filled with one colour
    pub fn new(width: u32, height: u32, colour: Rgb) -> Self {
        let pixels = colour
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Image width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The colour of a pixel
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let idx = self.index(x, y);
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    fn set_pixel(&mut self, x: u32, y: u32, colour: Rgb) {
        let idx = self.index(x, y);
        self.pixels[idx..idx + 3].copy_from_slice(&colour);
    }

    /// Mix a colour into a pixel, clipped to the canvas
    fn blend(&mut self, x: u32, y: u32, colour: Rgb, coverage: f32) {
        if x >= self.width || y >= self.height {
            return;
        }

        let coverage = coverage.clamp(0.0, 1.0);
        let idx = self.index(x, y);
        for (channel, &value) in self.pixels[idx..idx + 3].iter_mut().zip(&colour) {
            let old = f32::from(*channel);
            *channel = (old + (f32::from(value) - old) * coverage).round() as u8;
        }
    }

    /// Draw a line of text horizontally centred on `centre`
    fn draw_text(
        &mut self,
        face: &Typeface,
        text: &str,
        size: f32,
        centre: f32,
        top: f32,
        colour: Rgb,
    ) {
        let left = centre - face.measure(text, size) / 2.0;
        face.draw(text, size, left, top, |x, y, coverage| {
            self.blend(x, y, colour, coverage);
        });
    }

    /// Fill a rectangle, clipped to the canvas
    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, colour: Rgb) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                self.set_pixel(x, y, colour);
            }
        }
    }

    /// Fill a disc, clipped to the canvas
    fn fill_disc(&mut self, centre: Coord<f64>, radius: f64, colour: Rgb) {
        let clamp_x = |v: f64| v.clamp(0.0, f64::from(self.width)) as u32;
        let clamp_y = |v: f64| v.clamp(0.0, f64::from(self.height)) as u32;
        let (x0, x1) = (clamp_x(centre.x - radius), clamp_x(centre.x + radius + 1.0));
        let (y0, y1) = (clamp_y(centre.y - radius), clamp_y(centre.y + radius + 1.0));

        for y in y0..y1 {
            for x in x0..x1 {
                let dx = f64::from(x) + 0.5 - centre.x;
                let dy = f64::from(y) + 0.5 - centre.y;
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(x, y, colour);
                }
            }
        }
    }

    /// Stroke a line string with round joins
    fn stroke(&mut self, line: &LineString<f64>, width: f64, colour: Rgb) {
        let radius = width / 2.0;
        for segment in line.lines() {
            let (dx, dy) = (segment.dx(), segment.dy());
            let steps = (dx.hypot(dy) / 0.5).ceil().max(1.0) as usize;
            for step in 0..=steps {
                let t = step as f64 / steps as f64;
                let centre = Coord {
                    x: segment.start.x + dx * t,
                    y: segment.start.y + dy * t,
                };
                self.fill_disc(centre, radius, colour);
            }
        }
    }

    /// Encode as PNG, with text chunks (e.g. `Title`) stored alongside the image
    pub fn write_png<W: Write>(&self, writer: W, text: &[(&str, String)]) -> Result<()> {
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, value) in text {
            encoder.add_text_chunk((*keyword).to_string(), value.clone())?;
        }

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pixels)?;
        writer.finish()?;

        Ok(())
    }
}

/// The text drawn on a map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapText {
    /// Drawn centred along the top of the image
    pub title: String,
    /// Lines drawn below the title
    pub subtitles: Vec<String>,
    /// Drawn above the legend swatches
    pub legend_title: String,
    /// One label per classification break, drawn at the boundary between its two classes
    pub break_labels: Vec<String>,
}

/// Where each part of a map image goes.
///
/// From top to bottom an image has a header (title and subtitles), the map area and a legend band
/// (legend title, swatches and break labels).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    width: u32,
    title_size: f32,
    subtitle_size: f32,
    legend_title_size: f32,
    label_size: f32,
    padding: f32,
    line_width: f32,
    map_top: u32,
    map_height: u32,
    legend_top: u32,
    swatch_top: u32,
    swatch_height: u32,
    label_top: f32,
}

impl Layout {
    fn new(width: u32, height: u32, subtitles: usize) -> Result<Self> {
        let k = width as f32 / REFERENCE_WIDTH;
        let font_size = |reference: f32| (reference * k).max(MIN_FONT_SIZE);
        let line_height = |size: f32| size * LINE_SPACING;

        let title_size = font_size(TITLE_SIZE);
        let subtitle_size = font_size(SUBTITLE_SIZE);
        let legend_title_size = font_size(LEGEND_TITLE_SIZE);
        let label_size = font_size(LABEL_SIZE);
        let padding = (PADDING * k).max(1.0);

        let header = padding
            + line_height(title_size)
            + padding / 2.0
            + subtitles as f32 * line_height(subtitle_size)
            + padding;
        let map_top = header.ceil() as u32;

        let swatch_height = (SWATCH_HEIGHT * k).max(4.0).ceil() as u32;
        let swatch_offset = (padding + line_height(legend_title_size)).ceil() as u32;
        let legend = swatch_offset as f32
            + swatch_height as f32
            + padding / 2.0
            + line_height(label_size)
            + padding;
        let legend_height = legend.ceil() as u32;

        let map_height = height
            .checked_sub(map_top + legend_height)
            .filter(|&map_height| map_height > 0);
        let Some(map_height) = map_height else {
            bail!(
                "A {width}x{height} px image is too small for the map title and legend \
                 ({map_top} + {legend_height} px)"
            );
        };
        let legend_top = map_top + map_height;
        let swatch_top = legend_top + swatch_offset;

        Ok(Self {
            width,
            title_size,
            subtitle_size,
            legend_title_size,
            label_size,
            padding,
            // Never thinner than a couple of pixels
            line_width: (LINE_WIDTH * k).max(2.0),
            map_top,
            map_height,
            legend_top,
            swatch_top,
            swatch_height,
            label_top: (swatch_top + swatch_height) as f32 + padding / 2.0,
        })
    }

    fn centre(&self) -> f32 {
        self.width as f32 / 2.0
    }

    /// Left edge and width of each legend swatch
    fn swatches(&self, count: usize) -> (f32, f32) {
        let left = self.width as f32 * LEGEND_MARGIN;
        let span = self.width as f32 - 2.0 * left;
        (left, span / count.max(1) as f32)
    }
}

/// Render a classed map with a transit line overlay, a title and a legend.
///
/// # Arguments
///
/// * `features` - Spatial unit polygons (in longitude/latitude) with their values
/// * `scale` - Assigns a colour to each value
/// * `transit_lines` - Lines (in longitude/latitude) drawn over the polygons
/// * `text` - Titles and legend labels
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
pub fn render_map(
    features: &[MapFeature],
    scale: &ThresholdScale,
    transit_lines: &[LineString<f64>],
    text: &MapText,
    width: u32,
    height: u32,
) -> Result<Canvas> {
    ensure!(!features.is_empty(), "No polygons to draw");
    let layout = Layout::new(width, height, text.subtitles.len())?;

    let projected: Vec<_> = features
        .iter()
        .map(|feature| (feature.polygon.map_coords(web_mercator), scale.colour(feature.value)))
        .collect();
    let bounds = projected
        .iter()
        .filter_map(|(polygon, _)| polygon.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        });
    let Some(bounds) = bounds else {
        bail!("Polygons have no extent");
    };

    let viewport = Viewport::fit(
        bounds,
        f64::from(width),
        f64::from(layout.map_height),
        f64::from(layout.map_top),
    );

    let mut canvas = Canvas::new(width, height, BACKGROUND);
    let index = RTree::bulk_load(
        projected
            .into_iter()
            .map(|(polygon, colour)| {
                let polygon = polygon.map_coords(|coord| viewport.to_pixel(coord));
                PixelPolygon {
                    envelope: compute_envelope(&polygon),
                    polygon,
                    colour,
                }
            })
            .collect(),
    );

    for y in layout.map_top..layout.legend_top {
        for x in 0..width {
            let (px, py) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
            let point = Point::new(px, py);
            if let Some(entry) = index
                .locate_in_envelope_intersecting(&AABB::from_point([px, py]))
                .find(|entry| entry.polygon.contains(&point))
            {
                canvas.set_pixel(x, y, entry.colour);
            }
        }
    }

    for line in transit_lines {
        let line = line.map_coords(|coord| viewport.to_pixel(web_mercator(coord)));
        canvas.stroke(&line, f64::from(layout.line_width), LINE_COLOUR);
    }

    // Lines must not spill into the header or legend
    canvas.fill_rect(0, 0, width, layout.map_top, BACKGROUND);
    canvas.fill_rect(0, layout.legend_top, width, height, LEGEND_BACKGROUND);

    draw_header(&mut canvas, &layout, text)?;
    draw_legend(&mut canvas, &layout, scale.colours(), text)?;

    Ok(canvas)
}

/// Draw the title and subtitles, shrinking any line too wide for the image
fn draw_header(canvas: &mut Canvas, layout: &Layout, text: &MapText) -> Result<()> {
    let regular = Typeface::regular()?;
    let bold = Typeface::bold()?;
    let max_width = layout.width as f32 - 2.0 * layout.padding;

    let mut top = layout.padding;
    let size = bold.fit(&text.title, layout.title_size, max_width);
    canvas.draw_text(&bold, &text.title, size, layout.centre(), top, TITLE_COLOUR);
    top += layout.title_size * LINE_SPACING + layout.padding / 2.0;

    for subtitle in &text.subtitles {
        let size = regular.fit(subtitle, layout.subtitle_size, max_width);
        canvas.draw_text(&regular, subtitle, size, layout.centre(), top, TITLE_COLOUR);
        top += layout.subtitle_size * LINE_SPACING;
    }

    Ok(())
}

/// Draw one swatch per class, lowest class on the left, with each break labelled at the boundary
/// between its two classes
fn draw_legend(
    canvas: &mut Canvas,
    layout: &Layout,
    colours: &[Rgb],
    text: &MapText,
) -> Result<()> {
    let regular = Typeface::regular()?;
    let bold = Typeface::bold()?;

    let title_top = layout.legend_top as f32 + layout.padding;
    let max_width = layout.width as f32 - 2.0 * layout.padding;
    let size = bold.fit(&text.legend_title, layout.legend_title_size, max_width);
    canvas.draw_text(
        &bold,
        &text.legend_title,
        size,
        layout.centre(),
        title_top,
        LEGEND_TEXT_COLOUR,
    );

    let (left, swatch_width) = layout.swatches(colours.len());
    for (i, colour) in colours.iter().enumerate() {
        let x0 = left + i as f32 * swatch_width;
        canvas.fill_rect(
            x0.round() as u32,
            layout.swatch_top,
            (x0 + swatch_width).round() as u32,
            layout.swatch_top + layout.swatch_height,
            *colour,
        );
    }

    for (i, label) in text.break_labels.iter().enumerate() {
        let boundary = left + (i + 1) as f32 * swatch_width;
        let size = regular.fit(label, layout.label_size, swatch_width);
        canvas.draw_text(
            &regular,
            label,
            size,
            boundary,
            layout.label_top,
            LEGEND_TEXT_COLOUR,
        );
    }

    Ok(())
}
