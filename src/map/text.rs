//! Text rendering for map titles and legends.
use ab_glyph::{Font, FontRef, GlyphId, PxScale, ScaleFont, point};
use anyhow::{Context, Result};

/// DejaVu Sans (see `assets/fonts/LICENSE`)
static REGULAR_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static BOLD_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Distance between baselines, as a multiple of the font size
pub const LINE_SPACING: f32 = 1.2;

/// A font which text can be measured and drawn with
pub struct Typeface {
    font: FontRef<'static>,
}

impl Typeface {
    fn from_bytes(bytes: &'static [u8]) -> Result<Self> {
        let font = FontRef::try_from_slice(bytes).context("Invalid bundled font")?;
        Ok(Self { font })
    }

    /// The regular weight of the bundled font
    pub fn regular() -> Result<Self> {
        Self::from_bytes(REGULAR_FONT)
    }

    /// The bold weight of the bundled font
    pub fn bold() -> Result<Self> {
        Self::from_bytes(BOLD_FONT)
    }

    /// Width of a line of text in pixels
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(previous) = previous {
                width += scaled.kern(previous, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }

        width
    }

    /// The largest size up to `size` at which `text` fits in `max_width` pixels
    pub fn fit(&self, text: &str, size: f32, max_width: f32) -> f32 {
        let width = self.measure(text, size);
        if width <= max_width || width <= 0.0 {
            size
        } else {
            size * max_width / width
        }
    }

    /// Rasterise a line of text whose top-left corner is at (`left`, `top`).
    ///
    /// `plot` is called with pixel coordinates and a coverage between 0 and 1. Pixels left of or
    /// above the origin of the image are skipped.
    pub fn draw<F>(&self, text: &str, size: f32, left: f32, top: f32, mut plot: F)
    where
        F: FnMut(u32, u32, f32),
    {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);
        let mut caret = point(left, top + scaled.ascent());
        let mut previous: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(previous) = previous {
                caret.x += scaled.kern(previous, id);
            }
            let glyph = id.with_scale_and_position(scale, caret);
            caret.x += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                // Whitespace
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x + gx as f32;
                let y = bounds.min.y + gy as f32;
                if x >= 0.0 && y >= 0.0 {
                    plot(x as u32, y as u32, coverage);
                }
            });
        }
    }
}
