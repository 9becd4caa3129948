use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::error::DetectError;
use crate::models::{ObjectKind, Point};

/// Label glyph height in pixels
const LABEL_SCALE: f32 = 26.0;

/// Label position relative to the contour centre: 7 px left, baseline 30 px below
const LABEL_DX: i32 = -7;
const LABEL_BASELINE_DY: i32 = 30;

/// Places where a usable sans-serif font usually lives
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load a TrueType/OpenType font file
pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontArc, DetectError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    FontArc::try_from_vec(bytes).map_err(|e| {
        DetectError::InvalidInput(format!("invalid font {}: {}", path.display(), e))
    })
}

/// First font found in the usual system locations
pub fn find_system_font() -> Option<FontArc> {
    SYSTEM_FONT_PATHS
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .find_map(|p| match load_font(&p) {
            Ok(font) => {
                log::debug!("Using label font {}", p.display());
                Some(font)
            }
            Err(e) => {
                log::debug!("Skipping font {}: {}", p.display(), e);
                None
            }
        })
}

/// Draws classified contours and their running counts onto the scene
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    mark_color: Rgb<u8>,
    mark_thickness: u32,
}

impl Annotator {
    pub fn new(font: Option<FontArc>, mark_color: [u8; 3], mark_thickness: u32) -> Self {
        if font.is_none() {
            log::warn!("No label font available; count labels will not be drawn");
        }
        Self {
            font,
            mark_color: Rgb(mark_color),
            mark_thickness,
        }
    }

    /// Outline plus count label for one classified contour
    pub fn mark(
        &self,
        image: &mut RgbImage,
        contour: &[Point],
        center: (f32, f32),
        kind: ObjectKind,
        count: usize,
    ) {
        self.draw_outline(image, contour);
        self.draw_label(image, center, &count.to_string(), Rgb(kind.label_color()));
    }

    /// Stamp a `thickness x thickness` square on every contour point, so
    /// the stroke is exactly `mark_thickness` pixels wide
    pub fn draw_outline(&self, image: &mut RgbImage, contour: &[Point]) {
        let size = self.mark_thickness.max(1);
        let back = ((size - 1) / 2) as i32;
        for p in contour {
            let brush = Rect::at(p.x - back, p.y - back).of_size(size, size);
            draw_filled_rect_mut(image, brush, self.mark_color);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, (cx, cy): (f32, f32), text: &str, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let x = cx as i32 + LABEL_DX;
        // imageproc places text by its top-left corner
        let y = cy as i32 + LABEL_BASELINE_DY - LABEL_SCALE as i32;
        draw_text_mut(image, color, x, y, PxScale::from(LABEL_SCALE), font, text);
    }
}
