//! Three-valued structuring elements built from reference-object masks.
//!
//! A cell is `1` where the scene must be foreground, `-1` where it must be
//! background and `0` where it does not matter. Elements are synthesized from
//! a closed object mask: the eroded core of the object becomes the hit area,
//! the band between the core and the object outline becomes don't-care, and
//! everything else must be background.

use image::GrayImage;
use ndarray::{Array2, Zip};

use super::morphology::Morphology;
use crate::filter::{crop_center, gray_to_matrix, matrix_to_gray, zero_pad};

/// Minimum number of hit cells an element needs to be matched at all
pub const MIN_HIT_CELLS: usize = 5;

/// Level at or above which a mask pixel counts as foreground
const FOREGROUND_LEVEL: u8 = 127;

pub const HIT: i8 = 1;
pub const DONT_CARE: i8 = 0;
pub const MISS: i8 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    cells: Array2<i8>,
}

impl StructuringElement {
    /// Wrap a matrix of `-1 / 0 / 1` cells. Other values are clamped into that range.
    pub fn from_cells(cells: Array2<i8>) -> Self {
        Self {
            cells: cells.mapv(|v| v.clamp(MISS, HIT)),
        }
    }

    /// Build an element from a closed object mask.
    ///
    /// A negative `offset` erodes the object by `|offset|` steps and trims the
    /// same margin from each side, a positive one zero-pads and dilates it.
    /// The core is then found by eroding with a width that starts at
    /// `dont_care_width` and halves until at least [`MIN_HIT_CELLS`] pixels
    /// survive; if width 1 still leaves too few, the whole object is the core.
    pub fn synthesize(
        object: &GrayImage,
        offset: i32,
        dont_care_width: u32,
        morph: &Morphology,
    ) -> Self {
        let pad = offset.unsigned_abs();
        let resized = if offset < 0 {
            let eroded = gray_to_matrix(&morph.erode(object, pad));
            let cropped = crop_center(&eroded.view(), pad as usize, pad as usize);
            matrix_to_gray(&cropped.view())
        } else if offset > 0 {
            let padded = zero_pad(&gray_to_matrix(object).view(), pad as usize, pad as usize);
            morph.dilate(&matrix_to_gray(&padded.view()), pad)
        } else {
            object.clone()
        };

        if resized.width() == 0 || resized.height() == 0 {
            log::debug!(
                "Object {}x{} vanishes at offset {}; no element",
                object.width(),
                object.height(),
                offset
            );
            return Self {
                cells: Array2::zeros((0, 0)),
            };
        }

        let obj = gray_to_matrix(&resized);
        let mut width = dont_care_width.max(1);
        let core = loop {
            let eroded = gray_to_matrix(&morph.erode(&resized, width));
            let strong = eroded.iter().filter(|&&v| v >= FOREGROUND_LEVEL).count();
            if strong >= MIN_HIT_CELLS {
                break eroded;
            }
            if width == 1 {
                log::debug!(
                    "Core erosion left {} strong pixels at offset {}; using the whole object",
                    strong,
                    offset
                );
                break obj.clone();
            }
            width /= 2;
        };

        let cells = Zip::from(&obj).and(&core).map_collect(|&o, &c| {
            let base = if c >= FOREGROUND_LEVEL { HIT } else { MISS };
            let band = if i16::from(o) - i16::from(c) > i16::from(FOREGROUND_LEVEL) {
                1
            } else {
                0
            };
            base + band
        });

        Self { cells }
    }

    pub fn cells(&self) -> &Array2<i8> {
        &self.cells
    }

    /// `(rows, cols)`
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Anchor cell `(col, row)` used when matching
    pub fn anchor(&self) -> (i32, i32) {
        let (rows, cols) = self.cells.dim();
        ((cols / 2) as i32, (rows / 2) as i32)
    }

    pub fn hit_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v == HIT).count()
    }

    pub fn miss_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v == MISS).count()
    }

    /// Whether the element has enough hit cells to be worth matching
    pub fn is_usable(&self) -> bool {
        self.hit_count() >= MIN_HIT_CELLS
    }

    /// Hit positions `(dx, dy)` relative to the anchor
    pub fn hit_offsets(&self) -> Vec<(i32, i32)> {
        self.offsets_of(HIT)
    }

    /// Miss positions `(dx, dy)` relative to the anchor
    pub fn miss_offsets(&self) -> Vec<(i32, i32)> {
        self.offsets_of(MISS)
    }

    fn offsets_of(&self, value: i8) -> Vec<(i32, i32)> {
        let (cx, cy) = self.anchor();
        self.cells
            .indexed_iter()
            .filter(|&(_, &v)| v == value)
            .map(|((row, col), _)| (col as i32 - cx, row as i32 - cy))
            .collect()
    }

    /// Rotate clockwise by `degrees` on a canvas grown to hold the whole
    /// rotated element. Cells are sampled bilinearly with a don't-care
    /// border and rounded back to `-1 / 0 / 1`.
    pub fn rotated(&self, degrees: f64) -> Self {
        let (h, w) = self.cells.dim();
        if h == 0 || w == 0 {
            return self.clone();
        }

        let theta = degrees.to_radians();
        let alpha = theta.cos();
        let beta = -theta.sin();

        let new_w = (h as f64 * beta.abs() + w as f64 * alpha.abs()) as usize;
        let new_h = (h as f64 * alpha.abs() + w as f64 * beta.abs()) as usize;

        // Pixel-centre coordinates: the centre of the element lands on the
        // centre of the new canvas
        let cx = (w as f64 - 1.0) / 2.0;
        let cy = (h as f64 - 1.0) / 2.0;
        let tx = (1.0 - alpha) * cx - beta * cy + ((new_w as f64 - 1.0) / 2.0 - cx);
        let ty = beta * cx + (1.0 - alpha) * cy + ((new_h as f64 - 1.0) / 2.0 - cy);

        let src = self.cells.mapv(f64::from);
        let sample = |x: i64, y: i64| -> f64 {
            if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
                0.0
            } else {
                src[[y as usize, x as usize]]
            }
        };

        let cells = Array2::from_shape_fn((new_h, new_w), |(row, col)| {
            // Inverse of the forward rotation [[a, b], [-b, a]]
            let u = col as f64 - tx;
            let v = row as f64 - ty;
            let sx = alpha * u - beta * v;
            let sy = beta * u + alpha * v;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let top = sample(x0, y0) * (1.0 - fx) + sample(x0 + 1, y0) * fx;
            let bottom = sample(x0, y0 + 1) * (1.0 - fx) + sample(x0 + 1, y0 + 1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            value.round_ties_even().clamp(-1.0, 1.0) as i8
        });

        Self { cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use ndarray::array;

    fn square_mask(size: u32, margin: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= margin && x < size - margin && y >= margin && y < size - margin;
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn assert_three_valued(se: &StructuringElement) {
        assert!(se.cells().iter().all(|v| [-1, 0, 1].contains(v)));
    }

    #[test]
    fn square_object_layers() {
        let morph = Morphology::default();
        // 20x20 canvas with a 12x12 square, core eroded by 2
        let se = StructuringElement::synthesize(&square_mask(20, 4), 0, 2, &morph);

        assert_eq!(se.dim(), (20, 20));
        assert_three_valued(&se);
        assert_eq!(se.hit_count(), 64);
        // Core at the centre, ring of don't-care, background outside
        assert_eq!(se.cells()[[10, 10]], HIT);
        assert_eq!(se.cells()[[4, 4]], DONT_CARE);
        assert_eq!(se.cells()[[0, 0]], MISS);
        assert_eq!(se.miss_count(), 400 - 144);
    }

    #[test]
    fn core_width_halves_until_enough_pixels_remain() {
        let morph = Morphology::default();
        // 6x6 square: erosion by 4 wipes it out, by 2 leaves 2x2, by 1 leaves 4x4
        let se = StructuringElement::synthesize(&square_mask(10, 2), 0, 4, &morph);
        assert_eq!(se.hit_count(), 16);
        assert!(se.is_usable());
    }

    #[test]
    fn tiny_object_falls_back_to_whole_object() {
        let morph = Morphology::default();
        // 2x2 object cannot keep 5 pixels under any erosion
        let se = StructuringElement::synthesize(&square_mask(6, 2), 0, 5, &morph);
        assert_three_valued(&se);
        assert_eq!(se.hit_count(), 4);
        assert_eq!(se.miss_count(), 32);
        assert!(!se.is_usable());
    }

    #[test]
    fn zero_dont_care_width_terminates() {
        let morph = Morphology::default();
        let se = StructuringElement::synthesize(&square_mask(6, 2), 0, 0, &morph);
        assert_eq!(se.hit_count(), 4);
    }

    #[test]
    fn offsets_shrink_and_grow_the_object() {
        let morph = Morphology::default();
        let obj = square_mask(20, 4);

        let grown = StructuringElement::synthesize(&obj, 2, 1, &morph);
        assert_eq!(grown.dim(), (24, 24));
        // 16x16 object, core eroded by 1
        assert_eq!(grown.hit_count(), 14 * 14);

        let shrunk = StructuringElement::synthesize(&obj, -2, 1, &morph);
        assert_eq!(shrunk.dim(), (16, 16));
        // 8x8 object, core eroded by 1
        assert_eq!(shrunk.hit_count(), 6 * 6);
        assert_three_valued(&shrunk);
    }

    #[test]
    fn offsets_are_relative_to_centre_anchor() {
        let se = StructuringElement::from_cells(array![[0, 1, 0], [-1, 1, -1], [0, 0, 0]]);
        assert_eq!(se.anchor(), (1, 1));
        assert_eq!(se.hit_offsets(), vec![(0, -1), (0, 0)]);
        assert_eq!(se.miss_offsets(), vec![(-1, 0), (1, 0)]);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let se = StructuringElement::synthesize(&square_mask(11, 3), 0, 1, &Morphology::default());
        assert_eq!(se.rotated(0.0), se);
    }

    #[test]
    fn quarter_turn_swaps_dimensions_and_is_clockwise() {
        // Hit cell in the top-right corner
        let mut cells = Array2::from_elem((3, 5), MISS);
        cells[[0, 4]] = HIT;
        let se = StructuringElement::from_cells(cells);

        let turned = se.rotated(90.0);
        assert_eq!(turned.dim(), (5, 3));
        assert_three_valued(&turned);
        // Clockwise: top-right moves to bottom-right
        assert_eq!(turned.cells()[[4, 2]], HIT);
        assert_eq!(turned.hit_count(), 1);
    }

    #[test]
    fn diagonal_rotation_grows_canvas() {
        let se = StructuringElement::from_cells(Array2::from_elem((10, 10), HIT));
        let turned = se.rotated(45.0);
        // 10 * (sin 45 + cos 45) = 14.14
        assert_eq!(turned.dim(), (14, 14));
        assert_three_valued(&turned);
        assert_eq!(turned.cells()[[7, 7]], HIT);
        assert_eq!(turned.cells()[[0, 0]], DONT_CARE);
    }
}
