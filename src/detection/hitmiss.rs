//! Hit-or-miss matching of structuring elements against the closed scene,
//! swept over object scale and rotation.

use image::{GrayImage, Luma};
use rayon::prelude::*;

use super::morphology::Morphology;
use super::structuring::StructuringElement;
use crate::report::Reporter;
use crate::settings::Settings;

/// Share of the overall run progress covered by the sweep
pub const SWEEP_PROGRESS_SHARE: f64 = 92.0;

/// Match map of one element: 1 where the element fits the scene, 0 elsewhere.
///
/// The element's anchor cell is placed on each scene pixel. Hit cells need a
/// non-zero scene pixel, miss cells a zero one. Cells falling outside the
/// scene are ignored.
pub fn hit_or_miss(scene: &GrayImage, element: &StructuringElement) -> GrayImage {
    let (width, height) = scene.dimensions();
    let mut out = GrayImage::new(width, height);
    if width == 0 || height == 0 || element.is_empty() {
        return out;
    }

    let hits = element.hit_offsets();
    let misses = element.miss_offsets();
    let (w, h) = (width as i32, height as i32);
    let pixels = scene.as_raw();
    let foreground = |x: i32, y: i32| -> Option<bool> {
        if x < 0 || y < 0 || x >= w || y >= h {
            None
        } else {
            Some(pixels[(y * w + x) as usize] != 0)
        }
    };

    out.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i32;
            for (x, cell) in row.iter_mut().enumerate() {
                let x = x as i32;
                let fits = hits
                    .iter()
                    .all(|&(dx, dy)| foreground(x + dx, y + dy) != Some(false))
                    && misses
                        .iter()
                        .all(|&(dx, dy)| foreground(x + dx, y + dy) != Some(true));
                *cell = u8::from(fits);
            }
        });

    out
}

/// Per-object match counts accumulated over every scale and rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMap {
    width: u32,
    height: u32,
    scores: Vec<u32>,
}

impl ScoreMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scores: vec![0; (width as usize) * (height as usize)],
        }
    }

    /// Add a 0/1 match map of the same size
    pub fn add(&mut self, matches: &GrayImage) {
        for (score, m) in self.scores.iter_mut().zip(matches.as_raw()) {
            *score = score.saturating_add(u32::from(*m));
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.scores[(y * self.width + x) as usize]
    }

    pub fn total(&self) -> u64 {
        self.scores.iter().map(|&s| u64::from(s)).sum()
    }

    /// Scores clipped to 255
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([self.get(x, y).min(255) as u8])
        })
    }
}

/// Offsets tried for each object: `0, -1, ..` for the erode count, then
/// `0, 1, ..` for the dilate count
pub fn scale_offsets(settings: &Settings) -> Vec<i32> {
    let shrinking = (0..settings.morph_erode_iterations as i32).map(|i| -i);
    let growing = 0..settings.morph_dilate_iterations as i32;
    shrinking.chain(growing).collect()
}

/// Rotation angles in degrees, from 0 up to but excluding 360
pub fn rotation_angles(settings: &Settings) -> Vec<u32> {
    let step = settings.rotation_step_degrees.max(1) as usize;
    (0..360).step_by(step).collect()
}

/// Score maps of both reference objects against the closed scene.
///
/// Progress advances once per rotation step and ends at
/// [`SWEEP_PROGRESS_SHARE`]; both objects are matched at each step.
pub fn sweep(
    scene: &GrayImage,
    object1: &GrayImage,
    object2: &GrayImage,
    settings: &Settings,
    morph: &Morphology,
    reporter: &Reporter,
) -> (ScoreMap, ScoreMap) {
    reporter.status("Running Hit & Miss to detect objects in image...");

    let (width, height) = scene.dimensions();
    let mut first = ScoreMap::new(width, height);
    let mut second = ScoreMap::new(width, height);

    let offsets = scale_offsets(settings);
    let angles = rotation_angles(settings);
    let total_steps = (offsets.len() * angles.len()).max(1) as f64;
    let progress_step = SWEEP_PROGRESS_SHARE / total_steps;
    let mut progress = 0.0;
    reporter.progress(progress);

    for offset in offsets {
        let element1 =
            StructuringElement::synthesize(object1, offset, settings.dont_care_width, morph);
        let element2 =
            StructuringElement::synthesize(object2, offset, settings.dont_care_width, morph);
        log::debug!(
            "Offset {}: element 1 {:?} with {} hits, element 2 {:?} with {} hits",
            offset,
            element1.dim(),
            element1.hit_count(),
            element2.dim(),
            element2.hit_count()
        );

        let use1 = element1.is_usable();
        let use2 = element2.is_usable();
        if !use1 || !use2 {
            log::debug!(
                "Skipping degenerate element(s) at offset {} (object 1: {}, object 2: {})",
                offset,
                use1,
                use2
            );
        }

        for &angle in &angles {
            let (matches1, matches2) = rayon::join(
                || use1.then(|| hit_or_miss(scene, &element1.rotated(f64::from(angle)))),
                || use2.then(|| hit_or_miss(scene, &element2.rotated(f64::from(angle)))),
            );
            if let Some(m) = matches1 {
                first.add(&m);
            }
            if let Some(m) = matches2 {
                second.add(&m);
            }

            progress += progress_step;
            reporter.progress(progress);
        }
    }

    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scene_with_square(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn exact_fit_matches_only_at_anchor() {
        // 3x3 square must be surrounded by background
        let mut cells = ndarray::Array2::from_elem((5, 5), -1i8);
        cells.slice_mut(ndarray::s![1..4, 1..4]).fill(1);
        let element = StructuringElement::from_cells(cells);

        let scene = scene_with_square(12, 4, 5, 3);
        let matches = hit_or_miss(&scene, &element);

        let found: Vec<(u32, u32)> = matches
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 1)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(found, vec![(5, 6)]);
    }

    #[test]
    fn miss_cells_reject_larger_shapes() {
        let mut cells = ndarray::Array2::from_elem((5, 5), -1i8);
        cells.slice_mut(ndarray::s![1..4, 1..4]).fill(1);
        let element = StructuringElement::from_cells(cells);

        let scene = scene_with_square(12, 3, 3, 5);
        assert!(hit_or_miss(&scene, &element).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn cells_outside_scene_are_ignored() {
        let element = StructuringElement::from_cells(array![[-1, -1, -1], [-1, 1, -1], [-1, -1, -1]]);
        let mut scene = GrayImage::new(4, 4);
        scene.put_pixel(0, 0, Luma([255]));

        let matches = hit_or_miss(&scene, &element);
        assert_eq!(matches.get_pixel(0, 0)[0], 1);
        assert_eq!(matches.pixels().filter(|p| p[0] == 1).count(), 1);
    }

    #[test]
    fn score_map_saturates_at_255_when_clipped() {
        let mut scores = ScoreMap::new(2, 1);
        let ones = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 1 } else { 0 }]));
        for _ in 0..300 {
            scores.add(&ones);
        }
        assert_eq!(scores.get(0, 0), 300);
        let img = scores.to_image();
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn offsets_and_angles_follow_settings() {
        let settings = Settings {
            morph_erode_iterations: 3,
            morph_dilate_iterations: 2,
            rotation_step_degrees: 100,
            ..Settings::default()
        };
        assert_eq!(scale_offsets(&settings), vec![0, -1, -2, 0, 1]);
        assert_eq!(rotation_angles(&settings), vec![0, 100, 200, 300]);
    }

    #[test]
    fn sweep_progress_is_monotonic_and_ends_at_share() {
        use std::sync::{Arc, Mutex};

        let settings = Settings {
            morph_erode_iterations: 1,
            morph_dilate_iterations: 1,
            rotation_step_degrees: 90,
            dont_care_width: 1,
            ..Settings::default()
        };
        let object = scene_with_square(12, 2, 2, 8);
        let scene = scene_with_square(40, 10, 10, 8);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = Reporter::new(|_| {}, move |p| sink.lock().unwrap().push(p));

        let (first, _) = sweep(&scene, &object, &object, &settings, &Morphology::default(), &reporter);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1 + 2 * 4);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen[seen.len() - 1] - SWEEP_PROGRESS_SHARE).abs() < 1e-9);
        assert!(first.total() > 0);
    }
}
