use image::{GrayImage, RgbImage};

/// Integer pixel position, `x` to the right and `y` down
pub type Point = imageproc::point::Point<i32>;

/// Which input an image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Object1,
    Object2,
    Scene,
}

impl ImageRole {
    pub fn label(&self) -> &'static str {
        match self {
            ImageRole::Object1 => "object1",
            ImageRole::Object2 => "object2",
            ImageRole::Scene => "scene",
        }
    }
}

/// Reference object a scene contour was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    First,
    Second,
}

impl ObjectKind {
    /// Label colour used when annotating the scene
    pub fn label_color(&self) -> [u8; 3] {
        match self {
            ObjectKind::First => [53, 146, 196],
            ObjectKind::Second => [240, 167, 50],
        }
    }
}

/// One classified scene contour
#[derive(Debug, Clone)]
pub struct Detection {
    pub kind: ObjectKind,
    /// Running count of this kind at the time the contour was classified (1-based)
    pub index: usize,
    /// Centre of the minimal enclosing circle
    pub center: (f32, f32),
    pub contour: Vec<Point>,
}

/// Everything a detection run produces
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    /// Both reference objects as fitted to the working shape, stacked vertically
    pub objects_composite: RgbImage,
    /// Binarized reference objects, stacked
    pub binary_masks: GrayImage,
    /// Closed reference-object masks, stacked
    pub closed_masks: GrayImage,
    pub scene_binary: GrayImage,
    pub scene_closed: GrayImage,
    /// Clipped score map of the first object
    pub object1_hits: GrayImage,
    /// Clipped score map of the second object
    pub object2_hits: GrayImage,
    pub annotated_scene: RgbImage,
    pub first_count: usize,
    pub second_count: usize,
    pub detections: Vec<Detection>,
}

impl DetectionOutput {
    /// Summary line reported at the end of a run
    pub fn summary(&self) -> String {
        format!(
            "First Object Count: {},  Second Object Count: {}",
            self.first_count, self.second_count
        )
    }
}
