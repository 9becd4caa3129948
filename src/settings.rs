//! Run configuration for the detection pipeline.
//!
//! A `Settings` value is built once (defaults, a settings file, CLI overrides)
//! and then passed by reference to every stage of a run.

use std::path::Path;

use anyhow::Context;

use crate::error::DetectError;

pub const SETTINGS_FILE_NAME: &str = "settings.txt";

/// Shape of the all-ones mask used for scene morphology, in rows x cols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskShape {
    pub rows: u32,
    pub cols: u32,
}

impl MaskShape {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }
}

impl Default for MaskShape {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Exponent of the contrast lookup table. Values above 1 lighten the image.
    pub gamma_correction: f64,
    /// Median blur aperture (odd)
    pub blur_kernel_size: u32,
    /// Binarize gradient magnitude instead of raw brightness
    pub use_gradient_edge_detector: bool,
    /// Binarization cutoff
    pub threshold1: u8,
    /// Value written for foreground pixels when binarizing
    pub threshold2: u8,
    /// Objects are darker than the background (inverts binarization without gradients)
    pub bright_background: bool,
    pub morph_close_iterations: u32,
    pub morph_open_iterations: u32,
    /// Number of growing offsets tried per object
    pub morph_dilate_iterations: u32,
    /// Number of shrinking offsets tried per object
    pub morph_erode_iterations: u32,
    /// Initial erosion width used to find the stable core of an object
    pub dont_care_width: u32,
    /// Outline colour of classified contours (RGB, written to file blue first)
    pub mark_color: [u8; 3],
    pub mark_thickness: u32,
    /// Working resolution as (width, height)
    pub image_shape: (u32, u32),
    pub mask_shape: MaskShape,
    /// Rotation sweep step in degrees
    pub rotation_step_degrees: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gamma_correction: 1.3,
            blur_kernel_size: 13,
            use_gradient_edge_detector: false,
            threshold1: 92,
            threshold2: 255,
            bright_background: false,
            morph_close_iterations: 8,
            morph_open_iterations: 2,
            morph_dilate_iterations: 6,
            morph_erode_iterations: 4,
            dont_care_width: 5,
            mark_color: [0, 255, 0],
            mark_thickness: 2,
            image_shape: (400, 400),
            mask_shape: MaskShape::default(),
            rotation_step_degrees: 3,
        }
    }
}

impl Settings {
    /// Whether binarization maps bright pixels to background
    pub fn inverts_threshold(&self) -> bool {
        self.bright_background && !self.use_gradient_edge_detector
    }

    /// Whether reference objects get an opening pass before closing
    pub fn opens_objects(&self) -> bool {
        !self.use_gradient_edge_detector && !self.bright_background
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DetectError> {
        let fail = |msg: String| Err(DetectError::ConfigOutOfRange(msg));

        if !self.gamma_correction.is_finite() || self.gamma_correction <= 0.0 {
            return fail(format!("gamma must be positive, got {}", self.gamma_correction));
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return fail(format!(
                "blur kernel size must be odd, got {}",
                self.blur_kernel_size
            ));
        }
        if self.rotation_step_degrees == 0 || self.rotation_step_degrees > 360 {
            return fail(format!(
                "rotation step must be within 1..=360 degrees, got {}",
                self.rotation_step_degrees
            ));
        }
        let MaskShape { rows, cols } = self.mask_shape;
        if rows == 0 || cols == 0 || rows > 255 || cols > 255 {
            return fail(format!("mask shape must be within 1..=255, got ({rows}, {cols})"));
        }
        let (width, height) = self.image_shape;
        if width < 3 || height < 3 {
            return fail(format!(
                "image shape must be at least 3x3, got ({width}, {height})"
            ));
        }
        if self.mark_thickness == 0 {
            return fail("mark thickness must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load settings from `path`.
    ///
    /// A missing file gives the defaults. If a line cannot be parsed, the
    /// fields before it keep the values read from the file, the remaining
    /// ones stay at their defaults, and a warning is logged.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut settings = Self::default();
        if !path.is_file() {
            return settings;
        }

        log::info!("Loading settings from file: {}", path.display());
        match std::fs::read_to_string(path) {
            Ok(text) => {
                if let Err(e) = settings.read_lines(&text) {
                    log::warn!(
                        "Error has occurred while reading settings file {}. File has to be overridden. Error: {:#}",
                        path.display(),
                        e
                    );
                }
            }
            Err(e) => log::warn!("Failed to read settings file {}: {}", path.display(), e),
        }
        settings
    }

    /// Store settings, one value per line
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), DetectError> {
        let path = path.as_ref();
        log::info!("Storing settings to file: {}", path.display());
        std::fs::write(path, self.to_lines())?;
        Ok(())
    }

    /// Textual form written by [`Settings::save_to`]
    pub fn to_lines(&self) -> String {
        let [r, g, b] = self.mark_color;
        let lines = [
            format!("{:?}", self.gamma_correction),
            self.blur_kernel_size.to_string(),
            py_bool(self.use_gradient_edge_detector).to_string(),
            self.threshold1.to_string(),
            self.threshold2.to_string(),
            py_bool(self.bright_background).to_string(),
            self.morph_close_iterations.to_string(),
            self.morph_open_iterations.to_string(),
            self.morph_dilate_iterations.to_string(),
            self.morph_erode_iterations.to_string(),
            self.dont_care_width.to_string(),
            format!("({b}, {g}, {r})"),
            self.mark_thickness.to_string(),
            format!("({}, {})", self.image_shape.0, self.image_shape.1),
            format!("({}, {})", self.mask_shape.rows, self.mask_shape.cols),
            self.rotation_step_degrees.to_string(),
        ];
        lines.join("\n")
    }

    fn read_lines(&mut self, text: &str) -> anyhow::Result<()> {
        let mut lines = text.lines().map(str::trim);
        let mut next = |field: &str| {
            lines
                .next()
                .with_context(|| format!("missing line for {field}"))
        };

        self.gamma_correction = next("gamma")?.parse().context("gamma")?;
        self.blur_kernel_size = next("blur kernel size")?.parse().context("blur kernel size")?;
        self.use_gradient_edge_detector = next("gradient flag")? == "True";
        self.threshold1 = next("threshold1")?.parse().context("threshold1")?;
        self.threshold2 = next("threshold2")?.parse().context("threshold2")?;
        self.bright_background = next("bright background flag")? == "True";
        self.morph_close_iterations = next("close iterations")?.parse().context("close iterations")?;
        self.morph_open_iterations = next("open iterations")?.parse().context("open iterations")?;
        self.morph_dilate_iterations = next("dilate iterations")?.parse().context("dilate iterations")?;
        self.morph_erode_iterations = next("erode iterations")?.parse().context("erode iterations")?;
        self.dont_care_width = next("don't care width")?.parse().context("don't care width")?;

        // Stored blue first
        let [b, g, r] = parse_tuple::<3>(next("mark color")?).context("mark color")?;
        self.mark_color = [to_u8(r)?, to_u8(g)?, to_u8(b)?];

        self.mark_thickness = next("mark thickness")?.parse().context("mark thickness")?;

        let [width, height] = parse_tuple::<2>(next("image shape")?).context("image shape")?;
        self.image_shape = (width, height);

        let [rows, cols] = parse_tuple::<2>(next("mask shape")?).context("mask shape")?;
        self.mask_shape = MaskShape::new(rows, cols);

        self.rotation_step_degrees = next("rotation step")?.parse().context("rotation step")?;
        Ok(())
    }
}

fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn to_u8(value: u32) -> anyhow::Result<u8> {
    u8::try_from(value).with_context(|| format!("colour component {value} exceeds 255"))
}

/// Parse a literal tuple such as `(400, 400)`
fn parse_tuple<const N: usize>(text: &str) -> anyhow::Result<[u32; N]> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .with_context(|| format!("expected a tuple, got {text:?}"))?;

    let values = inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()?;

    values
        .try_into()
        .map_err(|v: Vec<u32>| anyhow::anyhow!("expected {} values, got {}", N, v.len()))
}
