use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use morphdetect::Settings;

/// Axis-aligned filled rectangle `(x, y, width, height)`
pub type Rect = (u32, u32, u32, u32);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Black grayscale canvas with white rectangles
pub fn mask(width: u32, height: u32, rects: &[Rect]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = rects
            .iter()
            .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Colour version of [`mask`]: `fg` rectangles on a `bg` background
pub fn rgb_scene(width: u32, height: u32, rects: &[Rect], fg: [u8; 3], bg: [u8; 3]) -> DynamicImage {
    let m = mask(width, height, rects);
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if m.get_pixel(x, y)[0] > 0 { Rgb(fg) } else { Rgb(bg) }
    }))
}

/// 50x50 reference object: a 40x40 square with a 5 px background margin
pub fn square_object() -> DynamicImage {
    rgb_scene(50, 50, &[(5, 5, 40, 40)], [230, 230, 230], [10, 10, 10])
}

/// 20x40 reference object: a 10x30 bar with a 5 px background margin
pub fn bar_object() -> DynamicImage {
    rgb_scene(20, 40, &[(5, 5, 10, 30)], [230, 230, 230], [10, 10, 10])
}

/// Square placements used by [`two_squares_one_bar_scene`]
pub const SQUARES: [Rect; 2] = [(60, 60, 40, 40), (250, 200, 40, 40)];
pub const BAR: Rect = (300, 80, 10, 30);

/// 400x400 scene with two copies of [`square_object`] and one of [`bar_object`]
pub fn two_squares_one_bar_scene() -> DynamicImage {
    rgb_scene(
        400,
        400,
        &[SQUARES[0], SQUARES[1], BAR],
        [230, 230, 230],
        [10, 10, 10],
    )
}

/// Settings small enough for a quick end-to-end run on the fixtures
pub fn quick_settings() -> Settings {
    Settings {
        gamma_correction: 1.0,
        blur_kernel_size: 1,
        threshold1: 127,
        threshold2: 255,
        morph_close_iterations: 1,
        morph_open_iterations: 1,
        morph_erode_iterations: 1,
        morph_dilate_iterations: 1,
        dont_care_width: 2,
        rotation_step_degrees: 90,
        ..Settings::default()
    }
}
