use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{convex_hull, oriented_contour_area};

use super::morphology::Morphology;
use crate::models::Point;

/// Scene contours with fewer boundary points are never classified
pub const MIN_CONTOUR_POINTS: usize = 5;

/// Polygons with a smaller absolute area have no usable centroid
const MIN_AREA: f64 = 1e-9;

/// Dilations applied to a score map before its blobs are located
const LOCATION_DILATIONS: u32 = 2;

/// Outermost outer borders of the foreground regions of a binary image
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<Point>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Raw polygon moments `(m00, m10, m01)` of a closed contour
pub fn polygon_moments(contour: &[Point]) -> (f64, f64, f64) {
    let m00 = oriented_contour_area(contour);
    let (mut m10, mut m01) = (0.0, 0.0);
    for (a, b) in contour.iter().zip(contour.iter().cycle().skip(1)) {
        let (xa, ya, xb, yb) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
        let cross = xa * yb - xb * ya;
        m10 += (xa + xb) * cross;
        m01 += (ya + yb) * cross;
    }
    (m00, m10 / 6.0, m01 / 6.0)
}

/// Centroid of a contour, truncated to integers. `None` for degenerate
/// (zero-area) contours.
pub fn centroid(contour: &[Point]) -> Option<Point> {
    let (m00, m10, m01) = polygon_moments(contour);
    if m00.abs() < MIN_AREA {
        return None;
    }
    Some(Point::new((m10 / m00) as i32, (m01 / m00) as i32))
}

/// One point per blob of a score map: the map is dilated twice to merge
/// nearby matches, then each outer contour is reduced to its centroid.
pub fn locations(scores: &GrayImage, morph: &Morphology) -> Vec<Point> {
    let dilated = morph.dilate(scores, LOCATION_DILATIONS);
    let contours = external_contours(&dilated);
    let total = contours.len();
    let points: Vec<Point> = contours.iter().filter_map(|c| centroid(c)).collect();
    if points.len() < total {
        log::debug!(
            "Discarded {} degenerate location contour(s)",
            total - points.len()
        );
    }
    points
}

/// Which side of a closed polygon a point lies on: `1` inside, `0` on an
/// edge or vertex, `-1` outside
pub fn point_polygon_test(contour: &[Point], p: Point) -> i32 {
    let n = contour.len();
    if n == 0 {
        return -1;
    }

    let (px, py) = (p.x as i64, p.y as i64);
    let mut inside = false;
    for i in 0..n {
        let a = contour[i];
        let b = contour[(i + 1) % n];
        let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);

        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        let within_x = px >= ax.min(bx) && px <= ax.max(bx);
        let within_y = py >= ay.min(by) && py <= ay.max(by);
        if cross == 0 && within_x && within_y {
            return 0;
        }

        // Crossing test on a ray towards +x, half-open in y
        if (ay > py) != (by > py) {
            let t = (py - ay) as f64 / (by - ay) as f64;
            let x_at = ax as f64 + t * (bx - ax) as f64;
            if (px as f64) < x_at {
                inside = !inside;
            }
        }
    }

    if inside { 1 } else { -1 }
}

/// Smallest circle containing every point, as `((cx, cy), radius)`
pub fn min_enclosing_circle(points: &[Point]) -> ((f32, f32), f32) {
    let hull: Vec<(f64, f64)> = convex_hull(points)
        .into_iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect();

    let Some(&first) = hull.first() else {
        return ((0.0, 0.0), 0.0);
    };

    let mut circle = (first, 0.0);
    for i in 1..hull.len() {
        if contains(circle, hull[i]) {
            continue;
        }
        circle = (hull[i], 0.0);
        for j in 0..i {
            if contains(circle, hull[j]) {
                continue;
            }
            circle = circle_from_two(hull[i], hull[j]);
            for k in 0..j {
                if !contains(circle, hull[k]) {
                    circle = circle_from_three(hull[i], hull[j], hull[k]);
                }
            }
        }
    }

    let ((cx, cy), r) = circle;
    ((cx as f32, cy as f32), r as f32)
}

type Circle = ((f64, f64), f64);

fn contains(((cx, cy), r): Circle, (x, y): (f64, f64)) -> bool {
    (x - cx).hypot(y - cy) <= r + 1e-7
}

fn circle_from_two(a: (f64, f64), b: (f64, f64)) -> Circle {
    let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    (center, (a.0 - b.0).hypot(a.1 - b.1) / 2.0)
}

fn circle_from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Circle {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        // Collinear: the widest pair spans the circle
        let candidates = [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)];
        return candidates
            .into_iter()
            .fold(((0.0, 0.0), -1.0), |best, c| if c.1 > best.1 { c } else { best });
    }

    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;
    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
    ((ux, uy), (a.0 - ux).hypot(a.1 - uy))
}
