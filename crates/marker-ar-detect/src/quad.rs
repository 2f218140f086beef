//! Reduce a traced contour to a convex quadrilateral.

use nalgebra::Point2;

/// Four corners in image coordinates, clockwise, starting at the corner
/// nearest the top-left.
#[derive(Clone, Copy, Debug)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

/// Maximum distance (px) any contour point may sit from its quad edge.
const FIT_TOLERANCE: f32 = 2.5;
/// Shortest admissible quad edge (px).
const MIN_EDGE_LEN: f32 = 8.0;

/// Fit a quad to a closed contour, or reject the contour as non-square.
pub fn fit_quad(contour: &[(i32, i32)]) -> Option<Quad> {
    if contour.len() < 16 {
        return None;
    }

    // Farthest point pair seeds the two opposite corners.
    let a = farthest_from(contour, contour[0])?;
    let b = farthest_from(contour, contour[a])?;

    // The remaining two corners are the maximum-deviation points of the two
    // chains between them.
    let c = max_deviation_between(contour, a, b)?;
    let d = max_deviation_between(contour, b, a)?;

    let mut order = [a, c, b, d];
    order.sort_unstable();
    let corners_i = order.map(|i| contour[i]);
    let corners = corners_i.map(|(x, y)| Point2::new(x as f32, y as f32));

    if !is_convex(&corners) {
        return None;
    }
    for i in 0..4 {
        let e = corners[(i + 1) % 4] - corners[i];
        if e.norm() < MIN_EDGE_LEN {
            return None;
        }
    }
    if !contour_fits(contour, &order, &corners) {
        return None;
    }

    Some(Quad {
        corners: orient_clockwise(corners),
    })
}

fn farthest_from(contour: &[(i32, i32)], from: (i32, i32)) -> Option<usize> {
    let mut best = None;
    let mut best_d = -1i64;
    for (i, &(x, y)) in contour.iter().enumerate() {
        let dx = (x - from.0) as i64;
        let dy = (y - from.1) as i64;
        let d = dx * dx + dy * dy;
        if d > best_d {
            best_d = d;
            best = Some(i);
        }
    }
    best
}

/// Index of the contour point between `from` and `to` (walking forward,
/// wrapping) with the largest perpendicular distance to the chord.
fn max_deviation_between(contour: &[(i32, i32)], from: usize, to: usize) -> Option<usize> {
    let n = contour.len();
    let (x0, y0) = contour[from];
    let (x1, y1) = contour[to];
    let ex = (x1 - x0) as f32;
    let ey = (y1 - y0) as f32;
    let len = (ex * ex + ey * ey).sqrt();
    if len < 1.0 {
        return None;
    }

    let mut best = None;
    let mut best_d = 0.0f32;
    let mut i = (from + 1) % n;
    while i != to {
        let (x, y) = contour[i];
        let d = ((x - x0) as f32 * ey - (y - y0) as f32 * ex).abs() / len;
        if d > best_d {
            best_d = d;
            best = Some(i);
        }
        i = (i + 1) % n;
    }

    // A genuine corner sits well off the diagonal.
    if best_d < 2.0 {
        return None;
    }
    best
}

fn is_convex(corners: &[Point2<f32>; 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Every contour point must lie within tolerance of the edge its chain
/// belongs to.
fn contour_fits(contour: &[(i32, i32)], order: &[usize; 4], corners: &[Point2<f32>; 4]) -> bool {
    let n = contour.len();
    for k in 0..4 {
        let from = order[k];
        let to = order[(k + 1) % 4];
        let a = corners[k];
        let b = corners[(k + 1) % 4];
        let e = b - a;
        let len = e.norm();
        if len < 1.0 {
            return false;
        }
        let mut i = (from + 1) % n;
        while i != to {
            let (x, y) = contour[i];
            let d = ((x as f32 - a.x) * e.y - (y as f32 - a.y) * e.x).abs() / len;
            if d > FIT_TOLERANCE {
                return false;
            }
            i = (i + 1) % n;
        }
    }
    true
}

/// Clockwise order in image coordinates (y down), starting at the corner
/// with the smallest x + y.
fn orient_clockwise(mut corners: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let mut signed_area = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        signed_area += a.x * b.y - b.x * a.y;
    }
    // Negative shoelace sum means counter-clockwise with y down.
    if signed_area < 0.0 {
        corners.swap(1, 3);
    }

    let start = (0..4)
        .min_by(|&i, &j| {
            let si = corners[i].x + corners[i].y;
            let sj = corners[j].x + corners[j].y;
            si.partial_cmp(&sj).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    [
        corners[start],
        corners[(start + 1) % 4],
        corners[(start + 2) % 4],
        corners[(start + 3) % 4],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{label_regions, trace_contour};
    use crate::threshold::BinaryImage;

    fn filled_square_mask(size: usize, x0: usize, y0: usize, side: usize) -> BinaryImage {
        let mut data = vec![false; size * size];
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                data[y * size + x] = true;
            }
        }
        BinaryImage {
            width: size,
            height: size,
            data,
        }
    }

    #[test]
    fn fits_axis_aligned_square() {
        let mask = filled_square_mask(64, 10, 14, 20);
        let regions = label_regions(&mask);
        let contour = trace_contour(&mask, regions[0].seed);
        let quad = fit_quad(&contour).expect("square fits a quad");

        assert_eq!(quad.corners[0], Point2::new(10.0, 14.0));
        assert_eq!(quad.corners[1], Point2::new(29.0, 14.0));
        assert_eq!(quad.corners[2], Point2::new(29.0, 33.0));
        assert_eq!(quad.corners[3], Point2::new(10.0, 33.0));
    }

    #[test]
    fn short_contour_is_rejected() {
        assert!(fit_quad(&[(0, 0), (1, 0), (1, 1)]).is_none());
    }

    #[test]
    fn thin_line_is_rejected() {
        let mut data = vec![false; 64 * 64];
        for x in 5..40 {
            data[10 * 64 + x] = true;
            data[11 * 64 + x] = true;
        }
        let mask = BinaryImage {
            width: 64,
            height: 64,
            data,
        };
        let regions = label_regions(&mask);
        let contour = trace_contour(&mask, regions[0].seed);
        assert!(fit_quad(&contour).is_none());
    }

    #[test]
    fn clockwise_orientation_and_top_left_start() {
        let mask = filled_square_mask(64, 20, 20, 16);
        let regions = label_regions(&mask);
        let contour = trace_contour(&mask, regions[0].seed);
        let quad = fit_quad(&contour).expect("fit");

        // Start corner minimises x + y; successor is to the right (clockwise
        // with y down).
        let s0 = quad.corners[0].x + quad.corners[0].y;
        for c in &quad.corners[1..] {
            assert!(c.x + c.y >= s0);
        }
        assert!(quad.corners[1].x > quad.corners[0].x);
        assert!(quad.corners[2].y > quad.corners[1].y);
    }
}
