//! Plane geometry over bounding boxes
//!
//! Coordinates are CSS pixels with y growing downwards, so an angle of 90°
//! points below the origin. Angles are degrees in `[0, 360)`.

use slot_extractor::Direction;
use uifunnel_core_types::{BoundingBox, Point};

/// Euclidean distance between two points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Centre-to-centre distance.
pub fn center_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    distance(&a.center(), &b.center())
}

/// Angle of the vector `from -> to`.
pub fn angle_deg(from: &Point, to: &Point) -> f64 {
    normalize(((to.y - from.y).atan2(to.x - from.x)).to_degrees())
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let diff = normalize(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Fraction of the smaller box covered by the intersection of both.
pub fn overlap_ratio(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let smaller = a.area().min(b.area());
    if smaller <= 0.0 {
        return 0.0;
    }
    (a.intersection_area(b) / smaller).clamp(0.0, 1.0)
}

/// Quadrant of an angle: `[-45, 45)` right, `[45, 135)` below,
/// `[135, 225)` left, otherwise above.
pub fn main_direction(angle: f64) -> Direction {
    let angle = normalize(angle);
    if !(45.0..315.0).contains(&angle) {
        Direction::Right
    } else if angle < 135.0 {
        Direction::Below
    } else if angle < 225.0 {
        Direction::Left
    } else {
        Direction::Above
    }
}

/// Whether `angle` points in `direction`. Directions without a canonical
/// angle accept every angle.
pub fn within_direction(angle: f64, direction: Direction, tolerance: f64) -> bool {
    match direction.canonical_angle() {
        Some(canonical) => angle_diff(angle, canonical) <= tolerance,
        None => true,
    }
}

/// Centres line up on the axis perpendicular to `axis`: within half of the
/// larger extent of the two boxes along that axis.
pub fn is_aligned(anchor: &BoundingBox, candidate: &BoundingBox, axis: Direction) -> bool {
    let (a, c) = (anchor.center(), candidate.center());
    match axis {
        Direction::Left | Direction::Right => {
            (a.y - c.y).abs() <= 0.5 * anchor.height.max(candidate.height)
        }
        Direction::Above | Direction::Below => {
            (a.x - c.x).abs() <= 0.5 * anchor.width.max(candidate.width)
        }
        _ => false,
    }
}

fn normalize(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
