// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fitting hulls to the per-hull vertex limit

use parry3d::math::Point;
use tracing::debug;

/// Hull vertices and triangles as produced by `parry3d::transformation::convex_hull`
pub(crate) type HullGeometry = (Vec<Point<f32>>, Vec<[u32; 3]>);

/// Convex hull of `points` with at most `limit` vertices.
///
/// When the exact hull is wider than `limit`, the `limit` most spread-out hull
/// vertices are kept by farthest point sampling and hulled again. `None` when
/// the points (or the kept subset) span no volume.
pub(crate) fn limited_hull(points: &[Point<f32>], limit: usize) -> Option<HullGeometry> {
    if limit < 4 || !spans_volume(points) {
        return None;
    }
    let (vertices, triangles) = parry3d::transformation::convex_hull(points);
    if vertices.len() <= limit {
        return (!triangles.is_empty()).then_some((vertices, triangles));
    }

    let kept = farthest_point_sample(&vertices, limit);
    debug!(exact = vertices.len(), kept = kept.len(), "reducing hull to vertex limit");
    if !spans_volume(&kept) {
        return None;
    }
    let (vertices, triangles) = parry3d::transformation::convex_hull(&kept);
    (vertices.len() <= limit && !triangles.is_empty()).then_some((vertices, triangles))
}

/// Trim a hull that already came out of an engine, re-hulling only when needed
pub(crate) fn fit_hull(
    vertices: Vec<Point<f32>>,
    triangles: Vec<[u32; 3]>,
    limit: usize,
) -> Option<HullGeometry> {
    if vertices.len() <= limit {
        return (!triangles.is_empty()).then_some((vertices, triangles));
    }
    limited_hull(&vertices, limit)
}

/// Greedy max-min selection of `count` points, seeded with the point farthest
/// from the centroid.
fn farthest_point_sample(points: &[Point<f32>], count: usize) -> Vec<Point<f32>> {
    if points.len() <= count {
        return points.to_vec();
    }
    let centroid = points
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords)
        / points.len() as f32;

    let mut nearest: Vec<f32> = points
        .iter()
        .map(|p| (p.coords - centroid).norm_squared())
        .collect();
    let mut kept = Vec::with_capacity(count);

    while kept.len() < count {
        let Some((best, _)) = nearest
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            break;
        };
        let chosen = points[best];
        kept.push(chosen);
        for (slot, p) in nearest.iter_mut().zip(points) {
            *slot = slot.min((p - chosen).norm_squared());
        }
        // chosen point is now at distance zero and never picked again
        nearest[best] = f32::NEG_INFINITY;
    }
    kept
}

/// True when the points are not all on one plane
pub(crate) fn spans_volume(points: &[Point<f32>]) -> bool {
    let Some(&p0) = points.first() else {
        return false;
    };
    let farthest = |score: &dyn Fn(&Point<f32>) -> f32| {
        points
            .iter()
            .copied()
            .max_by(|a, b| score(a).total_cmp(&score(b)))
            .unwrap_or(p0)
    };

    let p1 = farthest(&|p| (p - p0).norm_squared());
    let axis = p1 - p0;
    let scale = axis.norm();
    if scale <= f32::EPSILON {
        return false;
    }
    let p2 = farthest(&|p| axis.cross(&(p - p0)).norm_squared());
    let normal = axis.cross(&(p2 - p0));
    if normal.norm() <= 1.0e-6 * scale * scale {
        return false;
    }
    let normal = normal.normalize();
    let height = points
        .iter()
        .map(|p| normal.dot(&(p - p0)).abs())
        .fold(0.0f32, f32::max);
    height > 1.0e-6 * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    fn sphere_points() -> Vec<Point<f32>> {
        Primitive::sphere(1.0, 24)
            .to_mesh()
            .positions
            .iter()
            .map(|p| Point::new(p.x, p.y, p.z))
            .collect()
    }

    #[test]
    fn test_sphere_is_reduced_to_limit() {
        let points = sphere_points();
        assert!(points.len() > 64);

        for limit in [4, 8, 64] {
            let (vertices, triangles) = limited_hull(&points, limit).unwrap();
            assert!(vertices.len() <= limit, "{} > {limit}", vertices.len());
            assert!(vertices.len() >= 4);
            assert!(triangles
                .iter()
                .flatten()
                .all(|&i| (i as usize) < vertices.len()));
        }
    }

    #[test]
    fn test_small_hull_is_exact() {
        let cube: Vec<Point<f32>> = Primitive::cube(nalgebra::Vector3::new(1.0, 1.0, 1.0), false)
            .to_mesh()
            .positions
            .iter()
            .map(|p| Point::new(p.x, p.y, p.z))
            .collect();
        let (vertices, triangles) = limited_hull(&cube, 64).unwrap();
        assert_eq!(vertices.len(), 8);
        assert_eq!(triangles.len(), 12);
    }

    #[test]
    fn test_fit_hull_only_rehulls_wide_input() {
        let points = sphere_points();
        let (vertices, triangles) = parry3d::transformation::convex_hull(&points);
        assert!(vertices.len() > 32);

        let (narrow, _) = fit_hull(vertices.clone(), triangles.clone(), 32).unwrap();
        assert!(narrow.len() <= 32);

        let (same, same_triangles) = fit_hull(vertices.clone(), triangles.clone(), 1024).unwrap();
        assert_eq!(same, vertices);
        assert_eq!(same_triangles, triangles);
    }

    #[test]
    fn test_sampling_spreads_points() {
        let points = sphere_points();
        let kept = farthest_point_sample(&points, 6);
        assert_eq!(kept.len(), 6);
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                assert!((a - b).norm() > 0.5);
            }
        }
    }

    #[test]
    fn test_flat_points_have_no_hull() {
        let points = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
        ];
        assert!(!spans_volume(&points));
        assert!(limited_hull(&points, 64).is_none());
    }
}
