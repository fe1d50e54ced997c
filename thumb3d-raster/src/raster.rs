/// Triangle coverage in screen space

/// Screen-space vertex: x, y in samples, z in normalized device depth
pub(crate) type ScreenVertex = (f32, f32, f32);

/// Visit every sample center covered by a triangle, passing the sample
/// coordinates and barycentric weights.
pub(crate) fn rasterize_triangle<F>(coords: &[ScreenVertex; 3], width: usize, height: usize, mut visit: F)
where
    F: FnMut(usize, usize, [f32; 3]),
{
    let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

    // Bounding box
    let min_x = v0.0.min(v1.0).min(v2.0).floor().max(0.0) as i64;
    let max_x = v0.0.max(v1.0).max(v2.0).ceil().min(width as f32 - 1.0) as i64;
    let min_y = v0.1.min(v1.1).min(v2.1).floor().max(0.0) as i64;
    let max_y = v0.1.max(v1.1).max(v2.1).ceil().min(height as f32 - 1.0) as i64;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;

            if let Some((w0, w1, w2)) = barycentric(
                (v0.0, v0.1),
                (v1.0, v1.1),
                (v2.0, v2.1),
                (px, py),
            ) {
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    visit(x as usize, y as usize, [w0, w1, w2]);
                }
            }
        }
    }
}

/// Calculate barycentric coordinates for a point in a triangle
pub(crate) fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-12 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barycentric_at_vertices() {
        let (a, b, c) = ((0.0, 0.0), (4.0, 0.0), (0.0, 4.0));
        let (w0, w1, w2) = barycentric(a, b, c, a).unwrap();
        assert!((w0 - 1.0).abs() < 1e-6 && w1.abs() < 1e-6 && w2.abs() < 1e-6);
        assert!(barycentric(a, a, a, a).is_none());
    }

    #[test]
    fn test_coverage_is_winding_independent() {
        let cw = [(0.0, 0.0, 0.0), (0.0, 4.0, 0.0), (4.0, 0.0, 0.0)];
        let ccw = [(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (0.0, 4.0, 0.0)];
        let count = |tri: &[ScreenVertex; 3]| {
            let mut n = 0;
            rasterize_triangle(tri, 8, 8, |_, _, _| n += 1);
            n
        };
        assert_eq!(count(&cw), count(&ccw));
        assert_eq!(count(&ccw), 10);
    }

    #[test]
    fn test_coverage_clips_to_buffer() {
        let huge = [(-100.0, -100.0, 0.0), (300.0, -100.0, 0.0), (-100.0, 300.0, 0.0)];
        let mut n = 0;
        rasterize_triangle(&huge, 3, 3, |x, y, _| {
            assert!(x < 3 && y < 3);
            n += 1;
        });
        assert_eq!(n, 9);
    }
}
