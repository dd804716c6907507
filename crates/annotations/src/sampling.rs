//! Render-path point decimation

use shared_types::DataPoint;

/// Thin `points` for rendering when there are more than `max_points`.
///
/// Keeps the first and last point and samples the interior at a stride of
/// `ceil(n / max_points)`. The input is never modified; only the returned
/// render buffer is thinned.
pub fn decimate(points: &[DataPoint], max_points: usize) -> Vec<DataPoint> {
    let n = points.len();
    if max_points == 0 || n <= max_points {
        return points.to_vec();
    }

    let step = n.div_ceil(max_points);
    let mut sampled = Vec::with_capacity(n / step + 2);
    sampled.push(points[0]);

    let mut i = step;
    while i < n - 1 {
        sampled.push(points[i]);
        i += step;
    }

    sampled.push(points[n - 1]);
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<DataPoint> {
        (0..n).map(|i| DataPoint::new(i as f64, 0.0)).collect()
    }

    #[test]
    fn test_short_input_is_untouched() {
        let points = line(1000);
        assert_eq!(decimate(&points, 1000), points);
    }

    #[test]
    fn test_decimation_keeps_endpoints() {
        let points = line(2500);
        let sampled = decimate(&points, 1000);

        assert!(sampled.len() <= 1001);
        assert_eq!(sampled.first().unwrap().x, 0.0);
        assert_eq!(sampled.last().unwrap().x, 2499.0);
        // stride 3: 0, 3, 6, ...
        assert_eq!(sampled[1].x, 3.0);
    }

    #[test]
    fn test_interior_is_ordered() {
        let sampled = decimate(&line(5001), 1000);
        assert!(sampled.windows(2).all(|w| w[0].x < w[1].x));
        assert!(sampled.len() <= 1001);
    }
}
