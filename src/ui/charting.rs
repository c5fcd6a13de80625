use crate::models::AttemptResponse;

/// (attempt number, score) points for the history chart, oldest first
pub fn score_points(history: &[AttemptResponse]) -> Vec<(f64, f64)> {
    history
        .iter()
        .enumerate()
        .map(|(i, a)| ((i + 1) as f64, a.score as f64))
        .collect()
}

/// X (attempt count) and Y (score) upper bounds for the history chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let attempts = points.last().map_or(1.0, |p| p.0).max(1.0);
    let highest = points.iter().map(|p| p.1).fold(0.0, f64::max).max(100.0);
    (attempts, highest.round())
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_chart_params_empty() {
        let (x, y) = compute_chart_params(&[]);
        assert_eq!(x, 1.0);
        assert_eq!(y, 100.0);
    }

    #[test]
    fn test_compute_chart_params_points() {
        let (x, y) = compute_chart_params(&[(1.0, 40.0), (2.0, 85.0), (3.0, 70.0)]);
        assert_eq!(x, 3.0);
        assert_eq!(y, 100.0);
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(1.0), "1");
        assert_eq!(format_label(1.2345), "1.23");
    }
}
