//! Cubic spline interpolation over row positions.
//!
//! Fits a natural cubic spline through the present points of a group and
//! evaluates it at every position, so interior gaps follow the local
//! curvature instead of a straight line. Positions outside the first and
//! last present point use the adjacent end segment's polynomial.

/// Minimum present points for a degree-3 interpolating spline.
const MIN_POINTS: usize = 4;

/// Evaluate an interpolating spline through the present values at every
/// position. Returns `None` when the group has too few present points,
/// letting the caller pick a fallback.
pub fn fill(values: &[Option<f64>]) -> Option<Vec<Option<f64>>> {
    let knots: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();
    if knots.len() < MIN_POINTS {
        return None;
    }

    let spline = NaturalCubic::fit(&knots);
    Some((0..values.len()).map(|i| Some(spline.evaluate(i as f64))).collect())
}

/// Natural cubic spline: second derivatives vanish at both ends.
struct NaturalCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl NaturalCubic {
    fn fit(knots: &[(f64, f64)]) -> Self {
        let n = knots.len();
        let xs: Vec<f64> = knots.iter().map(|&(x, _)| x).collect();
        let ys: Vec<f64> = knots.iter().map(|&(_, y)| y).collect();

        // Tridiagonal system for the interior second derivatives
        // (Thomas algorithm); m[0] and m[n-1] stay zero.
        let mut m = vec![0.0; n];
        if n > 2 {
            let mut diag = vec![0.0; n - 2];
            let mut rhs = vec![0.0; n - 2];
            let mut upper = vec![0.0; n - 2];

            for i in 1..n - 1 {
                let h0 = xs[i] - xs[i - 1];
                let h1 = xs[i + 1] - xs[i];
                diag[i - 1] = 2.0 * (h0 + h1);
                upper[i - 1] = h1;
                rhs[i - 1] =
                    6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
            }

            for i in 1..n - 2 {
                let h = xs[i + 1] - xs[i];
                let factor = h / diag[i - 1];
                diag[i] -= factor * upper[i - 1];
                rhs[i] -= factor * rhs[i - 1];
            }

            m[n - 2] = rhs[n - 3] / diag[n - 3];
            for i in (1..n - 2).rev() {
                m[i] = (rhs[i - 1] - upper[i - 1] * m[i + 1]) / diag[i - 1];
            }
        }

        Self { xs, ys, m }
    }

    fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // End segments also serve for extrapolation.
        let seg = match self.xs.iter().position(|&knot| x < knot) {
            Some(0) => 0,
            Some(pos) => pos - 1,
            None => n - 2,
        };

        let h = self.xs[seg + 1] - self.xs[seg];
        let a = (self.xs[seg + 1] - x) / h;
        let b = (x - self.xs[seg]) / h;

        a * self.ys[seg]
            + b * self.ys[seg + 1]
            + ((a.powi(3) - a) * self.m[seg] + (b.powi(3) - b) * self.m[seg + 1]) * h * h / 6.0
    }
}
