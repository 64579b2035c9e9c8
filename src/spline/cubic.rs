//! Interpolating cubic spline with not-a-knot end conditions.
//!
//! Not-a-knot makes the third derivative continuous across the second and the
//! second-to-last knot, so the first two and the last two segments are each a single
//! cubic. With three knots this degenerates to the interpolating parabola, with two
//! to a straight line. Evaluation outside the knot span extends the first or last
//! segment polynomial.

use crate::types::series::SeriesError;

#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    /// Per segment `[a, b, c, d]` for `a + b*dx + c*dx^2 + d*dx^3`, `dx = x - knot`.
    coefficients: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Fits a spline through `(xs[i], ys[i])`. `xs` must be strictly increasing.
    pub fn not_a_knot(xs: &[f64], ys: &[f64]) -> Result<Self, SeriesError> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return Err(SeriesError::InsufficientPoints { found: n });
        }
        let xs = &xs[..n];
        let ys = &ys[..n];

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slopes: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();
        let second = second_derivatives(&h, &slopes)?;

        let coefficients = (0..n - 1)
            .map(|i| {
                let a = ys[i];
                let b = slopes[i] - h[i] * (2.0 * second[i] + second[i + 1]) / 6.0;
                let c = second[i] / 2.0;
                let d = (second[i + 1] - second[i]) / (6.0 * h[i]);
                [a, b, c, d]
            })
            .collect();

        Ok(Self {
            knots: xs.to_vec(),
            coefficients,
        })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.evaluate_segment(self.segment_for(x), x)
    }

    /// Evaluates at ascending `xs`, walking the segments instead of searching for each point.
    pub fn evaluate_sorted<I>(&self, xs: I) -> Vec<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let last = self.coefficients.len() - 1;
        let mut segment = 0;
        xs.into_iter()
            .map(|x| {
                while segment < last && x >= self.knots[segment + 1] {
                    segment += 1;
                }
                self.evaluate_segment(segment, x)
            })
            .collect()
    }

    fn segment_for(&self, x: f64) -> usize {
        let upper = self.knots.partition_point(|&k| k <= x);
        upper.saturating_sub(1).min(self.coefficients.len() - 1)
    }

    fn evaluate_segment(&self, segment: usize, x: f64) -> f64 {
        let [a, b, c, d] = self.coefficients[segment];
        let dx = x - self.knots[segment];
        a + dx * (b + dx * (c + dx * d))
    }
}

/// Second derivatives at every knot.
fn second_derivatives(h: &[f64], slopes: &[f64]) -> Result<Vec<f64>, SeriesError> {
    let n = h.len() + 1;
    match n {
        2 => return Ok(vec![0.0; 2]),
        3 => {
            let curvature = 2.0 * (slopes[1] - slopes[0]) / (h[0] + h[1]);
            return Ok(vec![curvature; 3]);
        }
        _ => {}
    }

    // Interior equations for M[1..n-1], with M[0] and M[n-1] eliminated by the
    // not-a-knot conditions folded into the first and last rows.
    let m = n - 2;
    let mut lower = vec![0.0; m];
    let mut diag = vec![0.0; m];
    let mut upper = vec![0.0; m];
    let mut rhs = vec![0.0; m];
    for k in 0..m {
        let i = k + 1;
        lower[k] = h[i - 1];
        diag[k] = 2.0 * (h[i - 1] + h[i]);
        upper[k] = h[i];
        rhs[k] = 6.0 * (slopes[i] - slopes[i - 1]);
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
    upper[0] = (h1 * h1 - h0 * h0) / h1;

    let (a, b) = (h[n - 3], h[n - 2]);
    lower[m - 1] = (a * a - b * b) / a;
    diag[m - 1] = (a + b) * (2.0 * a + b) / a;

    let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

    let mut second = Vec::with_capacity(n);
    second.push(interior[0] + h0 / h1 * (interior[0] - interior[1]));
    second.extend_from_slice(&interior);
    second.push(interior[m - 1] + b / a * (interior[m - 1] - interior[m - 2]));
    Ok(second)
}

/// Thomas algorithm. `lower[0]` and `upper[len - 1]` are ignored.
fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, SeriesError> {
    let len = diag.len();
    let mut c_prime = vec![0.0; len];
    let mut d_prime = vec![0.0; len];

    let mut pivot = diag[0];
    if pivot == 0.0 || !pivot.is_finite() {
        return Err(SeriesError::IllConditioned { knot: 1 });
    }
    c_prime[0] = upper[0] / pivot;
    d_prime[0] = rhs[0] / pivot;
    for k in 1..len {
        pivot = diag[k] - lower[k] * c_prime[k - 1];
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(SeriesError::IllConditioned { knot: k + 1 });
        }
        c_prime[k] = upper[k] / pivot;
        d_prime[k] = (rhs[k] - lower[k] * d_prime[k - 1]) / pivot;
    }

    let mut solution = vec![0.0; len];
    solution[len - 1] = d_prime[len - 1];
    for k in (0..len - 1).rev() {
        solution[k] = d_prime[k] - c_prime[k] * solution[k + 1];
    }
    Ok(solution)
}
