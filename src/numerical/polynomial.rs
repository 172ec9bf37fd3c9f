//! Polynomials with real coefficients: least-squares fit, evaluation, differentiation and
//! real roots.
//!
//! Coefficients are stored by increasing power, `c[0] + c[1]*x + c[2]*x^2 + ...`.

use crate::numerical::fitting::{FitError, check_samples};
use nalgebra::{DMatrix, DVector, linalg::Schur};
use num_complex::Complex64;
use std::fmt;

/// relative size of the imaginary part below which an eigenvalue counts as a real root
const IMAG_TOLERANCE: f64 = 1e-9;
/// Newton steps used to polish real eigenvalues
const POLISH_STEPS: usize = 3;
/// upper bound on halvings of a sign-change bracket
const BISECTION_STEPS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn new(coeffs: Vec<f64>) -> Self {
        let coeffs = if coeffs.is_empty() { vec![0.0] } else { coeffs };
        Polynomial { coeffs }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// nominal degree, trailing zero coefficients included
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Horner's method, one multiply-add per coefficient
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs
            .iter()
            .rev()
            .fold(0.0, |acc, &coef| x.mul_add(acc, coef))
    }

    pub fn eval_vec(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.eval(xi)).collect()
    }

    pub fn derivative(&self) -> Polynomial {
        if self.coeffs.len() == 1 {
            return Polynomial::new(vec![0.0]);
        }
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(power, c)| power as f64 * c)
            .collect();
        Polynomial::new(coeffs)
    }

    pub fn nth_derivative(&self, order: usize) -> Polynomial {
        (0..order).fold(self.clone(), |p, _| p.derivative())
    }

    /// Least-squares fit of a polynomial of the given degree.
    ///
    /// The Vandermonde matrix is column-scaled to unit norm and solved by SVD; singular values
    /// below `n * eps * max singular value` are treated as zero.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Polynomial, FitError> {
        check_samples(x, y, degree + 1)?;
        let n = x.len();
        let cols = degree + 1;
        let mut a = DMatrix::from_fn(n, cols, |i, j| x[i].powi(j as i32));
        let mut scales = vec![1.0; cols];
        for (j, scale) in scales.iter_mut().enumerate() {
            let norm = a.column(j).norm();
            if norm > 0.0 {
                *scale = norm;
                for i in 0..n {
                    a[(i, j)] /= norm;
                }
            }
        }
        let b = DVector::from_column_slice(y);
        let svd = a.svd(true, true);
        let max_sv = svd.singular_values.max();
        let tol = n as f64 * f64::EPSILON * max_sv;
        let solution = svd
            .solve(&b, tol)
            .map_err(|e| FitError::Singular(e.to_string()))?;
        let coeffs: Vec<f64> = solution
            .iter()
            .zip(scales.iter())
            .map(|(c, s)| c / s)
            .collect();
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(FitError::NonFiniteParameters);
        }
        Ok(Polynomial::new(coeffs))
    }

    /// All roots, as eigenvalues of the companion matrix of the monic polynomial.
    pub fn complex_roots(&self) -> Result<Vec<Complex64>, FitError> {
        let max_abs = self.coeffs.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        // drop negligible leading coefficients
        let mut coeffs = self.coeffs.clone();
        while coeffs.len() > 1 && coeffs.last().is_some_and(|c| c.abs() <= f64::EPSILON * max_abs)
        {
            coeffs.pop();
        }
        let degree = coeffs.len() - 1;
        if degree == 0 {
            return Ok(Vec::new());
        }
        let lead = coeffs[degree];
        let mut companion = DMatrix::<f64>::zeros(degree, degree);
        for i in 1..degree {
            companion[(i, i - 1)] = 1.0;
        }
        for i in 0..degree {
            companion[(i, degree - 1)] = -coeffs[i] / lead;
        }
        let schur = Schur::try_new(companion, f64::EPSILON, 10_000)
            .ok_or_else(|| FitError::Singular("companion matrix eigenvalues".to_string()))?;
        Ok(schur.complex_eigenvalues().iter().copied().collect())
    }

    /// Roots in `[lo, hi]` where the polynomial changes sign, ascending.
    ///
    /// The interval is cut into `intervals` equal pieces; every piece whose ends have opposite
    /// signs is bisected down to float resolution. Roots of even multiplicity are not found.
    pub fn sign_change_roots(&self, lo: f64, hi: f64, intervals: usize) -> Vec<f64> {
        let mut roots = Vec::new();
        if !(lo <= hi) {
            return roots;
        }
        if lo == hi || intervals == 0 {
            if self.eval(lo) == 0.0 {
                roots.push(lo);
            }
            return roots;
        }
        let width = hi - lo;
        let mut a = lo;
        let mut fa = self.eval(a);
        for i in 1..=intervals {
            let b = if i == intervals {
                hi
            } else {
                lo + width * i as f64 / intervals as f64
            };
            let fb = self.eval(b);
            if fa == 0.0 {
                roots.push(a);
            } else if fb != 0.0 && fa.signum() != fb.signum() {
                roots.push(self.bisect(a, b, fa));
            }
            a = b;
            fa = fb;
        }
        if fa == 0.0 {
            roots.push(hi);
        }
        roots
    }

    fn bisect(&self, mut a: f64, mut b: f64, mut fa: f64) -> f64 {
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (a + b);
            if mid <= a || mid >= b {
                break;
            }
            let fm = self.eval(mid);
            if fm == 0.0 {
                return mid;
            }
            if fm.signum() == fa.signum() {
                a = mid;
                fa = fm;
            } else {
                b = mid;
            }
        }
        0.5 * (a + b)
    }

    /// Real roots in ascending order.
    pub fn real_roots(&self) -> Result<Vec<f64>, FitError> {
        let mut roots: Vec<f64> = self
            .complex_roots()?
            .into_iter()
            .filter(|r| r.im.abs() <= IMAG_TOLERANCE * r.re.abs().max(1.0))
            .map(|r| self.polish(r.re))
            .collect();
        roots.sort_by(|a, b| a.total_cmp(b));
        Ok(roots)
    }

    fn polish(&self, root: f64) -> f64 {
        let derivative = self.derivative();
        let mut x = root;
        for _ in 0..POLISH_STEPS {
            let slope = derivative.eval(x);
            if slope == 0.0 {
                break;
            }
            let next = x - self.eval(x) / slope;
            // keep the eigenvalue if Newton would jump away (multiple roots)
            if !next.is_finite() || (next - x).abs() > 1e-6 * x.abs().max(1.0) {
                break;
            }
            x = next;
        }
        x
    }
}

/// Polynomial in descending powers, e.g. `2·x^2 - 3·x + 1`
impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut terms = Vec::new();
        for (power, &c) in self.coeffs.iter().enumerate().rev() {
            if c == 0.0 {
                continue;
            }
            let body = match power {
                0 => format!("{}", c.abs()),
                1 => format!("{}·x", c.abs()),
                _ => format!("{}·x^{}", c.abs(), power),
            };
            let sign = if c < 0.0 { "-" } else { "+" };
            terms.push((sign, body));
        }
        if terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (sign, body)) in terms.iter().enumerate() {
            match (i, *sign) {
                (0, "-") => write!(f, "-{}", body)?,
                (0, _) => write!(f, "{}", body)?,
                _ => write!(f, " {} {}", sign, body)?,
            }
        }
        Ok(())
    }
}
