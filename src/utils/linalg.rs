// src/utils/linalg.rs

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use num_rational::Rational64;
use num_traits::Zero;

/// Square integer matrix (HNF, SNF, rotations in fractional basis)
pub type IntMatrix = DMatrix<i64>;

/// Exact fractional coordinate vector
pub type FracVector = DVector<Rational64>;

/// Build an integer matrix from row slices. All rows must share a length.
pub fn int_matrix(rows: &[&[i64]]) -> IntMatrix {
  let nrows = rows.len();
  let ncols = rows.first().map_or(0, |r| r.len());
  IntMatrix::from_fn(nrows, ncols, |i, j| rows[i][j])
}

/// Row-major nested representation, used for JSON output
pub fn matrix_rows(m: &IntMatrix) -> Vec<Vec<i64>> {
  (0..m.nrows())
    .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
    .collect()
}

pub fn frac_vector(values: &[Rational64]) -> FracVector {
  FracVector::from_column_slice(values)
}

pub fn to_rational(m: &IntMatrix) -> DMatrix<Rational64> {
  m.map(Rational64::from_integer)
}

/// Exact determinant by fraction-free (Bareiss) elimination
pub fn determinant(m: &IntMatrix) -> i64 {
  let n = m.nrows();
  if n == 0 {
    return 1;
  }
  let mut a = m.clone();
  let mut sign = 1;
  let mut prev = 1i64;

  for k in 0..n - 1 {
    if a[(k, k)] == 0 {
      match (k + 1..n).find(|&i| a[(i, k)] != 0) {
        Some(i) => {
          a.swap_rows(k, i);
          sign = -sign;
        }
        None => return 0,
      }
    }
    for i in k + 1..n {
      for j in k + 1..n {
        a[(i, j)] = (a[(i, j)] * a[(k, k)] - a[(i, k)] * a[(k, j)]) / prev;
      }
    }
    prev = a[(k, k)];
  }

  sign * a[(n - 1, n - 1)]
}

/// Solve `a * x = b` exactly over the rationals (Gauss-Jordan).
/// Returns `None` for a singular or non-square `a`.
pub fn solve_rational(
  a: &DMatrix<Rational64>,
  b: &DMatrix<Rational64>,
) -> Option<DMatrix<Rational64>> {
  let n = a.nrows();
  if a.ncols() != n || b.nrows() != n {
    return None;
  }
  let mut lhs = a.clone();
  let mut rhs = b.clone();

  for col in 0..n {
    let pivot = (col..n).find(|&r| !lhs[(r, col)].is_zero())?;
    lhs.swap_rows(col, pivot);
    rhs.swap_rows(col, pivot);

    let p = lhs[(col, col)];
    for j in 0..n {
      lhs[(col, j)] /= p;
    }
    for j in 0..rhs.ncols() {
      rhs[(col, j)] /= p;
    }

    for r in 0..n {
      if r == col {
        continue;
      }
      let factor = lhs[(r, col)];
      if factor.is_zero() {
        continue;
      }
      for j in 0..n {
        let v = lhs[(col, j)];
        lhs[(r, j)] -= factor * v;
      }
      for j in 0..rhs.ncols() {
        let v = rhs[(col, j)];
        rhs[(r, j)] -= factor * v;
      }
    }
  }

  Some(rhs)
}

/// Solve `a * x = b` and require an integral solution
pub fn solve_integer(a: &IntMatrix, b: &IntMatrix) -> Option<IntMatrix> {
  let x = solve_rational(&to_rational(a), &to_rational(b))?;
  if x.iter().any(|v| !v.is_integer()) {
    return None;
  }
  Some(x.map(|v| v.to_integer()))
}

/// Inverse of a unimodular matrix, which is again integral
pub fn inverse_unimodular(m: &IntMatrix) -> Option<IntMatrix> {
  if determinant(m).abs() != 1 {
    return None;
  }
  solve_integer(m, &IntMatrix::identity(m.nrows(), m.ncols()))
}

/// True when the columns of `a` and `b` generate the same lattice,
/// i.e. `a * m = b` for an integral `m` with `det(m) = ±1`.
pub fn lattices_coincide(a: &IntMatrix, b: &IntMatrix) -> bool {
  match solve_integer(a, b) {
    Some(m) => determinant(&m).abs() == 1,
    None => false,
  }
}

/// Reduce a fractional coordinate into [0, 1)
pub fn wrap_unit(r: Rational64) -> Rational64 {
  r - r.floor()
}

/// Snap a floating coordinate onto the nearest fraction with a denominator
/// up to `max_denominator`, within `tolerance`.
pub fn snap_to_rational(x: f64, max_denominator: i64, tolerance: f64) -> Option<Rational64> {
  for den in 1..=max_denominator.max(1) {
    let num = (x * den as f64).round();
    if (num / den as f64 - x).abs() < tolerance {
      return Some(Rational64::new(num as i64, den));
    }
  }
  None
}

pub fn rational_to_f64(r: Rational64) -> f64 {
  *r.numer() as f64 / *r.denom() as f64
}

/// Convert fractional coordinates to Cartesian using lattice matrix
///
/// # Arguments
/// * `frac` - Fractional coordinates [x, y, z]
/// * `lattice` - Lattice vectors as row matrix [[ax, ay, az], [bx, by, bz], [cx, cy, cz]]
///
/// # Formula
/// ```text
/// Cartesian = Lattice^T × Fractional
/// ```
pub fn frac_to_cart(frac: [f64; 3], lattice: [[f64; 3]; 3]) -> [f64; 3] {
  let frac_vec = Vector3::from(frac);
  let cart_vec = lattice_matrix(lattice).transpose() * frac_vec;

  [cart_vec.x, cart_vec.y, cart_vec.z]
}

/// Convert Cartesian coordinates to fractional using lattice matrix
///
/// Returns `None` if the lattice is singular.
///
/// # Formula
/// ```text
/// Fractional = (Lattice^T)^-1 × Cartesian
/// ```
pub fn cart_to_frac(cart: [f64; 3], lattice: [[f64; 3]; 3]) -> Option<[f64; 3]> {
  let cart_vec = Vector3::from(cart);
  let inv_lat = lattice_matrix(lattice).transpose().try_inverse()?;
  let frac_vec = inv_lat * cart_vec;

  Some([frac_vec.x, frac_vec.y, frac_vec.z])
}

fn lattice_matrix(lattice: [[f64; 3]; 3]) -> Matrix3<f64> {
  Matrix3::from_row_slice(&[
    lattice[0][0],
    lattice[0][1],
    lattice[0][2],
    lattice[1][0],
    lattice[1][1],
    lattice[1][2],
    lattice[2][0],
    lattice[2][1],
    lattice[2][2],
  ])
}
