//! Support for linear algebra.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}
impl Matrix {
    pub fn allocate(rows: usize, cols: usize) -> Self {
        let (len, overflow) = rows.overflowing_mul(cols);
        assert!(!overflow, "allocation of a {rows}x{cols} matrix failed due to overflow");
        let data = vec![0.0; len];
        Self { data, rows, cols }
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::allocate(size, size);
        for diag in 0..size {
            matrix[(diag, diag)] = 1.0;
        }
        matrix
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn row_slice(&self, row: usize) -> &[f64] {
        debug_assert!(self.validate_row_index(row));
        let row_start = row * self.cols;
        &self.data.as_slice()[row_start..(row_start + self.cols)]
    }

    pub fn row_slice_mut(&mut self, row: usize) -> &mut [f64] {
        debug_assert!(self.validate_row_index(row));
        let row_start = row * self.cols;
        &mut self.data.as_mut_slice()[row_start..(row_start + self.cols)]
    }

    pub fn flatten(&self) -> &[f64] {
        &self.data
    }

    pub fn transpose(&self) -> Matrix {
        let mut transposed = Matrix::allocate(self.cols, self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                transposed[(col, row)] = self[(row, col)];
            }
        }
        transposed
    }

    pub fn mul(&self, other: &Matrix) -> Matrix {
        assert_eq!(
            self.cols, other.rows,
            "cannot multiply a {}x{} matrix by a {}x{} matrix",
            self.rows, self.cols, other.rows, other.cols
        );
        let mut product = Matrix::allocate(self.rows, other.cols);
        for row in 0..self.rows {
            for col in 0..other.cols {
                product[(row, col)] = (0..self.cols)
                    .map(|inner| self[(row, inner)] * other[(inner, col)])
                    .sum();
            }
        }
        product
    }

    /// The Gram matrix `AᵀA`, without materialising the transpose.
    pub fn gram(&self) -> Matrix {
        let mut gram = Matrix::allocate(self.cols, self.cols);
        for i in 0..self.cols {
            for j in i..self.cols {
                let dot = (0..self.rows)
                    .map(|row| self[(row, i)] * self[(row, j)])
                    .sum();
                gram[(i, j)] = dot;
                gram[(j, i)] = dot;
            }
        }
        gram
    }

    /// `Aᵀv` for a vector `v` of length [`rows`](Self::rows).
    pub fn transpose_mul_vec(&self, vector: &[f64]) -> Vec<f64> {
        assert_eq!(self.rows, vector.len(), "vector length must match the number of rows");
        (0..self.cols)
            .map(|col| {
                (0..self.rows)
                    .map(|row| self[(row, col)] * vector[row])
                    .sum()
            })
            .collect()
    }

    /// `Av` for a vector `v` of length [`cols`](Self::cols).
    pub fn mul_vec(&self, vector: &[f64]) -> Vec<f64> {
        assert_eq!(self.cols, vector.len(), "vector length must match the number of columns");
        (0..self.rows)
            .map(|row| {
                self.row_slice(row)
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    fn validate_row_index(&self, row: usize) -> bool {
        assert!(row < self.rows, "invalid row index {row} for a {}x{} matrix", self.rows, self.cols);
        true
    }

    fn validate_col_index(&self, col: usize) -> bool {
        assert!(col < self.cols, "invalid column index {col} for a {}x{} matrix", self.rows, self.cols);
        true
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (row, col) = index;
        debug_assert!(self.validate_row_index(row));
        debug_assert!(self.validate_col_index(col));
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (row, col) = index;
        debug_assert!(self.validate_row_index(row));
        debug_assert!(self.validate_col_index(col));
        &mut self.data[row * self.cols + col]
    }
}

/// Pivots smaller than this (relative to the largest entry of the system) are treated as zero.
const SINGULARITY_THRESHOLD: f64 = 1e-14;

/// Solves `Ax = b` by Gaussian elimination with partial pivoting. Returns `None` if `a` is
/// singular or the system contains non-finite values.
pub fn solve(a: &Matrix, b: &[f64]) -> Option<Vec<f64>> {
    assert!(a.is_square(), "cannot solve a non-square {}x{} system", a.rows(), a.cols());
    assert_eq!(a.rows(), b.len(), "right-hand side length must match the system size");

    let n = a.rows();
    let mut augmented = Matrix::allocate(n, n + 1);
    for row in 0..n {
        augmented.row_slice_mut(row)[..n].copy_from_slice(a.row_slice(row));
        augmented[(row, n)] = b[row];
    }
    if !augmented.flatten().iter().all(|value| value.is_finite()) {
        return None;
    }
    let scale = max_abs(a);
    if scale == 0.0 {
        return None;
    }

    for pivot_col in 0..n {
        let pivot_row = find_pivot(&augmented, pivot_col)?;
        if augmented[(pivot_row, pivot_col)].abs() <= SINGULARITY_THRESHOLD * scale {
            return None;
        }
        swap_rows(&mut augmented, pivot_col, pivot_row);
        for row in pivot_col + 1..n {
            let factor = augmented[(row, pivot_col)] / augmented[(pivot_col, pivot_col)];
            if factor != 0.0 {
                for col in pivot_col..=n {
                    augmented[(row, col)] -= factor * augmented[(pivot_col, col)];
                }
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n)
            .map(|col| augmented[(row, col)] * solution[col])
            .sum();
        solution[row] = (augmented[(row, n)] - tail) / augmented[(row, row)];
    }
    if solution.iter().all(|value| value.is_finite()) {
        Some(solution)
    } else {
        None
    }
}

/// Inverts a square matrix by Gauss–Jordan elimination. Returns `None` if `a` is singular.
pub fn invert(a: &Matrix) -> Option<Matrix> {
    assert!(a.is_square(), "cannot invert a non-square {}x{} matrix", a.rows(), a.cols());

    let n = a.rows();
    let mut augmented = Matrix::allocate(n, 2 * n);
    for row in 0..n {
        augmented.row_slice_mut(row)[..n].copy_from_slice(a.row_slice(row));
        augmented[(row, n + row)] = 1.0;
    }
    if !augmented.flatten().iter().all(|value| value.is_finite()) {
        return None;
    }
    let scale = max_abs(a);
    if scale == 0.0 {
        return None;
    }

    for pivot_col in 0..n {
        let pivot_row = find_pivot(&augmented, pivot_col)?;
        let pivot = augmented[(pivot_row, pivot_col)];
        if pivot.abs() <= SINGULARITY_THRESHOLD * scale {
            return None;
        }
        swap_rows(&mut augmented, pivot_col, pivot_row);
        for value in augmented.row_slice_mut(pivot_col) {
            *value /= pivot;
        }
        for row in 0..n {
            if row == pivot_col {
                continue;
            }
            let factor = augmented[(row, pivot_col)];
            if factor != 0.0 {
                for col in 0..2 * n {
                    augmented[(row, col)] -= factor * augmented[(pivot_col, col)];
                }
            }
        }
    }

    let mut inverse = Matrix::allocate(n, n);
    for row in 0..n {
        inverse
            .row_slice_mut(row)
            .copy_from_slice(&augmented.row_slice(row)[n..]);
    }
    if inverse.flatten().iter().all(|value| value.is_finite()) {
        Some(inverse)
    } else {
        None
    }
}

fn max_abs(matrix: &Matrix) -> f64 {
    matrix
        .flatten()
        .iter()
        .fold(0.0, |max, value| f64::max(max, value.abs()))
}

fn find_pivot(augmented: &Matrix, pivot_col: usize) -> Option<usize> {
    (pivot_col..augmented.rows()).max_by(|&a, &b| {
        augmented[(a, pivot_col)]
            .abs()
            .total_cmp(&augmented[(b, pivot_col)].abs())
    })
}

fn swap_rows(matrix: &mut Matrix, a: usize, b: usize) {
    if a != b {
        for col in 0..matrix.cols() {
            matrix.data.swap(a * matrix.cols + col, b * matrix.cols + col);
        }
    }
}
