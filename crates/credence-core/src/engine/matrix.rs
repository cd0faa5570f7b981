//! Dense row-major matrices for the propagation kernels.
//!
//! Graphs handled by the estimators fit in memory as dense N×N matrices, so a
//! flat `Vec<f64>` with explicit shape is all the linear algebra we need:
//! products, transposed products, index selection and row reductions.
//!
//! With the `parallel` feature, matrix products split output rows across the
//! rayon pool. Each row is still produced by the same sequential kernel, so
//! parallel and scalar results are bit-identical.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::errors::CredenceError;

/// Minimum output rows before a product is split across threads.
#[cfg(feature = "parallel")]
pub const PARALLEL_MIN_ROWS: usize = 64;

/// Dense `f64` matrix stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Creates a `rows × cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates the `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        m.fill_diagonal(1.0);
        m
    }

    /// Builds a matrix from row vectors. All rows must share one length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, CredenceError> {
        let row_count = rows.len();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(row_count * cols);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(CredenceError::DimensionMismatch(format!(
                    "row {} has {} columns, expected {}",
                    idx,
                    row.len(),
                    cols
                )));
            }
            data.extend(row);
        }
        Ok(Self {
            rows: row_count,
            cols,
            data,
        })
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

    /// Returns the entry at `(row, col)`.
    ///
    /// Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Sets every diagonal entry to `value` (up to `min(rows, cols)`).
    pub fn fill_diagonal(&mut self, value: f64) {
        for i in 0..self.rows.min(self.cols) {
            self.set(i, i, value);
        }
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|r| self.row(r).iter().sum()).collect()
    }

    /// Returns `true` if every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// `self += factor * other`.
    pub fn add_scaled(&mut self, other: &DenseMatrix, factor: f64) -> Result<(), CredenceError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(CredenceError::DimensionMismatch(format!(
                "cannot add {}x{} to {}x{}",
                other.rows, other.cols, self.rows, self.cols
            )));
        }
        for (lhs, rhs) in self.data.iter_mut().zip(&other.data) {
            *lhs += factor * rhs;
        }
        Ok(())
    }

    /// Copies the sub-matrix at the given row and column indices.
    ///
    /// Index order is preserved on both axes. Indices must be in range.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> Result<DenseMatrix, CredenceError> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.rows) {
            return Err(CredenceError::DimensionMismatch(format!(
                "row index {} out of range for {} rows",
                bad, self.rows
            )));
        }
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.cols) {
            return Err(CredenceError::DimensionMismatch(format!(
                "column index {} out of range for {} columns",
                bad, self.cols
            )));
        }
        let mut out = DenseMatrix::zeros(rows.len(), cols.len());
        for (out_row, &r) in rows.iter().enumerate() {
            let src = self.row(r);
            let dst = out.row_mut(out_row);
            for (slot, &c) in dst.iter_mut().zip(cols) {
                *slot = src[c];
            }
        }
        Ok(out)
    }

    /// Matrix product `self · other`.
    pub fn matmul(&self, other: &DenseMatrix) -> Result<DenseMatrix, CredenceError> {
        if self.cols != other.rows {
            return Err(CredenceError::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = DenseMatrix::zeros(self.rows, other.cols);
        if out.data.is_empty() {
            return Ok(out);
        }

        #[cfg(feature = "parallel")]
        {
            if self.rows >= PARALLEL_MIN_ROWS {
                let cols = other.cols;
                out.data
                    .par_chunks_mut(cols)
                    .enumerate()
                    .for_each(|(r, out_row)| matmul_row(self.row(r), other, out_row));
                return Ok(out);
            }
        }

        for r in 0..self.rows {
            let (lhs, out_row) = (self.row(r), out.row_mut(r));
            matmul_row(lhs, other, out_row);
        }
        Ok(out)
    }

    /// Matrix-vector product `self · v`.
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>, CredenceError> {
        if self.cols != v.len() {
            return Err(CredenceError::DimensionMismatch(format!(
                "cannot multiply {}x{} by vector of length {}",
                self.rows,
                self.cols,
                v.len()
            )));
        }
        Ok((0..self.rows).map(|r| dot(self.row(r), v)).collect())
    }

    /// Transposed matrix-vector product `selfᵀ · v`.
    pub fn transpose_mul_vec(&self, v: &[f64]) -> Result<Vec<f64>, CredenceError> {
        if self.rows != v.len() {
            return Err(CredenceError::DimensionMismatch(format!(
                "cannot multiply transpose of {}x{} by vector of length {}",
                self.rows,
                self.cols,
                v.len()
            )));
        }
        let mut out = vec![0.0; self.cols];
        for (r, &weight) in v.iter().enumerate() {
            if weight == 0.0 {
                continue;
            }
            for (slot, &a) in out.iter_mut().zip(self.row(r)) {
                *slot += a * weight;
            }
        }
        Ok(out)
    }
}

/// Scalar reference kernel: one output row of `lhs_row · rhs`.
#[inline]
fn matmul_row(lhs_row: &[f64], rhs: &DenseMatrix, out_row: &mut [f64]) {
    for (k, &a) in lhs_row.iter().enumerate() {
        if a == 0.0 {
            continue;
        }
        for (slot, &b) in out_row.iter_mut().zip(rhs.row(k)) {
            *slot += a * b;
        }
    }
}

#[inline]
pub(crate) fn dot(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}

/// Squared Euclidean distance between two equally long vectors.
#[inline]
pub fn squared_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(a, b)| (a - b) * (a - b)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: Vec<Vec<f64>>) -> DenseMatrix {
        DenseMatrix::from_rows(rows).expect("rectangular rows")
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = DenseMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, CredenceError::DimensionMismatch(_)));
    }

    #[test]
    fn matmul_matches_hand_computed_product() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        let c = a.matmul(&b).expect("product");
        assert_eq!(c, m(vec![vec![2.0, 1.0], vec![4.0, 3.0]]));
    }

    #[test]
    fn matmul_rejects_mismatched_shapes() {
        let a = DenseMatrix::zeros(2, 3);
        let b = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            a.matmul(&b),
            Err(CredenceError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn identity_is_neutral() {
        let a = m(vec![vec![0.5, 0.5, 0.0], vec![0.0, 1.0, 0.0], vec![0.2, 0.3, 0.5]]);
        let i = DenseMatrix::identity(3);
        assert_eq!(a.matmul(&i).expect("a*i"), a);
        assert_eq!(i.matmul(&a).expect("i*a"), a);
    }

    #[test]
    fn transpose_mul_vec_matches_explicit_transpose() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let v = [1.0, -1.0];
        assert_eq!(a.transpose_mul_vec(&v).expect("aᵀv"), vec![-3.0, -3.0, -3.0]);
        assert_eq!(a.mul_vec(&[1.0, 0.0, 1.0]).expect("av"), vec![4.0, 10.0]);
    }

    #[test]
    fn select_preserves_index_order() {
        let a = m(vec![
            vec![0.0, 1.0, 2.0],
            vec![3.0, 4.0, 5.0],
            vec![6.0, 7.0, 8.0],
        ]);
        let s = a.select(&[2, 0], &[1, 2]).expect("selection");
        assert_eq!(s, m(vec![vec![7.0, 8.0], vec![1.0, 2.0]]));
        assert!(a.select(&[3], &[0]).is_err());
    }

    #[test]
    fn empty_selection_has_zero_shape() {
        let a = DenseMatrix::identity(3);
        let s = a.select(&[], &[0, 1]).expect("empty rows");
        assert_eq!((s.rows(), s.cols()), (0, 2));
        assert_eq!(s.mul_vec(&[1.0, 1.0]).expect("empty product"), Vec::<f64>::new());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matmul_matches_scalar_rows() {
        let n = PARALLEL_MIN_ROWS + 3;
        let mut a = DenseMatrix::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                a.set(r, c, ((r * 31 + c * 17) % 11) as f64 / 11.0);
            }
        }
        let product = a.matmul(&a).expect("product");
        for r in 0..n {
            let mut expected = vec![0.0; n];
            matmul_row(a.row(r), &a, &mut expected);
            assert_eq!(product.row(r), expected.as_slice());
        }
    }
}
