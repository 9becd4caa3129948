//! Border padding for 2D matrices.
//!
//! Two strategies are supported: a constant zero border and an "extended"
//! border that replicates the nearest edge of the matrix. The extended
//! variant fills the top and bottom strips first and then derives the left
//! and right strips (corners included) from the already padded columns, so a
//! corner always takes the end value of the nearest edge row.

use ndarray::{Array2, ArrayView2, s};

/// How the border around a matrix is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Border cells are zero
    #[default]
    Zero,
    /// Border cells replicate the nearest edge row/column
    Extended,
}

/// Pad a matrix with the given strategy
pub fn pad<T>(matrix: &ArrayView2<T>, pad_v: usize, pad_h: usize, padding: Padding) -> Array2<T>
where
    T: Clone + Default,
{
    match padding {
        Padding::Zero => zero_pad(matrix, pad_v, pad_h),
        Padding::Extended => extended_pad(matrix, pad_v, pad_h),
    }
}

/// Return a new matrix of shape `(rows + 2*pad_v, cols + 2*pad_h)` with the
/// original centered and a zero border.
pub fn zero_pad<T>(matrix: &ArrayView2<T>, pad_v: usize, pad_h: usize) -> Array2<T>
where
    T: Clone + Default,
{
    let (rows, cols) = matrix.dim();
    let mut padded = Array2::from_elem((rows + 2 * pad_v, cols + 2 * pad_h), T::default());
    padded
        .slice_mut(s![pad_v..pad_v + rows, pad_h..pad_h + cols])
        .assign(matrix);
    padded
}

/// Return a new matrix whose border replicates the edges of `matrix`.
pub fn extended_pad<T>(matrix: &ArrayView2<T>, pad_v: usize, pad_h: usize) -> Array2<T>
where
    T: Clone + Default,
{
    let mut padded = zero_pad(matrix, pad_v, pad_h);
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return padded;
    }

    // Top and bottom strips, corners left untouched for now
    let top = matrix.row(0);
    let bottom = matrix.row(rows - 1);
    for r in 0..pad_v {
        padded.slice_mut(s![r, pad_h..pad_h + cols]).assign(&top);
        padded
            .slice_mut(s![pad_v + rows + r, pad_h..pad_h + cols])
            .assign(&bottom);
    }

    // Left and right strips come from the padded edge columns, so the corners
    // inherit the end values of the replicated rows.
    let left = padded.column(pad_h).to_owned();
    let right = padded.column(pad_h + cols - 1).to_owned();
    for c in 0..pad_h {
        padded.column_mut(c).assign(&left);
        padded.column_mut(pad_h + cols + c).assign(&right);
    }

    padded
}

/// Remove a border of `pad_v` rows and `pad_h` columns from each side.
///
/// A border wider than the matrix yields an empty matrix.
pub fn crop_center<T>(matrix: &ArrayView2<T>, pad_v: usize, pad_h: usize) -> Array2<T>
where
    T: Clone,
{
    let (rows, cols) = matrix.dim();
    let row_end = rows.saturating_sub(pad_v).max(pad_v.min(rows));
    let col_end = cols.saturating_sub(pad_h).max(pad_h.min(cols));
    let row_start = pad_v.min(row_end);
    let col_start = pad_h.min(col_end);
    matrix
        .slice(s![row_start..row_end, col_start..col_end])
        .to_owned()
}
