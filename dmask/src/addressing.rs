//! # Cell addressing
//!
//! Maps `(row, col)` grid coordinates to linear offsets within a frame or a mask.

/// Linear addressing scheme of a frame grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Addressing {
    /// `row * cols + col`.
    #[default]
    RowMajor,
    /// `row * rows + col`.
    ///
    /// This is the stride used by the legacy mask generator. It is only correct for square
    /// grids: when `rows != cols`, columns at or past `rows` alias cells of the next row.
    /// Keep it only when output must match the legacy tool bit for bit.
    LegacyRowStride,
}

impl Addressing {
    /// Linear offset of a cell.
    ///
    /// # Arguments
    ///
    /// * `row` - row of the cell.
    /// * `col` - column of the cell.
    /// * `rows` - number of rows in the grid.
    /// * `cols` - number of columns in the grid.
    #[inline]
    pub fn index(self, row: usize, col: usize, rows: usize, cols: usize) -> usize {
        match self {
            Self::RowMajor => row * cols + col,
            Self::LegacyRowStride => row * rows + col,
        }
    }

    /// Number of elements spanned by the addressed cells.
    ///
    /// This is one past the largest offset `index` returns for the grid, or 0 for an empty
    /// grid.
    pub fn extent(self, rows: usize, cols: usize) -> usize {
        if rows == 0 || cols == 0 {
            return 0;
        }

        match self {
            Self::RowMajor => rows * cols,
            Self::LegacyRowStride => (rows - 1) * rows + cols,
        }
    }

    /// Same as `extent`, but returns `None` if the extent does not fit in `usize`.
    pub fn checked_extent(self, rows: usize, cols: usize) -> Option<usize> {
        if rows == 0 || cols == 0 {
            return Some(0);
        }

        match self {
            Self::RowMajor => rows.checked_mul(cols),
            Self::LegacyRowStride => (rows - 1).checked_mul(rows)?.checked_add(cols),
        }
    }

    /// Returns `true` if distinct cells may map to the same offset.
    pub fn aliases(self, rows: usize, cols: usize) -> bool {
        matches!(self, Self::LegacyRowStride) && cols > rows && rows > 1
    }

    /// Iterate offsets of all cells in row-major visiting order.
    pub fn offsets(self, rows: usize, cols: usize) -> impl Iterator<Item = usize> {
        (0..rows).flat_map(move |i| (0..cols).map(move |j| self.index(i, j, rows, cols)))
    }
}
