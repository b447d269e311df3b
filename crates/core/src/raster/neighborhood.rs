//! 4-connected neighbourhood helpers for grid traversal

/// One of the four rook-move directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Scan order used when looking for a neighbour across a border
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    /// Offset as (d_row, d_col)
    pub fn offset(self) -> (isize, isize) {
        match self {
            Side::Left => (0, -1),
            Side::Right => (0, 1),
            Side::Top => (-1, 0),
            Side::Bottom => (1, 0),
        }
    }

    /// Neighbouring cell of `(row, col)` in a `rows x cols` grid, if inside it
    #[inline]
    pub fn step(self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = self.offset();
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        (r < rows && c < cols).then_some((r, c))
    }
}

/// Iterator over the in-grid 4-neighbours of a cell, in [`Side::ALL`] order
pub fn rook_neighbors(
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (Side, (usize, usize))> {
    Side::ALL
        .into_iter()
        .filter_map(move |side| side.step(row, col, rows, cols).map(|rc| (side, rc)))
}
