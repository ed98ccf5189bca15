use ndarray::Array2;

/// Single coordinate axis used for board rows, columns, and positions.
pub type Coord = u8;

/// Count type used for piece counts and total-cell counts.
pub type CellCount = u16;

/// Two-dimensional coordinates `(row, col)`.
pub type Coord2 = (Coord, Coord);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    let a = a as CellCount;
    let b = b as CellCount;
    a.saturating_mul(b)
}

/// Taxicab distance between two grid positions.
pub fn manhattan(a: Coord2, b: Coord2) -> CellCount {
    let dr = (a.0 as i16 - b.0 as i16).unsigned_abs();
    let dc = (a.1 as i16 - b.1 as i16).unsigned_abs();
    dr + dc
}

pub trait Dim2Ext {
    fn size(&self) -> Coord2;
    fn in_bounds(&self, coords: Coord2) -> bool {
        let (rows, cols) = self.size();
        coords.0 < rows && coords.1 < cols
    }
}

impl<T> Dim2Ext for Array2<T> {
    fn size(&self) -> Coord2 {
        let dim = self.dim();
        (
            dim.0.try_into().expect("grid rows fit in a Coord"),
            dim.1.try_into().expect("grid cols fit in a Coord"),
        )
    }
}

/// Applies `delta` to `coords`, returning a value only when it remains in bounds.
pub fn apply_delta(coords: Coord2, delta: (i8, i8), bounds: Coord2) -> Option<Coord2> {
    let (row, col) = coords;
    let (dr, dc) = delta;
    let (max_row, max_col) = bounds;

    let next_row = row.checked_add_signed(dr)?;
    if next_row >= max_row {
        return None;
    }

    let next_col = col.checked_add_signed(dc)?;
    if next_col >= max_col {
        return None;
    }

    Some((next_row, next_col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_is_symmetric() {
        assert_eq!(manhattan((0, 0), (2, 3)), 5);
        assert_eq!(manhattan((2, 3), (0, 0)), 5);
        assert_eq!(manhattan((4, 4), (4, 4)), 0);
    }

    #[test]
    fn apply_delta_rejects_out_of_bounds() {
        assert_eq!(apply_delta((0, 0), (-1, 0), (4, 4)), None);
        assert_eq!(apply_delta((3, 3), (1, 0), (4, 4)), None);
        assert_eq!(apply_delta((1, 1), (1, -1), (4, 4)), Some((2, 0)));
    }
}
