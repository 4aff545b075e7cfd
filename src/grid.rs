//! The 10x20 playfield: collision detection, locking, line clearing,
//! and the cell snapshot codec
//!
//! Row 0 is the bottom, row 19 the top visible row. Pieces may poke above
//! row 19 right after spawning; those blocks are legal but never stored,
//! the matrix holds visible rows only.

use crate::block::Cell;
use crate::piece::Piece;
use crate::tetromino::RotationDirection;

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 20;
/// Topmost visible row index
pub const GRID_TOP_ROW: usize = GRID_HEIGHT - 1;
/// Cell count of a full snapshot
pub const GRID_CELLS: usize = GRID_WIDTH * GRID_HEIGHT;

/// One player's playfield plus its falling, shadow and buffered next piece
#[derive(Debug, Clone)]
pub struct Grid {
    /// Settled cells as [row][col]
    cells: [[Cell; GRID_WIDTH]; GRID_HEIGHT],
    falling: Piece,
    shadow: Piece,
    next: Piece,
    next_modified: bool,
}

impl Grid {
    pub fn new(falling: Piece, next: Piece) -> Self {
        let shadow = falling.clone();
        let mut grid = Self {
            cells: [[Cell::Empty; GRID_WIDTH]; GRID_HEIGHT],
            falling,
            shadow,
            next,
            next_modified: false,
        };
        grid.refresh_shadow();
        grid
    }

    pub fn falling(&self) -> &Piece {
        &self.falling
    }

    pub fn shadow(&self) -> &Piece {
        &self.shadow
    }

    pub fn next(&self) -> &Piece {
        &self.next
    }

    /// Get the cell at (x, y); None outside the matrix
    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 || x >= GRID_WIDTH as i32 || y >= GRID_HEIGHT as i32 {
            return None;
        }
        Some(self.cells[y as usize][x as usize])
    }

    /// Set the cell at (x, y); false outside the matrix
    pub fn set_cell(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        if x < 0 || y < 0 || x >= GRID_WIDTH as i32 || y >= GRID_HEIGHT as i32 {
            return false;
        }
        self.cells[y as usize][x as usize] = cell;
        true
    }

    /// A position a falling block may occupy: inside the columns, not below
    /// the floor, and not on a settled cell. Above the top row is free, that
    /// is where fresh pieces enter from.
    pub fn position_free(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= GRID_WIDTH as i32 || y < 0 {
            return false;
        }
        if y >= GRID_HEIGHT as i32 {
            return true;
        }
        self.cells[y as usize][x as usize].is_empty()
    }

    pub fn positions_free(&self, positions: &[(i32, i32)]) -> bool {
        positions.iter().all(|&(x, y)| self.position_free(x, y))
    }

    /// Install a new falling piece. Returns false when it immediately
    /// collides, which the owner treats as game over.
    pub fn spawn(&mut self, piece: Piece) -> bool {
        let free = self.positions_free(&piece.block_positions());
        self.falling = piece;
        self.refresh_shadow();
        free
    }

    /// Swap the buffered next piece in as the falling piece, buffering
    /// `refill` in its place. Same collision contract as [`Grid::spawn`].
    pub fn promote_next(&mut self, refill: Piece) -> bool {
        let next = std::mem::replace(&mut self.next, refill);
        self.spawn(next)
    }

    /// Replace the falling piece wholesale (used when mirroring a peer)
    pub fn set_falling(&mut self, piece: Piece) {
        self.falling = piece;
        self.refresh_shadow();
    }

    pub fn flag_next_modified(&mut self) {
        self.next_modified = true;
    }

    /// True once since the next piece was last displaced; reading clears it
    pub fn take_next_modified(&mut self) -> bool {
        std::mem::take(&mut self.next_modified)
    }

    fn refresh_shadow(&mut self) {
        let shadow = self.falling.dropped(self);
        self.shadow = shadow;
    }

    /// Copy the falling piece's blocks into the matrix and clear every full
    /// row in the span those blocks cover. Returns the number of rows
    /// removed. The falling piece itself is left for the caller to replace.
    pub fn lock_falling(&mut self) -> u32 {
        let blocks = *self.falling.blocks();
        for block in blocks {
            if block.x >= 0
                && block.y >= 0
                && (block.x as usize) < GRID_WIDTH
                && (block.y as usize) < GRID_HEIGHT
            {
                self.cells[block.y as usize][block.x as usize] = Cell::Filled(block.color);
            }
        }
        let low = blocks.iter().map(|b| b.y).fold(i32::MAX, i32::min).max(0);
        let high = blocks
            .iter()
            .map(|b| b.y)
            .fold(i32::MIN, i32::max)
            .min(GRID_TOP_ROW as i32);
        self.clear_rows(low, high)
    }

    /// Scan rows low..=high from the bottom up. Removing a row shifts
    /// everything above it down one, so the scan index stays put and the
    /// window shrinks instead.
    fn clear_rows(&mut self, low: i32, high: i32) -> u32 {
        let mut removed = 0;
        let mut row = low;
        let mut end = high;
        while row <= end {
            if self.row_full(row as usize) {
                self.remove_row(row as usize);
                removed += 1;
                end -= 1;
            } else {
                row += 1;
            }
        }
        removed
    }

    fn row_full(&self, row: usize) -> bool {
        self.cells[row].iter().all(|cell| cell.is_filled())
    }

    fn remove_row(&mut self, row: usize) {
        for y in row..GRID_TOP_ROW {
            self.cells[y] = self.cells[y + 1];
        }
        self.cells[GRID_TOP_ROW] = [Cell::Empty; GRID_WIDTH];
    }

    /// Game over once any settled cell reaches the top visible row
    pub fn is_game_over(&self) -> bool {
        self.cells[GRID_TOP_ROW].iter().any(|cell| cell.is_filled())
    }

    /// Try to translate the falling piece; refreshes the shadow on success
    pub fn move_falling(&mut self, dx: i32, dy: i32) -> bool {
        let mut piece = self.falling.clone();
        if !piece.shift(dx, dy, self) {
            return false;
        }
        self.falling = piece;
        self.refresh_shadow();
        true
    }

    /// Try to rotate the falling piece; refreshes the shadow on success
    pub fn rotate_falling(&mut self, direction: RotationDirection) -> bool {
        let mut piece = self.falling.clone();
        if !piece.rotate(direction, self) {
            return false;
        }
        self.falling = piece;
        self.refresh_shadow();
        true
    }

    /// Drop the falling piece to its resting row, returning rows travelled
    pub fn hard_drop_falling(&mut self) -> i32 {
        let mut piece = self.falling.clone();
        let rows = piece.hard_drop(self);
        if rows > 0 {
            self.falling = piece;
            self.refresh_shadow();
        }
        rows
    }

    /// 200 cell bytes, row major from the bottom row up
    pub fn encode_cells(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(GRID_CELLS);
        for row in &self.cells {
            for cell in row {
                out.push(cell.to_wire());
            }
        }
        out
    }

    /// Overwrite the matrix from snapshot bytes; false (untouched) when the
    /// buffer is short
    pub fn apply_cells(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() < GRID_CELLS {
            return false;
        }
        for (y, row) in self.cells.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = Cell::from_wire(bytes[y * GRID_WIDTH + x]);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockColor;
    use crate::protocol::PieceState;
    use crate::tetromino::Shape;

    fn grid() -> Grid {
        Grid::new(Piece::spawn(Shape::T, 0), Piece::spawn(Shape::O, 0))
    }

    fn fill_row(grid: &mut Grid, y: i32, except: &[i32]) {
        for x in 0..GRID_WIDTH as i32 {
            if !except.contains(&x) {
                grid.set_cell(x, y, Cell::Filled(BlockColor::Cyan));
            }
        }
    }

    #[test]
    fn test_new_grid_is_empty() {
        let grid = grid();
        for y in 0..GRID_HEIGHT as i32 {
            for x in 0..GRID_WIDTH as i32 {
                assert_eq!(grid.cell(x, y), Some(Cell::Empty));
            }
        }
    }

    #[test]
    fn test_cell_out_of_bounds() {
        let grid = grid();
        assert_eq!(grid.cell(-1, 0), None);
        assert_eq!(grid.cell(0, -1), None);
        assert_eq!(grid.cell(GRID_WIDTH as i32, 0), None);
        assert_eq!(grid.cell(0, GRID_HEIGHT as i32), None);
    }

    #[test]
    fn test_position_free_above_top_row() {
        let grid = grid();
        assert!(grid.position_free(4, GRID_HEIGHT as i32 + 2));
        assert!(!grid.position_free(4, -1));
        assert!(!grid.position_free(-1, 4));
    }

    #[test]
    fn test_lock_merges_blocks_into_matrix() {
        let mut grid = grid();
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 0,
            angle: 0,
            shape: Shape::T,
        }));
        let removed = grid.lock_falling();
        assert_eq!(removed, 0);
        assert_eq!(grid.cell(4, 0), Some(Cell::Filled(BlockColor::Purple)));
        assert_eq!(grid.cell(3, 0), Some(Cell::Filled(BlockColor::Purple)));
        assert_eq!(grid.cell(5, 0), Some(Cell::Filled(BlockColor::Purple)));
        assert_eq!(grid.cell(4, 1), Some(Cell::Filled(BlockColor::Purple)));
    }

    #[test]
    fn test_single_row_clear_compacts_downward() {
        let mut grid = grid();
        fill_row(&mut grid, 0, &[3, 4, 5, 6]);
        grid.set_cell(0, 1, Cell::Filled(BlockColor::Red));
        // Horizontal I fills the gap exactly
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 5,
            angle: 0,
            shape: Shape::I,
        }));
        grid.hard_drop_falling();
        let removed = grid.lock_falling();
        assert_eq!(removed, 1);
        // The red block from row 1 lands on row 0
        assert_eq!(grid.cell(0, 0), Some(Cell::Filled(BlockColor::Red)));
        assert_eq!(grid.cell(0, 1), Some(Cell::Empty));
    }

    #[test]
    fn test_double_row_clear() {
        let mut grid = grid();
        fill_row(&mut grid, 0, &[4, 5]);
        fill_row(&mut grid, 1, &[4, 5]);
        grid.set_cell(9, 2, Cell::Filled(BlockColor::Green));
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 6,
            angle: 0,
            shape: Shape::O,
        }));
        grid.hard_drop_falling();
        let removed = grid.lock_falling();
        assert_eq!(removed, 2);
        assert_eq!(grid.cell(9, 0), Some(Cell::Filled(BlockColor::Green)));
        assert_eq!(grid.cell(9, 2), Some(Cell::Empty));
    }

    #[test]
    fn test_clear_scans_only_locked_span() {
        let mut grid = grid();
        // A full row far below the locked piece survives; only the span the
        // lock touched is scanned.
        fill_row(&mut grid, 0, &[]);
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 10,
            angle: 0,
            shape: Shape::O,
        }));
        let removed = grid.lock_falling();
        assert_eq!(removed, 0);
        assert!(grid.cell(0, 0).is_some_and(|c| c.is_filled()));
    }

    #[test]
    fn test_relock_on_cleared_rows_is_noop() {
        let mut grid = grid();
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 0,
            angle: 0,
            shape: Shape::O,
        }));
        grid.lock_falling();
        let before = grid.encode_cells();
        // Same piece again on occupied cells: merge changes nothing, no row
        // fills, nothing is removed.
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 0,
            angle: 0,
            shape: Shape::O,
        }));
        assert_eq!(grid.lock_falling(), 0);
        assert_eq!(grid.encode_cells(), before);
    }

    #[test]
    fn test_game_over_when_top_row_occupied() {
        let mut grid = grid();
        assert!(!grid.is_game_over());
        grid.set_cell(0, GRID_TOP_ROW as i32, Cell::Filled(BlockColor::Blue));
        assert!(grid.is_game_over());
    }

    #[test]
    fn test_spawn_reports_collision() {
        let mut grid = grid();
        for x in 0..GRID_WIDTH as i32 {
            grid.set_cell(x, GRID_TOP_ROW as i32, Cell::Filled(BlockColor::Cyan));
        }
        assert!(!grid.spawn(Piece::spawn(Shape::I, 0)));
    }

    #[test]
    fn test_promote_next_buffers_refill() {
        let mut grid = grid();
        let next_shape = grid.next().shape();
        let refill = Piece::spawn(Shape::Z, 0);
        assert!(grid.promote_next(refill));
        assert_eq!(grid.falling().shape(), next_shape);
        assert_eq!(grid.next().shape(), Shape::Z);
    }

    #[test]
    fn test_shadow_tracks_falling_piece() {
        let mut grid = grid();
        grid.set_cell(4, 0, Cell::Filled(BlockColor::Red));
        grid.set_falling(Piece::from_state(PieceState {
            x: 4,
            y: 10,
            angle: 0,
            shape: Shape::O,
        }));
        // O at pivot (4,10) covers x 4..=5; the settled cell at (4,0) stops it
        let lowest = grid
            .shadow()
            .blocks()
            .iter()
            .map(|b| b.y)
            .fold(i32::MAX, i32::min);
        assert_eq!(lowest, 1);
    }

    #[test]
    fn test_cells_round_trip() {
        let mut grid = grid();
        grid.set_cell(0, 0, Cell::Filled(BlockColor::Red));
        grid.set_cell(9, 19, Cell::Filled(BlockColor::Orange));
        grid.set_cell(5, 7, Cell::Filled(BlockColor::Cyan));
        let bytes = grid.encode_cells();
        assert_eq!(bytes.len(), GRID_CELLS);

        let mut other = Grid::new(Piece::spawn(Shape::I, 0), Piece::spawn(Shape::O, 0));
        assert!(other.apply_cells(&bytes));
        for y in 0..GRID_HEIGHT as i32 {
            for x in 0..GRID_WIDTH as i32 {
                assert_eq!(grid.cell(x, y), other.cell(x, y), "({x},{y})");
            }
        }
    }

    #[test]
    fn test_apply_cells_rejects_short_buffer() {
        let mut grid = grid();
        grid.set_cell(3, 3, Cell::Filled(BlockColor::Green));
        assert!(!grid.apply_cells(&[0u8; GRID_CELLS - 1]));
        // Untouched on rejection
        assert_eq!(grid.cell(3, 3), Some(Cell::Filled(BlockColor::Green)));
    }

    #[test]
    fn test_take_next_modified_clears_flag() {
        let mut grid = grid();
        assert!(!grid.take_next_modified());
        grid.flag_next_modified();
        assert!(grid.take_next_modified());
        assert!(!grid.take_next_modified());
    }
}
