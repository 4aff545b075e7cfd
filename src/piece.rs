//! Active falling piece logic
//!
//! A piece is four blocks plus the shape/angle pair they encode. Movement
//! and rotation are all-or-nothing: a rejected attempt leaves the piece
//! untouched and reports failure through its return value.

use crate::block::Block;
use crate::grid::{GRID_TOP_ROW, Grid};
use crate::protocol::PieceState;
use crate::tetromino::{RotationDirection, Shape};

/// Column the pivot block spawns in
const SPAWN_COLUMN: i32 = 4;

/// The falling (or buffered, or shadow) piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    shape: Shape,
    angle: u8,
    blocks: [Block; 4],
}

impl Piece {
    /// Build a piece at spawn position: centered horizontally, lifted so its
    /// lowest block sits on the top visible row. Blocks above that row are
    /// legal until the piece descends into the playfield.
    pub fn spawn(shape: Shape, angle: u8) -> Self {
        let mut piece = Self::at_origin(shape, angle);
        let lowest = piece.blocks.iter().map(|b| b.y).fold(i32::MAX, i32::min);
        piece.translate(SPAWN_COLUMN, GRID_TOP_ROW as i32 - lowest);
        piece
    }

    /// Rebuild a piece from its wire projection
    pub fn from_state(state: PieceState) -> Self {
        let mut piece = Self::at_origin(state.shape, state.angle);
        piece.translate(state.x as i32, state.y as i32);
        piece
    }

    /// The wire projection: pivot position, angle, shape
    pub fn state(&self) -> PieceState {
        PieceState {
            x: self.blocks[0].x as u8,
            y: self.blocks[0].y as u8,
            angle: self.angle,
            shape: self.shape,
        }
    }

    fn at_origin(shape: Shape, angle: u8) -> Self {
        let color = shape.color();
        let mut blocks = shape.base_blocks().map(|(x, y)| Block::new(x, y, color));
        for _ in 0..angle % 4 {
            for block in &mut blocks {
                let (x, y) = (block.x, block.y);
                block.x = y;
                block.y = -x;
            }
        }
        Self {
            shape,
            angle: angle % 4,
            blocks,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }

    pub fn blocks(&self) -> &[Block; 4] {
        &self.blocks
    }

    /// Absolute (x, y) positions of all 4 blocks
    pub fn block_positions(&self) -> [(i32, i32); 4] {
        self.blocks.map(|b| (b.x, b.y))
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        for block in &mut self.blocks {
            block.x += dx;
            block.y += dy;
        }
    }

    /// Try to translate by (dx, dy); no mutation when any target cell is
    /// out of bounds or occupied
    pub fn shift(&mut self, dx: i32, dy: i32, grid: &Grid) -> bool {
        let target = self.blocks.map(|b| (b.x + dx, b.y + dy));
        if !grid.positions_free(&target) {
            return false;
        }
        self.translate(dx, dy);
        true
    }

    pub fn move_left(&mut self, grid: &Grid) -> bool {
        self.shift(-1, 0, grid)
    }

    pub fn move_right(&mut self, grid: &Grid) -> bool {
        self.shift(1, 0, grid)
    }

    pub fn move_down(&mut self, grid: &Grid) -> bool {
        self.shift(0, -1, grid)
    }

    /// Try to rotate 90 degrees about the pivot block.
    ///
    /// A candidate poking above the top row is first pulled straight down,
    /// then the computed position, one column left of it, and one column
    /// right of it are probed in that exact order. The order matters: both
    /// peers replay the same rotation and must land on the same candidate
    /// without ever exchanging the result.
    pub fn rotate(&mut self, direction: RotationDirection, grid: &Grid) -> bool {
        let pivot = self.blocks[0];
        let mut candidate = self.blocks.map(|b| {
            let (rx, ry) = (b.x - pivot.x, b.y - pivot.y);
            let (nx, ny) = match direction {
                RotationDirection::Clockwise => (ry, -rx),
                RotationDirection::CounterClockwise => (-ry, rx),
            };
            (pivot.x + nx, pivot.y + ny)
        });

        while candidate.iter().any(|&(_, y)| y > GRID_TOP_ROW as i32) {
            for pos in &mut candidate {
                pos.1 -= 1;
            }
        }

        for dx in [0, -1, 2] {
            for pos in &mut candidate {
                pos.0 += dx;
            }
            if grid.positions_free(&candidate) {
                let color = self.shape.color();
                for (block, &(x, y)) in self.blocks.iter_mut().zip(candidate.iter()) {
                    *block = Block::new(x, y, color);
                }
                self.angle = match direction {
                    RotationDirection::Clockwise => (self.angle + 1) % 4,
                    RotationDirection::CounterClockwise => (self.angle + 3) % 4,
                };
                return true;
            }
        }
        false
    }

    /// Move down as far as possible, returning the number of rows dropped
    pub fn hard_drop(&mut self, grid: &Grid) -> i32 {
        let mut rows = 0;
        while self.move_down(grid) {
            rows += 1;
        }
        rows
    }

    /// The shadow projection: this piece moved to its resting row
    pub fn dropped(&self, grid: &Grid) -> Piece {
        let mut shadow = self.clone();
        shadow.hard_drop(grid);
        shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Cell;
    use crate::tetromino::Shape;

    fn empty_grid() -> Grid {
        Grid::new(Piece::spawn(Shape::I, 0), Piece::spawn(Shape::O, 0))
    }

    fn relative_offsets(piece: &Piece) -> [(i32, i32); 4] {
        let pivot = piece.blocks()[0];
        piece.blocks().map(|b| (b.x - pivot.x, b.y - pivot.y))
    }

    #[test]
    fn test_spawn_touches_top_row() {
        for shape in Shape::all() {
            let piece = Piece::spawn(shape, 0);
            let lowest = piece
                .blocks()
                .iter()
                .map(|b| b.y)
                .fold(i32::MAX, i32::min);
            assert_eq!(lowest, GRID_TOP_ROW as i32, "{shape:?}");
        }
    }

    #[test]
    fn test_spawn_is_centered() {
        let piece = Piece::spawn(Shape::T, 0);
        assert_eq!(piece.blocks()[0].x, 4);
    }

    #[test]
    fn test_four_rotations_return_to_start() {
        let grid = empty_grid();
        for shape in Shape::all() {
            for angle in 0..4 {
                let mut piece = Piece::spawn(shape, angle);
                // Away from walls and the spawn overflow zone
                piece.shift(0, -8, &grid);
                let before = relative_offsets(&piece);
                for _ in 0..4 {
                    assert!(piece.rotate(RotationDirection::Clockwise, &grid));
                }
                assert_eq!(relative_offsets(&piece), before, "{shape:?}@{angle}");
                assert_eq!(piece.angle(), angle);
            }
        }
    }

    #[test]
    fn test_rotate_then_counter_rotate_is_identity() {
        let grid = empty_grid();
        let mut piece = Piece::spawn(Shape::J, 0);
        piece.shift(0, -10, &grid);
        let before = piece.clone();
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert!(piece.rotate(RotationDirection::CounterClockwise, &grid));
        assert_eq!(piece, before);
    }

    #[test]
    fn test_move_rejected_at_wall() {
        let grid = empty_grid();
        let mut piece = Piece::spawn(Shape::O, 0);
        piece.shift(0, -5, &grid);
        while piece.move_left(&grid) {}
        let pinned = piece.clone();
        assert!(!piece.move_left(&grid));
        assert_eq!(piece, pinned);
    }

    #[test]
    fn test_rotation_near_top_is_pulled_down() {
        let grid = empty_grid();
        // Vertical I straddling the spawn overflow zone
        let mut piece = Piece::spawn(Shape::I, 1);
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert!(
            piece.blocks().iter().all(|b| b.y <= GRID_TOP_ROW as i32),
            "rotation left blocks above the top row"
        );
        assert_eq!(piece.angle(), 2);
    }

    #[test]
    fn test_rotation_probes_left_column_first() {
        let mut grid = empty_grid();
        let mut piece = Piece::from_state(PieceState {
            x: 4,
            y: 5,
            angle: 0,
            shape: Shape::T,
        });
        // Block the in-place candidate; one column left stays open
        grid.set_cell(5, 5, Cell::Filled(Shape::T.color()));
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece.blocks()[0].x, 3);
        assert_eq!(piece.angle(), 1);
    }

    #[test]
    fn test_rotation_falls_back_to_right_column() {
        let mut grid = empty_grid();
        let mut piece = Piece::from_state(PieceState {
            x: 4,
            y: 5,
            angle: 0,
            shape: Shape::T,
        });
        // Block both the in-place and the left candidate
        grid.set_cell(4, 4, Cell::Filled(Shape::T.color()));
        grid.set_cell(3, 4, Cell::Filled(Shape::T.color()));
        assert!(piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece.blocks()[0].x, 5);
    }

    #[test]
    fn test_rotation_rejected_leaves_piece_unchanged() {
        let mut grid = empty_grid();
        let mut piece = Piece::from_state(PieceState {
            x: 4,
            y: 5,
            angle: 0,
            shape: Shape::T,
        });
        for x in 3..=6 {
            grid.set_cell(x, 4, Cell::Filled(Shape::I.color()));
            grid.set_cell(x, 6, Cell::Filled(Shape::I.color()));
        }
        let before = piece.clone();
        assert!(!piece.rotate(RotationDirection::Clockwise, &grid));
        assert_eq!(piece, before);
    }

    #[test]
    fn test_hard_drop_counts_rows() {
        let grid = empty_grid();
        let mut piece = Piece::spawn(Shape::I, 0);
        let rows = piece.hard_drop(&grid);
        assert_eq!(rows, GRID_TOP_ROW as i32);
        assert!(piece.blocks().iter().all(|b| b.y == 0));
    }

    #[test]
    fn test_shadow_projection_rests_on_floor() {
        let grid = empty_grid();
        let piece = Piece::spawn(Shape::O, 0);
        let shadow = piece.dropped(&grid);
        let lowest = shadow.blocks().iter().map(|b| b.y).fold(i32::MAX, i32::min);
        assert_eq!(lowest, 0);
        // The original is untouched
        assert_eq!(
            piece
                .blocks()
                .iter()
                .map(|b| b.y)
                .fold(i32::MAX, i32::min),
            GRID_TOP_ROW as i32
        );
    }

    #[test]
    fn test_state_round_trip() {
        for shape in Shape::all() {
            for angle in 0..4 {
                let grid = empty_grid();
                let mut piece = Piece::spawn(shape, angle);
                piece.shift(-2, -7, &grid);
                let rebuilt = Piece::from_state(piece.state());
                assert_eq!(rebuilt, piece, "{shape:?}@{angle}");
            }
        }
    }
}
