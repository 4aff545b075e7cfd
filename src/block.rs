//! Grid cells and the colored blocks that fill them

/// The seven block colors, one per shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockColor {
    Cyan,   // I
    Yellow, // O
    Purple, // T
    Green,  // S
    Red,    // Z
    Blue,   // J
    Orange, // L
}

impl BlockColor {
    /// Color index used on the wire (0..=6)
    pub fn index(self) -> u8 {
        match self {
            BlockColor::Cyan => 0,
            BlockColor::Yellow => 1,
            BlockColor::Purple => 2,
            BlockColor::Green => 3,
            BlockColor::Red => 4,
            BlockColor::Blue => 5,
            BlockColor::Orange => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<BlockColor> {
        match index {
            0 => Some(BlockColor::Cyan),
            1 => Some(BlockColor::Yellow),
            2 => Some(BlockColor::Purple),
            3 => Some(BlockColor::Green),
            4 => Some(BlockColor::Red),
            5 => Some(BlockColor::Blue),
            6 => Some(BlockColor::Orange),
            _ => None,
        }
    }
}

/// A single colored cell at integer grid coordinates.
///
/// Blocks are owned either by the falling piece or by the grid matrix,
/// never both: locking a piece copies its blocks into the matrix and
/// replaces the piece value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub color: BlockColor,
}

impl Block {
    pub fn new(x: i32, y: i32, color: BlockColor) -> Self {
        Self { x, y, color }
    }
}

/// A cell on the grid - either empty or filled with a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(BlockColor),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }

    /// Wire byte for this cell: 0 is the empty sentinel, 1..=7 a color index
    pub fn to_wire(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Filled(color) => color.index() + 1,
        }
    }

    /// Decode a wire byte; anything out of range reads as empty
    pub fn from_wire(byte: u8) -> Cell {
        match byte {
            0 => Cell::Empty,
            n => BlockColor::from_index(n - 1).map_or(Cell::Empty, Cell::Filled),
        }
    }
}
