//! Tetromino definitions and their base block layouts
//!
//! Rotation is geometric (each block turned 90 degrees about the pivot
//! block), so all a shape needs to declare is its angle-0 layout.

use crate::block::BlockColor;

/// The 7 tetromino shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    I, // Cyan - long bar
    O, // Yellow - square
    T, // Purple - T-shape
    S, // Green - S-shape
    Z, // Red - Z-shape
    J, // Blue - J-shape
    L, // Orange - L-shape
}

impl Shape {
    /// The color for this shape; fully determined, never stored separately
    pub fn color(self) -> BlockColor {
        match self {
            Shape::I => BlockColor::Cyan,
            Shape::O => BlockColor::Yellow,
            Shape::T => BlockColor::Purple,
            Shape::S => BlockColor::Green,
            Shape::Z => BlockColor::Red,
            Shape::J => BlockColor::Blue,
            Shape::L => BlockColor::Orange,
        }
    }

    /// All shapes, for bag refills
    pub fn all() -> [Shape; 7] {
        [
            Shape::I,
            Shape::O,
            Shape::T,
            Shape::S,
            Shape::Z,
            Shape::J,
            Shape::L,
        ]
    }

    /// Wire index for this shape (0..=6)
    pub fn index(self) -> u8 {
        match self {
            Shape::I => 0,
            Shape::O => 1,
            Shape::T => 2,
            Shape::S => 3,
            Shape::Z => 4,
            Shape::J => 5,
            Shape::L => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<Shape> {
        match index {
            0 => Some(Shape::I),
            1 => Some(Shape::O),
            2 => Some(Shape::T),
            3 => Some(Shape::S),
            4 => Some(Shape::Z),
            5 => Some(Shape::J),
            6 => Some(Shape::L),
            _ => None,
        }
    }

    /// The four (x, y) block offsets at angle 0, x rightward, y upward.
    /// Element 0 is the rotation pivot and always sits at the origin.
    pub fn base_blocks(self) -> [(i32, i32); 4] {
        match self {
            Shape::I => [(0, 0), (-1, 0), (1, 0), (2, 0)],
            Shape::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            Shape::T => [(0, 0), (-1, 0), (1, 0), (0, 1)],
            Shape::S => [(0, 0), (-1, 0), (0, 1), (1, 1)],
            Shape::Z => [(0, 0), (1, 0), (0, 1), (-1, 1)],
            Shape::J => [(0, 0), (-1, 0), (1, 0), (-1, 1)],
            Shape::L => [(0, 0), (-1, 0), (1, 0), (1, 1)],
        }
    }
}

/// Direction for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}
