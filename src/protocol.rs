//! The wire protocol: fixed-length, id-prefixed frames
//!
//! Every frame starts with a one-byte message id, and the id alone
//! determines the total frame length. A buffer shorter than its id's
//! length never decodes: torn reads on a lossy link must drop cleanly
//! instead of half-applying game state. Multi-byte integers travel
//! big-endian.

use crate::grid::GRID_CELLS;
use crate::tetromino::Shape;

/// Version byte carried by Start frames; peers must match exactly
pub const PROTOCOL_VERSION: u8 = 2;

/// UTF-16 code units in a Name frame, zero padded
pub const NAME_CHARS: usize = 32;

/// Message ids, one per frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Piece = 0,
    Grid = 1,
    Start = 2,
    Restart = 3,
    Pause = 4,
    Resume = 5,
    PiecePut = 6,
    NextPiece = 7,
    End = 8,
    Score = 9,
    Name = 10,
    NewGame = 11,
}

impl MessageId {
    pub fn from_byte(byte: u8) -> Option<MessageId> {
        match byte {
            0 => Some(MessageId::Piece),
            1 => Some(MessageId::Grid),
            2 => Some(MessageId::Start),
            3 => Some(MessageId::Restart),
            4 => Some(MessageId::Pause),
            5 => Some(MessageId::Resume),
            6 => Some(MessageId::PiecePut),
            7 => Some(MessageId::NextPiece),
            8 => Some(MessageId::End),
            9 => Some(MessageId::Score),
            10 => Some(MessageId::Name),
            11 => Some(MessageId::NewGame),
            _ => None,
        }
    }

    /// Total frame length for this id, including the id byte
    pub fn frame_len(self) -> usize {
        match self {
            MessageId::Piece => 5,
            MessageId::Grid => 1 + GRID_CELLS + 4,
            MessageId::Start => 2,
            MessageId::Restart => 1,
            MessageId::Pause => 1,
            MessageId::Resume => 1,
            MessageId::PiecePut => 10,
            MessageId::NextPiece => 3,
            MessageId::End => 13,
            MessageId::Score => 13,
            MessageId::Name => 1 + NAME_CHARS * 2,
            MessageId::NewGame => 1,
        }
    }
}

/// The 4-byte wire projection of a piece: pivot position, angle, shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceState {
    pub x: u8,
    pub y: u8,
    pub angle: u8,
    pub shape: Shape,
}

impl PieceState {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.x);
        out.push(self.y);
        out.push(self.angle);
        out.push(self.shape.index());
    }

    fn read(bytes: &[u8]) -> Option<PieceState> {
        Some(PieceState {
            x: *bytes.first()?,
            y: *bytes.get(1)?,
            angle: *bytes.get(2)? % 4,
            shape: Shape::from_index(*bytes.get(3)?)?,
        })
    }
}

/// Score, level and removed-row counters as carried by End/Score frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub score: i32,
    pub level: u32,
    pub removed_rows: u32,
}

impl PlayerStats {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.score.to_be_bytes());
        out.extend_from_slice(&self.level.to_be_bytes());
        out.extend_from_slice(&self.removed_rows.to_be_bytes());
    }

    fn read(bytes: &[u8]) -> Option<PlayerStats> {
        Some(PlayerStats {
            score: i32::from_be_bytes(bytes.get(0..4)?.try_into().ok()?),
            level: u32::from_be_bytes(bytes.get(4..8)?.try_into().ok()?),
            removed_rows: u32::from_be_bytes(bytes.get(8..12)?.try_into().ok()?),
        })
    }
}

/// A lock event: the settled piece, its replacement, and whether the
/// replacement came off the opponent's proposal channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiecePut {
    pub old: PieceState,
    pub new: PieceState,
    pub used_proposed: bool,
}

/// A full playfield snapshot plus the falling piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    /// 200 cell bytes, row major from the bottom row up
    pub cells: Vec<u8>,
    pub piece: PieceState,
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Piece(PieceState),
    Grid(GridSnapshot),
    Start { version: u8 },
    Restart,
    Pause,
    Resume,
    PiecePut(PiecePut),
    NextPiece { shape: Shape, angle: u8 },
    End(PlayerStats),
    Score(PlayerStats),
    Name(String),
    NewGame,
}

impl Message {
    pub fn id(&self) -> MessageId {
        match self {
            Message::Piece(_) => MessageId::Piece,
            Message::Grid(_) => MessageId::Grid,
            Message::Start { .. } => MessageId::Start,
            Message::Restart => MessageId::Restart,
            Message::Pause => MessageId::Pause,
            Message::Resume => MessageId::Resume,
            Message::PiecePut(_) => MessageId::PiecePut,
            Message::NextPiece { .. } => MessageId::NextPiece,
            Message::End(_) => MessageId::End,
            Message::Score(_) => MessageId::Score,
            Message::Name(_) => MessageId::Name,
            Message::NewGame => MessageId::NewGame,
        }
    }

    /// Serialize to exactly `self.id().frame_len()` bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.id().frame_len());
        out.push(self.id() as u8);
        match self {
            Message::Piece(piece) => piece.write(&mut out),
            Message::Grid(snapshot) => {
                for i in 0..GRID_CELLS {
                    out.push(snapshot.cells.get(i).copied().unwrap_or(0));
                }
                snapshot.piece.write(&mut out);
            }
            Message::Start { version } => out.push(*version),
            Message::Restart | Message::Pause | Message::Resume | Message::NewGame => {}
            Message::PiecePut(put) => {
                put.old.write(&mut out);
                put.new.write(&mut out);
                out.push(put.used_proposed as u8);
            }
            Message::NextPiece { shape, angle } => {
                out.push(shape.index());
                out.push(angle % 4);
            }
            Message::End(stats) | Message::Score(stats) => stats.write(&mut out),
            Message::Name(name) => {
                let mut units: Vec<u16> = name.encode_utf16().take(NAME_CHARS).collect();
                units.resize(NAME_CHARS, 0);
                for unit in units {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        debug_assert_eq!(out.len(), self.id().frame_len());
        out
    }

    /// Decode one frame. None for unknown ids, short buffers, or payload
    /// bytes outside their domain; never panics, never partially applies.
    pub fn decode(frame: &[u8]) -> Option<Message> {
        let id = MessageId::from_byte(*frame.first()?)?;
        if frame.len() < id.frame_len() {
            return None;
        }
        let body = &frame[1..];
        match id {
            MessageId::Piece => Some(Message::Piece(PieceState::read(body)?)),
            MessageId::Grid => Some(Message::Grid(GridSnapshot {
                cells: body.get(..GRID_CELLS)?.to_vec(),
                piece: PieceState::read(body.get(GRID_CELLS..)?)?,
            })),
            MessageId::Start => Some(Message::Start {
                version: *body.first()?,
            }),
            MessageId::Restart => Some(Message::Restart),
            MessageId::Pause => Some(Message::Pause),
            MessageId::Resume => Some(Message::Resume),
            MessageId::PiecePut => Some(Message::PiecePut(PiecePut {
                old: PieceState::read(body)?,
                new: PieceState::read(body.get(4..)?)?,
                used_proposed: *body.get(8)? != 0,
            })),
            MessageId::NextPiece => Some(Message::NextPiece {
                shape: Shape::from_index(*body.first()?)?,
                angle: *body.get(1)? % 4,
            }),
            MessageId::End => Some(Message::End(PlayerStats::read(body)?)),
            MessageId::Score => Some(Message::Score(PlayerStats::read(body)?)),
            MessageId::Name => {
                let mut units = Vec::with_capacity(NAME_CHARS);
                for chunk in body.get(..NAME_CHARS * 2)?.chunks_exact(2) {
                    let unit = u16::from_be_bytes([chunk[0], chunk[1]]);
                    if unit == 0 {
                        break;
                    }
                    units.push(unit);
                }
                Some(Message::Name(String::from_utf16_lossy(&units)))
            }
            MessageId::NewGame => Some(Message::NewGame),
        }
    }
}

/// Reassembles id-delimited frames from an arbitrarily chunked byte stream.
/// Frames come out in arrival order; an unrecognized id byte is skipped to
/// resynchronize.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, or None until more bytes arrive
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let first = *self.buf.first()?;
            let Some(id) = MessageId::from_byte(first) else {
                self.buf.remove(0);
                continue;
            };
            let len = id.frame_len();
            if self.buf.len() < len {
                return None;
            }
            return Some(self.buf.drain(..len).collect());
        }
    }
}
