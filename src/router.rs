//! Demultiplexes inbound frames into typed callbacks

use tracing::debug;

use crate::protocol::{GridSnapshot, Message, PiecePut, PieceState, PlayerStats};
use crate::tetromino::Shape;

/// Typed sinks, one per gameplay message. Implementors override what they
/// consume; everything else falls through to a no-op.
pub trait MessageHandler {
    fn on_piece(&mut self, _piece: PieceState) {}
    fn on_grid(&mut self, _snapshot: GridSnapshot) {}
    fn on_start(&mut self, _version: u8) {}
    fn on_restart(&mut self) {}
    fn on_pause(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_piece_put(&mut self, _put: PiecePut) {}
    fn on_next_piece(&mut self, _shape: Shape, _angle: u8) {}
    fn on_end(&mut self, _stats: PlayerStats) {}
    fn on_score(&mut self, _stats: PlayerStats) {}
    fn on_name(&mut self, _name: String) {}
    fn on_new_game(&mut self) {}
}

pub struct Router;

impl Router {
    /// Decode one frame and invoke exactly one callback. Unknown ids and
    /// short frames are dropped without touching any state; returns whether
    /// a callback ran.
    pub fn dispatch<H: MessageHandler>(frame: &[u8], handler: &mut H) -> bool {
        let Some(message) = Message::decode(frame) else {
            debug!(len = frame.len(), "dropping undecodable frame");
            return false;
        };
        match message {
            Message::Piece(piece) => handler.on_piece(piece),
            Message::Grid(snapshot) => handler.on_grid(snapshot),
            Message::Start { version } => handler.on_start(version),
            Message::Restart => handler.on_restart(),
            Message::Pause => handler.on_pause(),
            Message::Resume => handler.on_resume(),
            Message::PiecePut(put) => handler.on_piece_put(put),
            Message::NextPiece { shape, angle } => handler.on_next_piece(shape, angle),
            Message::End(stats) => handler.on_end(stats),
            Message::Score(stats) => handler.on_score(stats),
            Message::Name(name) => handler.on_name(name),
            Message::NewGame => handler.on_new_game(),
        }
        true
    }
}
