//! duotris - a two-player falling-block duel over a half-duplex byte link
//!
//! One half of the crate is a deterministic game engine: blocks, the
//! seven tetrominoes, a per-player 7-bag randomizer, piece movement and
//! rotation legality, line clearing, scoring and leveling. The other half
//! keeps two independently advancing simulations consistent across an
//! unreliable point-to-point link: a fixed-length binary frame protocol,
//! a connection state machine with listener/connector/transfer workers,
//! a router that turns inbound frames into typed callbacks, and a session
//! layer that runs the start, pause and reconnect handshakes.
//!
//! Rendering, input devices, dialogs and the physical radio are the
//! embedding application's business. It supplies a [`transport::Transport`]
//! and drives a [`session::Session`] from its game loop.

pub mod bag;
pub mod block;
pub mod grid;
pub mod link;
pub mod piece;
pub mod player;
pub mod protocol;
pub mod router;
pub mod session;
pub mod tetromino;
pub mod transport;

pub use link::{ConnectionManager, LinkEvent, LinkState, Role};
pub use player::Player;
pub use protocol::{Message, PROTOCOL_VERSION};
pub use session::{PauseState, Session, SessionEvent, StepOutcome};
pub use tetromino::{RotationDirection, Shape};
pub use transport::{MemTransport, Transport, mem_pair};
