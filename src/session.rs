//! The game session: two player models, the start/pause/reconnect
//! handshakes, and the per-tick frame policy
//!
//! A session is explicitly constructed by its owner and polled from one
//! thread; workers never touch it, they only hand bytes to the link
//! event channel the session drains. Plain moves ship a Piece frame,
//! locks ship a PiecePut plus a Score frame when the total changed, and
//! a game-over lock adds an End frame. Pause, start and reconnect are
//! small explicit state machines rather than rewired callbacks, which is
//! what keeps two near-simultaneous initiators from ping-ponging.

use std::sync::mpsc::Receiver;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::link::{ConnectionManager, LinkEvent, LinkState, Role};
use crate::piece::Piece;
use crate::player::Player;
use crate::protocol::{
    GridSnapshot, Message, PROTOCOL_VERSION, PiecePut, PieceState, PlayerStats,
};
use crate::router::{MessageHandler, Router};
use crate::tetromino::{RotationDirection, Shape};
use crate::transport::Transport;

/// Who paused, if anyone. A pause received from the peer must never be
/// re-broadcast, so origin is tracked instead of inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseState {
    #[default]
    Running,
    PausedLocal,
    PausedRemote,
}

/// What a gravity tick or drop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing happened (not playing, or paused)
    Idle,
    Moved,
    Locked { removed_rows: u32, game_over: bool },
}

/// Notifications surfaced to the session owner
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { role: Role },
    ConnectFailed { reason: String },
    ConnectionLost { reason: String },
    OpponentName(String),
    /// The peer sent a matching Start while we had not requested one yet
    OpponentReady,
    GameStarted,
    VersionMismatch { remote_version: u8 },
    OpponentPaused,
    OpponentResumed,
    /// The peer's falling piece moved or its grid was re-synced
    OpponentMoved,
    OpponentLocked { removed_rows: u32 },
    OpponentScore(PlayerStats),
    OpponentEnded(PlayerStats),
    OpponentNewGame,
    OpponentProposed(Shape),
    /// The peer wants to resume a dropped game; reply with `request_resume`
    OpponentReadyToResume,
    /// The reconnect handshake completed on this side
    SessionResumed,
}

pub struct Session<T: Transport> {
    link: ConnectionManager<T>,
    link_events: Receiver<LinkEvent>,
    local: Player,
    remote: Player,
    role: Option<Role>,
    started: bool,
    local_start: bool,
    remote_start: bool,
    local_restart: bool,
    remote_restart: bool,
    pause: PauseState,
    sent_score: i32,
    undelivered: Option<Vec<u8>>,
    outbox: Vec<SessionEvent>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, runtime: Handle, name: &str) -> Self {
        Self::with_seed(transport, runtime, name, rand::random())
    }

    pub fn with_seed(transport: T, runtime: Handle, name: &str, seed: u64) -> Self {
        let (link, link_events) = ConnectionManager::new(transport, runtime);
        Self {
            link,
            link_events,
            local: Player::with_seed(name, seed),
            remote: Player::with_seed("Opponent", seed.wrapping_add(1)),
            role: None,
            started: false,
            local_start: false,
            remote_start: false,
            local_restart: false,
            remote_restart: false,
            pause: PauseState::default(),
            sent_score: 0,
            undelivered: None,
            outbox: Vec::new(),
        }
    }

    pub fn local(&self) -> &Player {
        &self.local
    }

    pub fn remote(&self) -> &Player {
        &self.remote
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn pause_state(&self) -> PauseState {
        self.pause
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Advertise availability for an inbound connection
    pub fn listen(&self) {
        self.link.start();
    }

    /// Dial a peer
    pub fn dial(&self, address: &str) -> bool {
        self.link.connect(address)
    }

    /// Tear the link down; the session state survives for a later resume
    pub fn shutdown(&self) {
        self.link.stop();
    }

    /// Drain link events, decode frames, and return what changed.
    /// All game-state mutation happens here, on the caller's thread.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        while let Ok(event) = self.link_events.try_recv() {
            match event {
                LinkEvent::Connected { role } => self.on_connected(role),
                LinkEvent::ConnectFailed { reason } => {
                    self.outbox.push(SessionEvent::ConnectFailed { reason });
                }
                LinkEvent::ConnectionLost { reason, undelivered } => {
                    if undelivered.is_some() {
                        self.undelivered = undelivered;
                    }
                    self.outbox.push(SessionEvent::ConnectionLost { reason });
                }
                LinkEvent::Frame(frame) => {
                    Router::dispatch(&frame, self);
                }
            }
        }
        std::mem::take(&mut self.outbox)
    }

    fn on_connected(&mut self, role: Role) {
        self.role = Some(role);
        self.local_restart = false;
        self.remote_restart = false;
        if !self.started {
            self.local_start = false;
            self.remote_start = false;
        }
        self.send(Message::Name(self.local.name.clone()));
        self.outbox.push(SessionEvent::Connected { role });
    }

    /// Declare readiness to start. Begins play immediately when the peer
    /// already declared; otherwise waits for its Start frame.
    pub fn request_start(&mut self) {
        self.send(Message::Start {
            version: PROTOCOL_VERSION,
        });
        self.local_start = true;
        if self.remote_start {
            self.begin();
        }
    }

    fn begin(&mut self) {
        self.started = true;
        self.local_start = false;
        self.remote_start = false;
        self.pause = PauseState::Running;
        self.sent_score = self.local.score();
        info!("game started");
        self.outbox.push(SessionEvent::GameStarted);
    }

    /// Pause the game and tell the peer. False when not running.
    pub fn pause(&mut self) -> bool {
        if !self.started || self.pause != PauseState::Running {
            return false;
        }
        self.pause = PauseState::PausedLocal;
        self.send(Message::Pause);
        true
    }

    /// Resume from a pause, ours or theirs
    pub fn resume(&mut self) -> bool {
        if self.pause == PauseState::Running {
            return false;
        }
        self.pause = PauseState::Running;
        self.send(Message::Resume);
        true
    }

    /// Declare readiness to resume a dropped game. The side that receives
    /// a Restart after having sent its own treats the session as resumed.
    pub fn request_resume(&mut self) {
        self.send(Message::Restart);
        self.local_restart = true;
        if self.remote_restart {
            self.complete_resume();
        }
    }

    fn complete_resume(&mut self) {
        self.local_restart = false;
        self.remote_restart = false;
        if let Some(frame) = self.undelivered.take() {
            debug!("replaying undelivered frame after reconnect");
            self.link.send(frame);
        }
        self.sync_grid();
        info!("session resumed");
        self.outbox.push(SessionEvent::SessionResumed);
    }

    /// Push a full snapshot of the local playfield to the peer
    pub fn sync_grid(&mut self) {
        let snapshot = self.local.snapshot();
        self.send(Message::Grid(snapshot));
    }

    /// Reset both boards for a rematch and tell the peer
    pub fn new_game(&mut self) {
        self.local.reset();
        self.remote.reset();
        self.started = true;
        self.pause = PauseState::Running;
        self.sent_score = 0;
        self.send(Message::NewGame);
    }

    fn playing(&self) -> bool {
        self.started && self.pause == PauseState::Running && !self.local.is_game_over()
    }

    pub fn move_left(&mut self) -> bool {
        self.playing() && self.local.grid.move_falling(-1, 0) && self.piece_moved()
    }

    pub fn move_right(&mut self) -> bool {
        self.playing() && self.local.grid.move_falling(1, 0) && self.piece_moved()
    }

    pub fn rotate(&mut self, direction: RotationDirection) -> bool {
        self.playing() && self.local.grid.rotate_falling(direction) && self.piece_moved()
    }

    /// One manual down-step; credits soft-drop points
    pub fn soft_drop(&mut self) -> bool {
        if !self.playing() || !self.local.grid.move_falling(0, -1) {
            return false;
        }
        self.local.credit_soft_drop(1);
        self.piece_moved()
    }

    /// One gravity tick: move the falling piece down or lock it
    pub fn step_down(&mut self) -> StepOutcome {
        if !self.playing() {
            return StepOutcome::Idle;
        }
        if self.local.grid.move_falling(0, -1) {
            self.piece_moved();
            return StepOutcome::Moved;
        }
        self.lock_and_sync()
    }

    /// Drop to the resting row and lock immediately
    pub fn hard_drop(&mut self) -> StepOutcome {
        if !self.playing() {
            return StepOutcome::Idle;
        }
        let rows = self.local.grid.hard_drop_falling();
        if rows > 0 {
            self.local.credit_hard_drop(rows as u32);
        }
        self.lock_and_sync()
    }

    /// Queue a piece for the opponent to play. Mirrored locally so the
    /// `used_proposed` flag in their next PiecePut can advance the queue.
    pub fn propose_next(&mut self, shape: Shape, angle: u8) -> bool {
        if !self.remote.push_proposed(Piece::spawn(shape, angle)) {
            return false;
        }
        self.send(Message::NextPiece { shape, angle });
        true
    }

    fn piece_moved(&mut self) -> bool {
        let state = self.local.grid.falling().state();
        self.send(Message::Piece(state));
        true
    }

    fn lock_and_sync(&mut self) -> StepOutcome {
        let outcome = self.local.lock_falling();
        self.send(Message::PiecePut(PiecePut {
            old: outcome.old,
            new: outcome.new,
            used_proposed: outcome.used_proposed,
        }));
        // Scores travel in their own frame so a lost piece-put cannot
        // silently desync the totals
        if self.local.score() != self.sent_score {
            self.sent_score = self.local.score();
            self.send(Message::Score(self.local.stats()));
        }
        if outcome.game_over {
            info!(score = self.local.score(), "local game over");
            self.send(Message::End(self.local.stats()));
        }
        StepOutcome::Locked {
            removed_rows: outcome.removed_rows,
            game_over: outcome.game_over,
        }
    }

    fn send(&mut self, message: Message) -> bool {
        self.link.send(message.encode())
    }
}

impl<T: Transport> MessageHandler for Session<T> {
    fn on_piece(&mut self, piece: PieceState) {
        self.remote.apply_piece(piece);
        self.outbox.push(SessionEvent::OpponentMoved);
    }

    fn on_grid(&mut self, snapshot: GridSnapshot) {
        if self.remote.apply_snapshot(&snapshot) {
            self.outbox.push(SessionEvent::OpponentMoved);
        }
    }

    fn on_start(&mut self, version: u8) {
        if version != PROTOCOL_VERSION {
            warn!(
                local = PROTOCOL_VERSION,
                remote = version,
                "protocol version mismatch, back to listening"
            );
            self.local_start = false;
            self.remote_start = false;
            self.outbox.push(SessionEvent::VersionMismatch {
                remote_version: version,
            });
            self.link.start();
            return;
        }
        self.remote_start = true;
        if self.local_start {
            self.begin();
        } else {
            self.outbox.push(SessionEvent::OpponentReady);
        }
    }

    fn on_restart(&mut self) {
        self.remote_restart = true;
        if self.local_restart {
            self.complete_resume();
        } else {
            self.outbox.push(SessionEvent::OpponentReadyToResume);
        }
    }

    fn on_pause(&mut self) {
        // Not ours to re-broadcast; just record the origin
        if self.pause == PauseState::Running {
            self.pause = PauseState::PausedRemote;
            self.outbox.push(SessionEvent::OpponentPaused);
        }
    }

    fn on_resume(&mut self) {
        if self.pause != PauseState::Running {
            self.pause = PauseState::Running;
            self.outbox.push(SessionEvent::OpponentResumed);
        }
    }

    fn on_piece_put(&mut self, put: PiecePut) {
        let removed_rows = self.remote.apply_piece_put(&put);
        self.outbox
            .push(SessionEvent::OpponentLocked { removed_rows });
    }

    fn on_next_piece(&mut self, shape: Shape, angle: u8) {
        if self.local.push_proposed(Piece::spawn(shape, angle)) {
            self.outbox.push(SessionEvent::OpponentProposed(shape));
        } else {
            debug!(?shape, "proposal pool full, dropping");
        }
    }

    fn on_end(&mut self, stats: PlayerStats) {
        self.remote.apply_stats(stats);
        self.remote.set_game_over();
        self.outbox.push(SessionEvent::OpponentEnded(stats));
    }

    fn on_score(&mut self, stats: PlayerStats) {
        self.remote.apply_stats(stats);
        self.outbox.push(SessionEvent::OpponentScore(stats));
    }

    fn on_name(&mut self, name: String) {
        self.remote.name = name.clone();
        self.outbox.push(SessionEvent::OpponentName(name));
    }

    fn on_new_game(&mut self) {
        self.local.reset();
        self.remote.reset();
        self.started = true;
        self.pause = PauseState::Running;
        self.sent_score = 0;
        self.outbox.push(SessionEvent::OpponentNewGame);
    }
}
