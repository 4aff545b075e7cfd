//! A player: grid plus score, level and removed-row counters, the
//! proposed-piece pool, and the top-level gameplay codec entry points
//!
//! The same type models both sides of a match. The local player runs the
//! real simulation; the remote player is a mirror fed exclusively from
//! decoded frames, and its proposal pool tracks what we proposed to the
//! opponent so a `used_proposed` flag can advance it.

use std::collections::VecDeque;

use crate::bag::Bag;
use crate::grid::Grid;
use crate::piece::Piece;
use crate::protocol::{GridSnapshot, PiecePut, PieceState, PlayerStats};

pub const MAX_LEVEL: u32 = 30;
pub const MAX_PROPOSED: usize = 4;

/// Points per cleared-row count, multiplied by the current level
const ROW_SCORES: [i32; 5] = [0, 100, 300, 500, 800];

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    score: i32,
    level: u32,
    removed_rows: u32,
    pub grid: Grid,
    proposed: VecDeque<Piece>,
    bag: Bag,
    game_over: bool,
}

/// What a lock changed, for the owner and the sync layer
#[derive(Debug, Clone, Copy)]
pub struct LockOutcome {
    pub old: PieceState,
    pub new: PieceState,
    pub removed_rows: u32,
    pub used_proposed: bool,
    pub game_over: bool,
}

impl Player {
    pub fn new(name: &str) -> Self {
        Self::with_seed(name, rand::random())
    }

    /// Deterministic construction for tests and replays
    pub fn with_seed(name: &str, seed: u64) -> Self {
        let mut bag = Bag::with_seed(seed);
        let falling = Piece::spawn(bag.draw(), 0);
        let next = Piece::spawn(bag.draw(), 0);
        Self {
            name: name.to_string(),
            score: 0,
            level: 1,
            removed_rows: 0,
            grid: Grid::new(falling, next),
            proposed: VecDeque::new(),
            bag,
            game_over: false,
        }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn removed_rows(&self) -> u32 {
        self.removed_rows
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn set_game_over(&mut self) {
        self.game_over = true;
    }

    /// Credit a row clear: `{1:100, 2:300, 3:500, 4:800}` times the current
    /// level, then re-derive the level from the removed-row total. The level
    /// only ever climbs, and tops out at [`MAX_LEVEL`].
    pub fn credit_removed_rows(&mut self, rows: u32) {
        if rows == 0 || rows as usize >= ROW_SCORES.len() {
            return;
        }
        self.score += ROW_SCORES[rows as usize] * self.level as i32;
        self.removed_rows += rows;
        while self.removed_rows >= self.level * 10 && self.level < MAX_LEVEL {
            self.level += 1;
        }
    }

    pub fn credit_soft_drop(&mut self, rows: u32) {
        self.score += rows as i32 * self.level as i32;
    }

    pub fn credit_hard_drop(&mut self, rows: u32) {
        self.score += 2 * rows as i32 * self.level as i32;
    }

    /// Queue a piece this player must spawn next. Rejected beyond the pool
    /// cap of [`MAX_PROPOSED`].
    pub fn push_proposed(&mut self, piece: Piece) -> bool {
        if self.proposed.len() >= MAX_PROPOSED {
            return false;
        }
        self.proposed.push_back(piece);
        self.grid.flag_next_modified();
        true
    }

    pub fn proposed_len(&self) -> usize {
        self.proposed.len()
    }

    /// Settle the falling piece: merge, clear, credit, then spawn the
    /// replacement - off the proposal pool when one is queued, otherwise
    /// the buffered next piece with a fresh bag draw behind it.
    pub fn lock_falling(&mut self) -> LockOutcome {
        let old = self.grid.falling().state();
        let removed = self.grid.lock_falling();
        self.credit_removed_rows(removed);

        let (spawn_ok, used_proposed) = match self.proposed.pop_front() {
            Some(piece) => (self.grid.spawn(piece), true),
            None => {
                let refill = Piece::spawn(self.bag.draw(), 0);
                (self.grid.promote_next(refill), false)
            }
        };
        if !spawn_ok || self.grid.is_game_over() {
            self.game_over = true;
        }
        LockOutcome {
            old,
            new: self.grid.falling().state(),
            removed_rows: removed,
            used_proposed,
            game_over: self.game_over,
        }
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            score: self.score,
            level: self.level,
            removed_rows: self.removed_rows,
        }
    }

    pub fn apply_stats(&mut self, stats: PlayerStats) {
        self.score = stats.score;
        self.level = stats.level.clamp(1, MAX_LEVEL);
        self.removed_rows = stats.removed_rows;
    }

    /// Mirror a peer's falling piece
    pub fn apply_piece(&mut self, state: PieceState) {
        self.grid.set_falling(Piece::from_state(state));
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            cells: self.grid.encode_cells(),
            piece: self.grid.falling().state(),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &GridSnapshot) -> bool {
        if !self.grid.apply_cells(&snapshot.cells) {
            return false;
        }
        self.apply_piece(snapshot.piece);
        true
    }

    /// Replay a peer's lock from its pre-lock snapshot, then install the
    /// replacement it spawned. Score is not touched here: it travels in its
    /// own frame so a lost message cannot desync the totals.
    pub fn apply_piece_put(&mut self, put: &PiecePut) -> u32 {
        self.grid.set_falling(Piece::from_state(put.old));
        let removed = self.grid.lock_falling();
        self.grid.set_falling(Piece::from_state(put.new));
        if put.used_proposed {
            self.proposed.pop_front();
        }
        removed
    }

    /// Fresh board and counters for a rematch; the bag keeps its stream
    pub fn reset(&mut self) {
        let falling = Piece::spawn(self.bag.draw(), 0);
        let next = Piece::spawn(self.bag.draw(), 0);
        self.grid = Grid::new(falling, next);
        self.score = 0;
        self.level = 1;
        self.removed_rows = 0;
        self.proposed.clear();
        self.game_over = false;
    }
}
