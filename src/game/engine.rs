//! Round resolution.

use std::sync::Arc;

use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};

use crate::game::types::{Move, Outcome, Selection};
use crate::observability::metrics::ResultRecorder;

/// Resolve one round from the player's perspective.
pub fn decide(player: Move, opponent: Move) -> Outcome {
    if player == opponent {
        Outcome::Draw
    } else if player.beats() == opponent {
        Outcome::Win
    } else {
        Outcome::Lose
    }
}

/// Supplies the opponent's move for each round.
pub trait MoveSource: Send + Sync {
    fn next_move(&self) -> Move;
}

/// Always throws the same move.
#[derive(Debug, Clone, Copy)]
pub struct FixedMove(pub Move);

impl Default for FixedMove {
    fn default() -> Self {
        Self(Move::Paper)
    }
}

impl MoveSource for FixedMove {
    fn next_move(&self) -> Move {
        self.0
    }
}

/// Plays rounds and meters their outcomes.
#[derive(Clone)]
pub struct GameService {
    opponent: Arc<dyn MoveSource>,
    recorder: Arc<dyn ResultRecorder>,
}

impl GameService {
    pub fn new(opponent: Arc<dyn MoveSource>, recorder: Arc<dyn ResultRecorder>) -> Self {
        Self { opponent, recorder }
    }

    /// Play a round against the configured opponent.
    ///
    /// The round is attached to the span active in `cx` and the outcome is
    /// recorded before returning.
    pub fn shoot(&self, cx: &Context, selection: Selection) -> Outcome {
        let opponent = self.opponent.next_move();
        let outcome = decide(selection.form, opponent);

        let span = cx.span();
        span.set_attribute(KeyValue::new("roshambo.player_move", selection.form.as_str()));
        span.set_attribute(KeyValue::new("roshambo.opponent_move", opponent.as_str()));
        span.set_attribute(KeyValue::new("roshambo.outcome", outcome.label()));

        self.recorder.record_result(cx, outcome);

        tracing::debug!(
            player = %selection.form,
            opponent = %opponent,
            outcome = outcome.label(),
            "Round played"
        );

        outcome
    }
}
