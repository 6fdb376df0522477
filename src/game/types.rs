//! Game value types and their wire formats.

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A hand shape thrown by either player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    /// All moves, in a stable order.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// The move this one defeats.
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Paper => Move::Rock,
            Move::Scissors => Move::Paper,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown move name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown move: {0}")]
pub struct UnknownMove(pub String);

impl FromStr for Move {
    type Err = UnknownMove;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            other => Err(UnknownMove(other.to_string())),
        }
    }
}

/// Result of one round, from the caller's perspective.
///
/// Serializes to the message shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    #[serde(rename = "You Won!")]
    Win,
    #[serde(rename = "You Lost!")]
    Lose,
    #[serde(rename = "You Draw!")]
    Draw,
}

impl Outcome {
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Win => "You Won!",
            Outcome::Lose => "You Lost!",
            Outcome::Draw => "You Draw!",
        }
    }

    /// Short label used in span attributes and logs.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lose => "lose",
            Outcome::Draw => "draw",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Request payload for a single round.
///
/// Decodes only from a JSON object. The `Form` key matches without regard to
/// ASCII case and other keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    #[serde(rename = "Form")]
    pub form: Move,
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(SelectionVisitor)
    }
}

struct SelectionVisitor;

impl<'de> Visitor<'de> for SelectionVisitor {
    type Value = Selection;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object with a Form field")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Selection, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut form = None;
        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case("form") {
                // Last one wins on repeated keys.
                form = Some(map.next_value::<Move>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        form.map(|form| Selection { form })
            .ok_or_else(|| de::Error::missing_field("Form"))
    }
}
