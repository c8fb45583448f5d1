//! Direction rule tables
//!
//! Map a signed pixel error on one axis to a coarse directional command.
//! Each table is an ordered list of disjoint ranges; the gap they leave
//! around zero is the dead band, where the table's stop token applies.

use crate::command::Command;
use std::ops::{Bound, RangeBounds};

/// Error magnitude separating "near" from "mid" buckets
pub const NEAR_LIMIT: f64 = 20.0;
/// Error magnitude separating "mid" from "far" buckets
pub const MID_LIMIT: f64 = 100.0;
/// Half-width of the dead band, inclusive
pub const DEAD_BAND: f64 = 1.0;

/// One range of the partition and the command it selects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionRule {
    pub bounds: (Bound<f64>, Bound<f64>),
    pub command: Command,
}

impl DirectionRule {
    pub fn contains(&self, value: f64) -> bool {
        self.bounds.contains(&value)
    }
}

/// Ordered rule table for one axis
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    rules: Vec<DirectionRule>,
    stop: Command,
}

impl RuleTable {
    /// Build a table from the six bucket commands, ordered from far-negative
    /// to far-positive.
    pub fn symmetric(commands: [Command; 6], stop: Command) -> Self {
        use Bound::{Excluded, Included, Unbounded};

        let [far_neg, mid_neg, near_neg, near_pos, mid_pos, far_pos] = commands;
        let rules = vec![
            rule((Unbounded, Excluded(-MID_LIMIT)), far_neg),
            rule((Included(-MID_LIMIT), Excluded(-NEAR_LIMIT)), mid_neg),
            rule((Included(-NEAR_LIMIT), Excluded(-DEAD_BAND)), near_neg),
            rule((Excluded(DEAD_BAND), Excluded(NEAR_LIMIT)), near_pos),
            rule((Included(NEAR_LIMIT), Excluded(MID_LIMIT)), mid_pos),
            rule((Included(MID_LIMIT), Unbounded), far_pos),
        ];
        Self { rules, stop }
    }

    /// Lateral table: negative error means the target sits left of center
    pub fn x_axis() -> Self {
        Self::symmetric(
            [
                Command::FarLeft,
                Command::MidLeft,
                Command::Left,
                Command::Right,
                Command::MidRight,
                Command::FarRight,
            ],
            Command::StopX,
        )
    }

    /// Vertical table, error positive upward
    pub fn y_axis() -> Self {
        Self::symmetric(
            [
                Command::FarTop,
                Command::MidTop,
                Command::Top,
                Command::Low,
                Command::MidLow,
                Command::FarLow,
            ],
            Command::StopY,
        )
    }

    pub fn rules(&self) -> &[DirectionRule] {
        &self.rules
    }

    pub fn stop(&self) -> Command {
        self.stop
    }

    /// First rule containing `value`, if any
    pub fn lookup(&self, value: f64) -> Option<Command> {
        self.rules
            .iter()
            .find(|rule| rule.contains(value))
            .map(|rule| rule.command)
    }

    /// Command for `value`; the stop token inside the dead band
    pub fn command_for(&self, value: f64) -> Command {
        self.lookup(value).unwrap_or(self.stop)
    }

    /// Check that rules are ordered, pairwise disjoint and all move the
    /// axis the stop token halts
    pub fn validate(&self) -> Result<(), String> {
        if !self.stop.is_stop() {
            return Err(format!("{} is not a stop command", self.stop));
        }
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.command.is_stop() || rule.command.axis() != self.stop.axis())
        {
            return Err(format!("{} does not belong with {}", rule.command, self.stop));
        }

        for pair in self.rules.windows(2) {
            let (upper, lower) = (pair[0].bounds.1, pair[1].bounds.0);
            let ordered = match (upper, lower) {
                (Bound::Excluded(a), Bound::Included(b)) => a <= b,
                (Bound::Excluded(a), Bound::Excluded(b))
                | (Bound::Included(a), Bound::Excluded(b)) => a <= b,
                (Bound::Included(a), Bound::Included(b)) => a < b,
                _ => false,
            };
            if !ordered {
                return Err(format!(
                    "rules for {} and {} overlap or are out of order",
                    pair[0].command, pair[1].command
                ));
            }
        }
        Ok(())
    }
}

fn rule(bounds: (Bound<f64>, Bound<f64>), command: Command) -> DirectionRule {
    DirectionRule { bounds, command }
}
