//! Wire command tokens understood by the robot controller

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis a command acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Lateral image axis
    X,
    /// Vertical image axis
    Y,
    /// Head rotation
    Rz,
}

/// A single command sent to the robot.
///
/// Every variant maps to one newline-free ASCII token. The robot does not
/// acknowledge commands, so a token is the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Command {
    FarLeft,
    MidLeft,
    Left,
    Right,
    MidRight,
    FarRight,
    FarTop,
    MidTop,
    Top,
    Low,
    MidLow,
    FarLow,
    StopX,
    StopY,
    StopZ,
    RotatePositive,
    RotateNegative,
    StopRotation,
    Disconnected,
}

impl Command {
    pub const ALL: [Command; 19] = [
        Command::FarLeft,
        Command::MidLeft,
        Command::Left,
        Command::Right,
        Command::MidRight,
        Command::FarRight,
        Command::FarTop,
        Command::MidTop,
        Command::Top,
        Command::Low,
        Command::MidLow,
        Command::FarLow,
        Command::StopX,
        Command::StopY,
        Command::StopZ,
        Command::RotatePositive,
        Command::RotateNegative,
        Command::StopRotation,
        Command::Disconnected,
    ];

    /// Exact token written on the wire
    pub fn token(&self) -> &'static str {
        match self {
            Command::FarLeft => "lleft",
            Command::MidLeft => "mleft",
            Command::Left => "left",
            Command::Right => "right",
            Command::MidRight => "mright",
            Command::FarRight => "lright",
            Command::FarTop => "ltop",
            Command::MidTop => "mtop",
            Command::Top => "top",
            Command::Low => "low",
            Command::MidLow => "mlow",
            Command::FarLow => "llow",
            Command::StopX => "stopx",
            Command::StopY => "stopy",
            Command::StopZ => "stopz",
            Command::RotatePositive => "rzP",
            Command::RotateNegative => "rzM",
            Command::StopRotation => "stopc",
            Command::Disconnected => "disconnected",
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            Command::StopX | Command::StopY | Command::StopZ | Command::StopRotation
        )
    }

    /// Axis the command moves or stops. `stopz` and `disconnected` are not
    /// tied to a single image axis.
    pub fn axis(&self) -> Option<Axis> {
        match self {
            Command::FarLeft
            | Command::MidLeft
            | Command::Left
            | Command::Right
            | Command::MidRight
            | Command::FarRight
            | Command::StopX => Some(Axis::X),
            Command::FarTop
            | Command::MidTop
            | Command::Top
            | Command::Low
            | Command::MidLow
            | Command::FarLow
            | Command::StopY => Some(Axis::Y),
            Command::RotatePositive | Command::RotateNegative | Command::StopRotation => {
                Some(Axis::Rz)
            }
            Command::StopZ | Command::Disconnected => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|command| command.token() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

impl TryFrom<String> for Command {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.token().to_string()
    }
}
