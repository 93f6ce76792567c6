//! Service-data command lines.
//!
//! The kernel renders every configuration or state change as one text line:
//!
//! ```text
//! [seq] <node> write <index> <sub> <type> <value>
//! [seq] <node> start | preop | reset
//! ```
//!
//! Indices are hexadecimal, unsigned values are rendered in hexadecimal and
//! signed values in decimal. The parser accepts either radix everywhere so
//! that hand-written scenario files stay readable.

use crate::drive::{DataType, NodeId, ObjectEntry};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Network management command for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NmtCommand {
    /// Enter OPERATIONAL (PDOs active).
    Start,
    /// Enter PRE-OPERATIONAL (SDO only).
    PreOperational,
    /// Reset the node application.
    ResetNode,
}

impl NmtCommand {
    const fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PreOperational => "preop",
            Self::ResetNode => "reset",
        }
    }
}

/// One bus command, without its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusCommand {
    /// Object dictionary download.
    Write {
        node: NodeId,
        index: u16,
        sub: u8,
        data_type: DataType,
        value: i64,
    },
    Nmt { node: NodeId, command: NmtCommand },
}

impl BusCommand {
    pub const fn write(node: NodeId, index: u16, sub: u8, data_type: DataType, value: i64) -> Self {
        Self::Write {
            node,
            index,
            sub,
            data_type,
            value,
        }
    }

    /// Write to a well-known object dictionary entry (subindex 0).
    pub const fn write_entry(node: NodeId, entry: ObjectEntry, value: i64) -> Self {
        Self::write(node, entry.index(), 0, entry.data_type(), value)
    }

    pub const fn nmt(node: NodeId, command: NmtCommand) -> Self {
        Self::Nmt { node, command }
    }

    #[inline]
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Write { node, .. } | Self::Nmt { node, .. } => *node,
        }
    }

    /// Render with a sequence number.
    pub fn render(&self, seq: u32) -> String {
        SequencedCommand { seq, command: *self }.to_string()
    }
}

/// A parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencedCommand {
    pub seq: u32,
    pub command: BusCommand,
}

impl fmt::Display for SequencedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command {
            BusCommand::Write {
                node,
                index,
                sub,
                data_type,
                value,
            } => {
                write!(
                    f,
                    "[{}] {} write 0x{:04X} {} {} ",
                    self.seq,
                    node,
                    index,
                    sub,
                    data_type.token()
                )?;
                if data_type.is_signed() {
                    write!(f, "{value}")
                } else {
                    write!(f, "0x{value:X}")
                }
            }
            BusCommand::Nmt { node, command } => {
                write!(f, "[{}] {} {}", self.seq, node, command.verb())
            }
        }
    }
}

/// Error returned when a command line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command line")]
    Empty,

    #[error("malformed sequence number '{0}'")]
    BadSequence(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("malformed number '{0}'")]
    BadNumber(String),

    #[error("unknown command '{0}'")]
    UnknownVerb(String),

    #[error("unknown data type '{0}'")]
    UnknownType(String),

    #[error("value {value} does not fit {data_type:?}")]
    OutOfRange { value: i64, data_type: DataType },

    #[error("unexpected trailing input '{0}'")]
    Trailing(String),
}

/// Parse a decimal or `0x` hexadecimal integer with optional sign.
fn parse_number(token: &str) -> Result<i64, CommandParseError> {
    let bad = || CommandParseError::BadNumber(token.to_string());
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| bad())?,
        None => digits.parse::<i64>().map_err(|_| bad())?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_bounded<T: TryFrom<i64>>(token: &str) -> Result<T, CommandParseError> {
    T::try_from(parse_number(token)?).map_err(|_| CommandParseError::BadNumber(token.to_string()))
}

impl FromStr for SequencedCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let seq_token = tokens.next().ok_or(CommandParseError::Empty)?;
        let seq = seq_token
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| CommandParseError::BadSequence(seq_token.to_string()))?;

        let node: NodeId = parse_bounded(tokens.next().ok_or(CommandParseError::MissingField("node"))?)?;
        let verb = tokens.next().ok_or(CommandParseError::MissingField("command"))?;

        let command = match verb {
            "write" => {
                let index: u16 =
                    parse_bounded(tokens.next().ok_or(CommandParseError::MissingField("index"))?)?;
                let sub: u8 =
                    parse_bounded(tokens.next().ok_or(CommandParseError::MissingField("sub"))?)?;
                let type_token = tokens.next().ok_or(CommandParseError::MissingField("type"))?;
                let data_type = DataType::from_token(type_token)
                    .ok_or_else(|| CommandParseError::UnknownType(type_token.to_string()))?;
                let value =
                    parse_number(tokens.next().ok_or(CommandParseError::MissingField("value"))?)?;
                if !data_type.fits(value) {
                    return Err(CommandParseError::OutOfRange { value, data_type });
                }
                BusCommand::write(node, index, sub, data_type, value)
            }
            "start" => BusCommand::nmt(node, NmtCommand::Start),
            "preop" => BusCommand::nmt(node, NmtCommand::PreOperational),
            "reset" => BusCommand::nmt(node, NmtCommand::ResetNode),
            other => return Err(CommandParseError::UnknownVerb(other.to_string())),
        };

        if let Some(extra) = tokens.next() {
            return Err(CommandParseError::Trailing(extra.to_string()));
        }
        Ok(Self { seq, command })
    }
}
