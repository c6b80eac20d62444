//! Line-oriented text protocol spoken over a TCP connection.
//!
//! One command per line. Keywords are case-insensitive and arguments are separated by
//! whitespace. Lines beginning with `@` are GM commands and are parsed by
//! [`crate::world::gm`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::inventory::{InventoryLedger, ItemStack};
use crate::trade::TradeNotice;
use crate::world::PublicId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Login { name: String },
    Trade { target: PublicId },
    Ack { initiator: PublicId },
    Add { slot: usize, amount: u32 },
    Money { amount: u32 },
    Accept,
    Cancel,
    Inventory,
    Who,
    Move { x: i32, y: i32 },
    Quit,
    /// Raw `@...` line.
    Gm(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("{command} needs <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{command}: invalid number {value}")]
    InvalidNumber { command: &'static str, value: String },
    #[error("{0} takes no further arguments")]
    UnexpectedArgument(&'static str),
    #[error("invalid name {0}: letters and digits only, at most 24")]
    InvalidName(String),
}

/// Longest character name accepted by `LOGIN`.
pub const MAX_NAME_LEN: usize = 24;

struct Args<'a> {
    command: &'static str,
    parts: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next_str(&mut self, argument: &'static str) -> Result<&'a str, ParseError> {
        self.parts.next().ok_or(ParseError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn next_num<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        let raw = self.next_str(argument)?;
        raw.parse().map_err(|_| ParseError::InvalidNumber {
            command: self.command,
            value: raw.to_string(),
        })
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.parts.next() {
            Some(_) => Err(ParseError::UnexpectedArgument(self.command)),
            None => Ok(()),
        }
    }
}

impl FromStr for ClientCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.starts_with('@') {
            return Ok(Self::Gm(line.to_string()));
        }
        let mut parts = line.split_whitespace();
        let keyword = parts.next().ok_or(ParseError::Empty)?.to_ascii_uppercase();
        let command: &'static str = match keyword.as_str() {
            "LOGIN" => "LOGIN",
            "TRADE" => "TRADE",
            "ACK" => "ACK",
            "ADD" => "ADD",
            "MONEY" => "MONEY",
            "ACCEPT" => "ACCEPT",
            "CANCEL" => "CANCEL",
            "INV" => "INV",
            "WHO" => "WHO",
            "MOVE" => "MOVE",
            "QUIT" => "QUIT",
            _ => return Err(ParseError::UnknownCommand(keyword)),
        };
        let mut args = Args { command, parts };

        let parsed = match command {
            "LOGIN" => {
                let name = args.next_str("name")?;
                if name.len() > MAX_NAME_LEN || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(ParseError::InvalidName(name.to_string()));
                }
                Self::Login {
                    name: name.to_string(),
                }
            }
            "TRADE" => Self::Trade {
                target: PublicId(args.next_num("publicId")?),
            },
            "ACK" => Self::Ack {
                initiator: PublicId(args.next_num("publicId")?),
            },
            "ADD" => Self::Add {
                slot: args.next_num("slot")?,
                amount: args.next_num("qty")?,
            },
            "MONEY" => Self::Money {
                amount: args.next_num("amount")?,
            },
            "ACCEPT" => Self::Accept,
            "CANCEL" => Self::Cancel,
            "INV" => Self::Inventory,
            "WHO" => Self::Who,
            "MOVE" => Self::Move {
                x: args.next_num("x")?,
                y: args.next_num("y")?,
            },
            _ => Self::Quit,
        };
        args.finish()?;
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome { public_id: PublicId, name: String },
    Trade(TradeNotice),
    Inventory {
        money: u32,
        stacks: Vec<(usize, ItemStack)>,
    },
    Who(Vec<(PublicId, String)>),
    Say(String),
    Error(String),
}

impl ServerMessage {
    /// `INVENTORY` line describing every occupied slot of `ledger`.
    pub fn inventory_of(ledger: &InventoryLedger) -> Self {
        Self::Inventory {
            money: ledger.money(),
            stacks: ledger.stacks().map(|(slot, stack)| (slot, *stack)).collect(),
        }
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome { public_id, name } => write!(f, "WELCOME {} {}", public_id, name),
            Self::Trade(notice) => match notice {
                TradeNotice::Request { initiator } => write!(f, "TRADE_REQUEST {}", initiator),
                TradeNotice::Start => f.write_str("TRADE_START"),
                TradeNotice::AddItem { item, amount } => {
                    write!(f, "TRADE_ADD_ITEM {} {}", item, amount)
                }
                TradeNotice::SetMoney { amount } => write!(f, "TRADE_SET_MONEY {}", amount),
                TradeNotice::Accept => f.write_str("TRADE_ACCEPT"),
                TradeNotice::Complete => f.write_str("TRADE_COMPLETE"),
                TradeNotice::Cancel => f.write_str("TRADE_CANCEL"),
            },
            Self::Inventory { money, stacks } => {
                write!(f, "INVENTORY {}", money)?;
                for (slot, stack) in stacks {
                    write!(f, " {}:{}x{}", slot, stack.item, stack.amount)?;
                }
                Ok(())
            }
            Self::Who(entries) => {
                f.write_str("WHO")?;
                for (public_id, name) in entries {
                    write!(f, " {}:{}", public_id, name)?;
                }
                Ok(())
            }
            Self::Say(text) => write!(f, "SAY {}", single_line(text)),
            Self::Error(text) => write!(f, "ERROR {}", single_line(text)),
        }
    }
}

impl From<TradeNotice> for ServerMessage {
    fn from(notice: TradeNotice) -> Self {
        Self::Trade(notice)
    }
}
