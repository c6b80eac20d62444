//! Game-master commands.
//!
//! `@item <name|#> <item> <amount>`, `@money <name|#> <delta>`, `@drop <item> <amount>`
//! and `@inventory <name|#>`. `#` targets the GM's own character. Results and errors
//! go back to the GM as `SAY` lines; nobody else is told.

use log::info;
use thiserror::Error;

use crate::inventory::ItemId;
use crate::logutil::escape_log;
use crate::protocol::ServerMessage;

use super::character::CharacterId;
use super::World;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GmTarget {
    Myself,
    Name(String),
}

impl GmTarget {
    fn parse(raw: &str) -> Self {
        if raw == "#" {
            Self::Myself
        } else {
            Self::Name(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GmCommand {
    Item {
        target: GmTarget,
        item: ItemId,
        amount: u32,
    },
    Money {
        target: GmTarget,
        delta: i64,
    },
    Drop {
        item: ItemId,
        amount: u32,
    },
    Inventory {
        target: GmTarget,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GmError {
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number {0}")]
    InvalidNumber(String),
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("unknown item {0}")]
    UnknownItem(ItemId),
    #[error("character {0} is not online")]
    NotOnline(String),
    #[error("you are not allowed to use GM commands")]
    NotPermitted,
}

const ITEM_USAGE: &str = "@item <name|#> <item> <amount>";
const MONEY_USAGE: &str = "@money <name|#> <delta>";
const DROP_USAGE: &str = "@drop <item> <amount>";
const INVENTORY_USAGE: &str = "@inventory <name|#>";

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, GmError> {
    raw.parse()
        .map_err(|_| GmError::InvalidNumber(raw.to_string()))
}

fn positive(raw: &str) -> Result<u32, GmError> {
    match number::<u32>(raw)? {
        0 => Err(GmError::ZeroAmount),
        n => Ok(n),
    }
}

/// Parse one `@...` line. Command names are case-insensitive.
pub fn parse(line: &str) -> Result<GmCommand, GmError> {
    let line = line.trim();
    let body = line.strip_prefix('@').unwrap_or(line);
    let parts: Vec<&str> = body.split_whitespace().collect();
    let Some((name, args)) = parts.split_first() else {
        return Err(GmError::UnknownCommand(String::new()));
    };

    match name.to_ascii_lowercase().as_str() {
        "item" => match args {
            [target, item, amount] => Ok(GmCommand::Item {
                target: GmTarget::parse(target),
                item: ItemId(number(item)?),
                amount: positive(amount)?,
            }),
            _ => Err(GmError::Usage(ITEM_USAGE)),
        },
        "money" => match args {
            [target, delta] => Ok(GmCommand::Money {
                target: GmTarget::parse(target),
                delta: number(delta)?,
            }),
            _ => Err(GmError::Usage(MONEY_USAGE)),
        },
        "drop" => match args {
            [item, amount] => Ok(GmCommand::Drop {
                item: ItemId(number(item)?),
                amount: positive(amount)?,
            }),
            _ => Err(GmError::Usage(DROP_USAGE)),
        },
        "inventory" | "inv" => match args {
            [target] => Ok(GmCommand::Inventory {
                target: GmTarget::parse(target),
            }),
            _ => Err(GmError::Usage(INVENTORY_USAGE)),
        },
        other => Err(GmError::UnknownCommand(other.to_string())),
    }
}

impl World {
    /// Parse and run a GM line from `gm`, replying with a `SAY`.
    pub fn handle_gm(&mut self, gm: CharacterId, line: &str) {
        let reply = match self.run_gm(gm, line) {
            Ok(text) => text,
            Err(err) => err.to_string(),
        };
        self.send(gm, ServerMessage::Say(reply));
    }

    fn resolve(&self, gm: CharacterId, target: &GmTarget) -> Result<CharacterId, GmError> {
        match target {
            GmTarget::Myself => Ok(gm),
            GmTarget::Name(name) => self
                .roster
                .by_name(name)
                .map(|c| c.id)
                .ok_or_else(|| GmError::NotOnline(name.clone())),
        }
    }

    fn run_gm(&mut self, gm: CharacterId, line: &str) -> Result<String, GmError> {
        let issuer = self.roster.get(gm).ok_or(GmError::NotPermitted)?;
        if !issuer.gm {
            return Err(GmError::NotPermitted);
        }
        let issuer_name = issuer.name.clone();
        let command = parse(line)?;
        info!(
            target: "trade",
            "gm {} ran {}",
            escape_log(&issuer_name),
            escape_log(line)
        );

        match command {
            GmCommand::Item {
                target,
                item,
                amount,
            } => {
                let class_name = self
                    .catalog
                    .get(item)
                    .map(|c| c.name.clone())
                    .ok_or(GmError::UnknownItem(item))?;
                let target = self.resolve(gm, &target)?;
                let Some(character) = self.roster.get_mut(target) else {
                    return Err(GmError::NotOnline(target.to_string()));
                };
                let left = character.inventory_mut(&self.catalog).insert(item, amount);
                let (name, map, position) =
                    (character.name.clone(), character.map, character.position);
                self.floor.drop_item(item, left, map, position);
                if left > 0 {
                    Ok(format!(
                        "gave {} x {} to {} ({} dropped on the floor)",
                        amount - left,
                        class_name,
                        name,
                        left
                    ))
                } else {
                    Ok(format!("gave {} x {} to {}", amount, class_name, name))
                }
            }
            GmCommand::Money { target, delta } => {
                let target = self.resolve(gm, &target)?;
                let Some(character) = self.roster.get_mut(target) else {
                    return Err(GmError::NotOnline(target.to_string()));
                };
                let mut txn = character.inventory_mut(&self.catalog);
                let changed = txn.change_money(delta);
                let balance = txn.view().money();
                drop(txn);
                if changed {
                    Ok(format!("{} now has {} money", character.name, balance))
                } else {
                    Ok(format!(
                        "{} has only {} money, nothing changed",
                        character.name, balance
                    ))
                }
            }
            GmCommand::Drop { item, amount } => {
                let class_name = self
                    .catalog
                    .get(item)
                    .map(|c| c.name.clone())
                    .ok_or(GmError::UnknownItem(item))?;
                let Some(character) = self.roster.get(gm) else {
                    return Err(GmError::NotPermitted);
                };
                let (map, position) = (character.map, character.position);
                self.floor.drop_item(item, amount, map, position);
                Ok(format!(
                    "dropped {} x {} at {},{}",
                    amount, class_name, position.x, position.y
                ))
            }
            GmCommand::Inventory { target } => {
                let target = self.resolve(gm, &target)?;
                let Some(character) = self.roster.get(target) else {
                    return Err(GmError::NotOnline(target.to_string()));
                };
                Ok(format!(
                    "{}: {}",
                    character.name,
                    ServerMessage::inventory_of(character.ledger())
                ))
            }
        }
    }
}
