//! Outbound trade events and the channel they are pushed through.

use crate::inventory::ItemId;
use crate::world::{CharacterId, PublicId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeNotice {
    /// Someone wants to trade; carries the initiator's public id.
    Request { initiator: PublicId },
    Start,
    /// The counterpart offered this item. Slot indices never leave the server.
    AddItem { item: ItemId, amount: u32 },
    SetMoney { amount: u32 },
    /// The counterpart accepted the current offers.
    Accept,
    Complete,
    Cancel,
}

/// Per-character reliable delivery of trade notices.
pub trait Notifier {
    fn notify(&mut self, to: CharacterId, notice: TradeNotice);
}

/// Notices queued during one dispatch, drained by the transport afterwards.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<(CharacterId, TradeNotice)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_all(&mut self) -> Vec<(CharacterId, TradeNotice)> {
        std::mem::take(&mut self.pending)
    }

    /// Remove and return the notices addressed to `who`, keeping everyone else's queued.
    pub fn take_for(&mut self, who: CharacterId) -> Vec<TradeNotice> {
        let mut mine = Vec::new();
        self.pending.retain(|(to, notice)| {
            if *to == who {
                mine.push(*notice);
                false
            } else {
                true
            }
        });
        mine
    }

    pub fn pending(&self) -> &[(CharacterId, TradeNotice)] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Notifier for Outbox {
    fn notify(&mut self, to: CharacterId, notice: TradeNotice) {
        self.pending.push((to, notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_for_keeps_other_recipients() {
        let mut outbox = Outbox::new();
        outbox.notify(CharacterId(1), TradeNotice::Start);
        outbox.notify(CharacterId(2), TradeNotice::Start);
        outbox.notify(CharacterId(1), TradeNotice::Accept);

        assert_eq!(
            outbox.take_for(CharacterId(1)),
            vec![TradeNotice::Start, TradeNotice::Accept]
        );
        assert_eq!(outbox.pending(), &[(CharacterId(2), TradeNotice::Start)]);
    }
}
