//! Two-party trade state machine.
//!
//! ```text
//!  request ──► Init ──ack──► Run ◄──offer──┐
//!               │             │ accept     │
//!               │ bad ack     ▼            │
//!               │            Exit ─────────┘
//!               ▼             │ counterpart accepts
//!           Cancelled ◄─fail──┴──ok──► Settled
//! ```
//!
//! The session never destroys itself. Every handler returns a [`Transition`] and the
//! owner (the [`SessionRegistry`](super::SessionRegistry)) drops the session once it
//! reports [`Transition::Ended`].

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::inventory::ItemCatalog;
use crate::metrics;
use crate::world::{CharacterId, PublicId};

use super::notice::{Notifier, TradeNotice};
use super::offer::{OfferEntry, OfferList};
use super::settlement::{settle, SettlementError, SettlementSide};
use super::{TradeEvent, TradeId, TradeParties};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    /// Request sent, waiting for the responder's acknowledgement.
    Init,
    /// Both sides may change their offers.
    Run,
    /// One side accepted the current offers and waits for the other.
    Exit,
    Settled,
    Cancelled,
}

impl TradeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Settled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Ended(SessionEnd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Responder,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

#[derive(Debug, Clone)]
struct Participant {
    id: CharacterId,
    public_id: PublicId,
    offers: OfferList,
}

#[derive(Debug, Clone)]
pub struct TradeSession {
    id: TradeId,
    initiator: Participant,
    responder: Participant,
    state: TradeState,
    /// Side whose acceptance moved the session to `Exit`.
    accepted_by: Option<Side>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl TradeSession {
    /// Open a session in `Init` and send the request to the responder.
    pub fn request(
        id: TradeId,
        initiator: (CharacterId, PublicId),
        responder: (CharacterId, PublicId),
        max_offer_entries: usize,
        out: &mut dyn Notifier,
    ) -> Self {
        let now = Utc::now();
        out.notify(
            responder.0,
            TradeNotice::Request {
                initiator: initiator.1,
            },
        );
        Self {
            id,
            initiator: Participant {
                id: initiator.0,
                public_id: initiator.1,
                offers: OfferList::new(max_offer_entries),
            },
            responder: Participant {
                id: responder.0,
                public_id: responder.1,
                offers: OfferList::new(max_offer_entries),
            },
            state: TradeState::Init,
            accepted_by: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> TradeId {
        self.id
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn initiator(&self) -> CharacterId {
        self.initiator.id
    }

    pub fn responder(&self) -> CharacterId {
        self.responder.id
    }

    pub fn accepted_by(&self) -> Option<Side> {
        self.accepted_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn side_of(&self, who: CharacterId) -> Option<Side> {
        if who == self.initiator.id {
            Some(Side::Initiator)
        } else if who == self.responder.id {
            Some(Side::Responder)
        } else {
            None
        }
    }

    pub fn offers(&self, side: Side) -> &OfferList {
        &self.participant(side).offers
    }

    pub fn character(&self, side: Side) -> CharacterId {
        self.participant(side).id
    }

    fn participant(&self, side: Side) -> &Participant {
        match side {
            Side::Initiator => &self.initiator,
            Side::Responder => &self.responder,
        }
    }

    fn participant_mut(&mut self, side: Side) -> &mut Participant {
        match side {
            Side::Initiator => &mut self.initiator,
            Side::Responder => &mut self.responder,
        }
    }

    /// Route one inbound event from `who`.
    pub fn handle(
        &mut self,
        who: CharacterId,
        event: TradeEvent,
        parties: &mut dyn TradeParties,
        catalog: &ItemCatalog,
        out: &mut dyn Notifier,
    ) -> Transition {
        if let Some(end) = self.ended() {
            return Transition::Ended(end);
        }
        self.last_activity = Utc::now();
        match event {
            TradeEvent::RequestAck { initiator } => self.acknowledge(who, initiator, out),
            TradeEvent::AddItem { slot, amount } => self.add_offer(who, slot, amount, parties, out),
            TradeEvent::SetMoney { amount } => self.set_money(who, amount, out),
            TradeEvent::Accept => self.accept(who, parties, catalog, out),
            TradeEvent::Cancel => self.cancel(Some(who), out),
        }
    }

    fn ended(&self) -> Option<SessionEnd> {
        match self.state {
            TradeState::Settled => Some(SessionEnd::Settled),
            TradeState::Cancelled => Some(SessionEnd::Cancelled),
            _ => None,
        }
    }

    /// Responder confirms the request. Anything but a matching ack from the responder
    /// while in `Init` tears the session down so a fresh request can start cleanly.
    pub fn acknowledge(
        &mut self,
        who: CharacterId,
        initiator: PublicId,
        out: &mut dyn Notifier,
    ) -> Transition {
        if self.state != TradeState::Init
            || who != self.responder.id
            || initiator != self.initiator.public_id
        {
            debug!(
                "{}: stale acknowledgement from {} (state {:?}, claims initiator {})",
                self.id, who, self.state, initiator
            );
            return self.cancel(Some(who), out);
        }
        self.state = TradeState::Run;
        metrics::inc_trades_started();
        out.notify(self.initiator.id, TradeNotice::Start);
        out.notify(self.responder.id, TradeNotice::Start);
        debug!("{}: started", self.id);
        Transition::Continue
    }

    /// Record an offer of `amount` from `slot`. The item id is read from the offerer's
    /// inventory now, but the quantity is only checked at settlement.
    pub fn add_offer(
        &mut self,
        who: CharacterId,
        slot: usize,
        amount: u32,
        parties: &dyn TradeParties,
        out: &mut dyn Notifier,
    ) -> Transition {
        if !matches!(self.state, TradeState::Run | TradeState::Exit) || amount == 0 {
            return Transition::Continue;
        }
        let Some(side) = self.side_of(who) else {
            return Transition::Continue;
        };
        if self.participant(side).offers.is_full() {
            metrics::inc_offers_dropped();
            debug!("{}: offer list of {} full, entry dropped", self.id, who);
            return Transition::Continue;
        }
        let Some(item) = parties.item_in_slot(who, slot) else {
            return Transition::Continue;
        };

        self.participant_mut(side)
            .offers
            .push(OfferEntry { item, slot, amount });
        out.notify(
            self.character(side.other()),
            TradeNotice::AddItem { item, amount },
        );
        self.reopen();
        Transition::Continue
    }

    /// Replace `who`'s money offer. Same rules as an item offer.
    pub fn set_money(&mut self, who: CharacterId, amount: u32, out: &mut dyn Notifier) -> Transition {
        if !matches!(self.state, TradeState::Run | TradeState::Exit) {
            return Transition::Continue;
        }
        let Some(side) = self.side_of(who) else {
            return Transition::Continue;
        };
        self.participant_mut(side).offers.set_money(amount);
        out.notify(self.character(side.other()), TradeNotice::SetMoney { amount });
        self.reopen();
        Transition::Continue
    }

    /// Any offer change voids an earlier acceptance.
    fn reopen(&mut self) {
        self.state = TradeState::Run;
        self.accepted_by = None;
    }

    /// The first acceptance locks that side in; an acceptance from the other side while
    /// locked settles the trade. Roles never swap: which side accepted first is recorded,
    /// and settlement always runs in character-id order.
    pub fn accept(
        &mut self,
        who: CharacterId,
        parties: &mut dyn TradeParties,
        catalog: &ItemCatalog,
        out: &mut dyn Notifier,
    ) -> Transition {
        let Some(side) = self.side_of(who) else {
            return Transition::Continue;
        };
        match self.state {
            TradeState::Run => {
                self.state = TradeState::Exit;
                self.accepted_by = Some(side);
                out.notify(self.character(side.other()), TradeNotice::Accept);
                Transition::Continue
            }
            TradeState::Exit if self.accepted_by == Some(side.other()) => {
                self.settle_offers(parties, catalog, out)
            }
            _ => Transition::Continue,
        }
    }

    fn settle_offers(
        &mut self,
        parties: &mut dyn TradeParties,
        catalog: &ItemCatalog,
        out: &mut dyn Notifier,
    ) -> Transition {
        let (first, second) = if self.initiator.id < self.responder.id {
            (&self.initiator, &self.responder)
        } else {
            (&self.responder, &self.initiator)
        };

        let result = match parties.ledger_pair_mut(first.id, second.id) {
            Some((first_ledger, second_ledger)) => settle(
                SettlementSide {
                    id: first.id,
                    ledger: first_ledger,
                    offers: &first.offers,
                },
                SettlementSide {
                    id: second.id,
                    ledger: second_ledger,
                    offers: &second.offers,
                },
                catalog,
            ),
            None => Err(SettlementError::MissingParticipant(second.id)),
        };

        match result {
            Ok(()) => {
                self.state = TradeState::Settled;
                out.notify(self.initiator.id, TradeNotice::Complete);
                out.notify(self.responder.id, TradeNotice::Complete);
                info!(
                    target: "trade",
                    "{} settled: {} gave {} entries + {} money, {} gave {} entries + {} money",
                    self.id,
                    self.initiator.id,
                    self.initiator.offers.len(),
                    self.initiator.offers.money(),
                    self.responder.id,
                    self.responder.offers.len(),
                    self.responder.offers.money()
                );
                Transition::Ended(SessionEnd::Settled)
            }
            Err(err) => {
                metrics::inc_settlement_failures();
                warn!(target: "trade", "{} settlement aborted: {}", self.id, err);
                self.cancel(None, out)
            }
        }
    }

    /// Tear the session down from any state. Whoever did not trigger the cancellation is
    /// told about it; `None` notifies both sides.
    pub fn cancel(&mut self, trigger: Option<CharacterId>, out: &mut dyn Notifier) -> Transition {
        if self.state.is_terminal() {
            return Transition::Ended(self.ended().unwrap_or(SessionEnd::Cancelled));
        }
        for id in [self.initiator.id, self.responder.id] {
            if Some(id) != trigger {
                out.notify(id, TradeNotice::Cancel);
            }
        }
        self.state = TradeState::Cancelled;
        info!(target: "trade", "{} cancelled (trigger {:?})", self.id, trigger);
        Transition::Ended(SessionEnd::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::inventory::{InventoryLedger, ItemId, ItemStack};
    use crate::trade::Outbox;

    const A: CharacterId = CharacterId(1);
    const B: CharacterId = CharacterId(2);
    const A_PUB: PublicId = PublicId(100);
    const B_PUB: PublicId = PublicId(200);

    fn parties() -> BTreeMap<CharacterId, InventoryLedger> {
        let mut map = BTreeMap::new();
        map.insert(
            A,
            InventoryLedger::from_parts(vec![None, None, Some(ItemStack::new(ItemId(5), 3))], 0, 8),
        );
        map.insert(
            B,
            InventoryLedger::from_parts(vec![Some(ItemStack::new(ItemId(9), 1))], 0, 8),
        );
        map
    }

    fn started(out: &mut Outbox) -> TradeSession {
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, out);
        assert_eq!(session.acknowledge(B, A_PUB, out), Transition::Continue);
        out.take_all();
        session
    }

    #[test]
    fn test_request_notifies_responder_only() {
        let mut out = Outbox::new();
        let session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, &mut out);
        assert_eq!(session.state(), TradeState::Init);
        assert_eq!(
            out.take_all(),
            vec![(B, TradeNotice::Request { initiator: A_PUB })]
        );
    }

    #[test]
    fn test_valid_ack_starts_trade() {
        let mut out = Outbox::new();
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, &mut out);
        out.take_all();
        assert_eq!(session.acknowledge(B, A_PUB, &mut out), Transition::Continue);
        assert_eq!(session.state(), TradeState::Run);
        assert_eq!(
            out.take_all(),
            vec![(A, TradeNotice::Start), (B, TradeNotice::Start)]
        );
    }

    #[test]
    fn test_ack_with_wrong_initiator_cancels() {
        let mut out = Outbox::new();
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, &mut out);
        out.take_all();
        assert_eq!(
            session.acknowledge(B, PublicId(999), &mut out),
            Transition::Ended(SessionEnd::Cancelled)
        );
        assert_eq!(out.take_all(), vec![(A, TradeNotice::Cancel)]);
    }

    #[test]
    fn test_ack_from_initiator_cancels() {
        let mut out = Outbox::new();
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, &mut out);
        assert_eq!(
            session.acknowledge(A, A_PUB, &mut out),
            Transition::Ended(SessionEnd::Cancelled)
        );
    }

    #[test]
    fn test_late_ack_after_start_cancels() {
        let mut out = Outbox::new();
        let mut session = started(&mut out);
        assert_eq!(
            session.acknowledge(B, A_PUB, &mut out),
            Transition::Ended(SessionEnd::Cancelled)
        );
        assert_eq!(session.state(), TradeState::Cancelled);
        assert_eq!(out.take_all(), vec![(A, TradeNotice::Cancel)]);
    }

    #[test]
    fn test_offer_in_init_is_ignored() {
        let mut out = Outbox::new();
        let parties = parties();
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 50, &mut out);
        out.take_all();
        session.add_offer(A, 2, 3, &parties, &mut out);
        assert!(session.offers(Side::Initiator).is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_offer_is_echoed_with_item_id() {
        let mut out = Outbox::new();
        let parties = parties();
        let mut session = started(&mut out);
        session.add_offer(A, 2, 3, &parties, &mut out);
        assert_eq!(
            out.take_all(),
            vec![(
                B,
                TradeNotice::AddItem {
                    item: ItemId(5),
                    amount: 3
                }
            )]
        );
        assert_eq!(
            session.offers(Side::Initiator).entries(),
            &[OfferEntry {
                item: ItemId(5),
                slot: 2,
                amount: 3
            }]
        );
    }

    #[test]
    fn test_offer_from_empty_slot_is_ignored() {
        let mut out = Outbox::new();
        let parties = parties();
        let mut session = started(&mut out);
        session.add_offer(A, 0, 1, &parties, &mut out);
        session.add_offer(A, 60, 1, &parties, &mut out);
        assert!(session.offers(Side::Initiator).is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_offer_quantity_is_not_checked_until_settlement() {
        let mut out = Outbox::new();
        let parties = parties();
        let mut session = started(&mut out);
        session.add_offer(A, 2, 200, &parties, &mut out);
        assert_eq!(session.offers(Side::Initiator).len(), 1);
    }

    #[test]
    fn test_full_offer_list_drops_silently() {
        let mut out = Outbox::new();
        let parties = parties();
        let mut session = TradeSession::request(TradeId(1), (A, A_PUB), (B, B_PUB), 2, &mut out);
        session.acknowledge(B, A_PUB, &mut out);
        out.take_all();
        for _ in 0..5 {
            session.add_offer(A, 2, 1, &parties, &mut out);
        }
        assert_eq!(session.offers(Side::Initiator).len(), 2);
        assert_eq!(out.take_all().len(), 2);
    }

    #[test]
    fn test_either_side_may_accept_first() {
        let mut out = Outbox::new();
        let mut parties = parties();
        let catalog = ItemCatalog::builtin();
        let mut session = started(&mut out);

        assert_eq!(
            session.accept(B, &mut parties, &catalog, &mut out),
            Transition::Continue
        );
        assert_eq!(session.state(), TradeState::Exit);
        assert_eq!(session.accepted_by(), Some(Side::Responder));
        assert_eq!(out.take_all(), vec![(A, TradeNotice::Accept)]);

        // a repeated accept from the locked side changes nothing
        assert_eq!(
            session.accept(B, &mut parties, &catalog, &mut out),
            Transition::Continue
        );
        assert!(out.is_empty());

        assert_eq!(
            session.accept(A, &mut parties, &catalog, &mut out),
            Transition::Ended(SessionEnd::Settled)
        );
    }

    #[test]
    fn test_offer_after_accept_reopens_negotiation() {
        let mut out = Outbox::new();
        let mut parties = parties();
        let catalog = ItemCatalog::builtin();
        let mut session = started(&mut out);

        session.accept(A, &mut parties, &catalog, &mut out);
        assert_eq!(session.state(), TradeState::Exit);
        session.add_offer(B, 0, 1, &parties, &mut out);
        assert_eq!(session.state(), TradeState::Run);
        assert_eq!(session.accepted_by(), None);

        // B's accept is now a first acceptance, not a settlement
        assert_eq!(
            session.accept(B, &mut parties, &catalog, &mut out),
            Transition::Continue
        );
        assert_eq!(session.state(), TradeState::Exit);
    }

    #[test]
    fn test_money_offer_is_echoed_and_settled() {
        let mut out = Outbox::new();
        let mut parties = parties();
        parties.get_mut(&A).unwrap().money = 30;
        let catalog = ItemCatalog::builtin();
        let mut session = started(&mut out);

        session.set_money(A, 12, &mut out);
        assert_eq!(out.take_all(), vec![(B, TradeNotice::SetMoney { amount: 12 })]);
        session.accept(A, &mut parties, &catalog, &mut out);
        session.accept(B, &mut parties, &catalog, &mut out);

        assert_eq!(session.state(), TradeState::Settled);
        assert_eq!(parties[&A].money(), 18);
        assert_eq!(parties[&B].money(), 12);
    }

    #[test]
    fn test_cancel_notifies_the_other_side() {
        let mut out = Outbox::new();
        let mut session = started(&mut out);
        assert_eq!(
            session.cancel(Some(B), &mut out),
            Transition::Ended(SessionEnd::Cancelled)
        );
        assert_eq!(out.take_all(), vec![(A, TradeNotice::Cancel)]);

        // further events see a finished session
        let mut parties = parties();
        let catalog = ItemCatalog::builtin();
        assert_eq!(
            session.handle(A, TradeEvent::Accept, &mut parties, &catalog, &mut out),
            Transition::Ended(SessionEnd::Cancelled)
        );
        assert!(out.is_empty());
    }
}
