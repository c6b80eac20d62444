//! Ownership of live trade sessions and the character → session index.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::inventory::ItemCatalog;
use crate::metrics;
use crate::world::{CharacterId, PublicId};

use super::notice::Notifier;
use super::session::{SessionEnd, TradeSession, Transition};
use super::{TradeEvent, TradeId, TradeParties};

/// Owns every open [`TradeSession`]. Characters never hold a session directly; they are
/// looked up here by id, so a session that has ended cannot be reached any more.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<TradeId, TradeSession>,
    by_character: HashMap<CharacterId, TradeId>,
    next_id: u32,
    max_offer_entries: usize,
}

impl SessionRegistry {
    pub fn new(max_offer_entries: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            by_character: HashMap::new(),
            next_id: 1,
            max_offer_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn trade_of(&self, who: CharacterId) -> Option<TradeId> {
        self.by_character.get(&who).copied()
    }

    pub fn is_trading(&self, who: CharacterId) -> bool {
        self.by_character.contains_key(&who)
    }

    pub fn session(&self, id: TradeId) -> Option<&TradeSession> {
        self.sessions.get(&id)
    }

    pub fn session_of(&self, who: CharacterId) -> Option<&TradeSession> {
        self.trade_of(who).and_then(|id| self.sessions.get(&id))
    }

    /// `(character, session)` links currently held.
    pub fn links(&self) -> impl Iterator<Item = (CharacterId, TradeId)> + '_ {
        self.by_character.iter().map(|(c, t)| (*c, *t))
    }

    /// Start a trade. A participant that is already trading has that session cancelled
    /// first; the initiator counts as the trigger of its own old session's cancellation.
    /// Returns `None` when a character tries to trade with itself.
    pub fn begin_session(
        &mut self,
        initiator: (CharacterId, PublicId),
        responder: (CharacterId, PublicId),
        out: &mut dyn Notifier,
    ) -> Option<TradeId> {
        if initiator.0 == responder.0 {
            return None;
        }
        if let Some(existing) = self.trade_of(initiator.0) {
            self.cancel_session(existing, Some(initiator.0), out);
        }
        if let Some(existing) = self.trade_of(responder.0) {
            self.cancel_session(existing, None, out);
        }

        let id = self.allocate_id();
        let session =
            TradeSession::request(id, initiator, responder, self.max_offer_entries, out);
        self.sessions.insert(id, session);
        self.by_character.insert(initiator.0, id);
        self.by_character.insert(responder.0, id);
        metrics::inc_trades_requested();
        debug!("{} requested by {} with {}", id, initiator.0, responder.0);
        Some(id)
    }

    fn allocate_id(&mut self) -> TradeId {
        loop {
            let id = TradeId(self.next_id.max(1));
            self.next_id = id.0.wrapping_add(1);
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Drop a session and release both characters' links to it.
    pub fn end_session(&mut self, id: TradeId) -> Option<TradeSession> {
        let session = self.sessions.remove(&id)?;
        for who in [session.initiator(), session.responder()] {
            if self.by_character.get(&who) == Some(&id) {
                self.by_character.remove(&who);
            }
        }
        Some(session)
    }

    fn finish(&mut self, id: TradeId, transition: Transition) -> Option<SessionEnd> {
        let Transition::Ended(end) = transition else {
            return None;
        };
        self.end_session(id);
        match end {
            SessionEnd::Settled => metrics::inc_trades_settled(),
            SessionEnd::Cancelled => metrics::inc_trades_cancelled(),
        }
        Some(end)
    }

    /// Route an event from `who` to their session. Events from characters that are not
    /// trading are ignored. Returns how the session ended, if it did.
    pub fn dispatch(
        &mut self,
        who: CharacterId,
        event: TradeEvent,
        parties: &mut dyn TradeParties,
        catalog: &ItemCatalog,
        out: &mut dyn Notifier,
    ) -> Option<SessionEnd> {
        let Some(id) = self.trade_of(who) else {
            debug!("{} sent {:?} without an open trade", who, event);
            return None;
        };
        let Some(session) = self.sessions.get_mut(&id) else {
            self.by_character.remove(&who);
            return None;
        };
        let transition = session.handle(who, event, parties, catalog, out);
        self.finish(id, transition)
    }

    pub fn cancel_session(
        &mut self,
        id: TradeId,
        trigger: Option<CharacterId>,
        out: &mut dyn Notifier,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        let transition = session.cancel(trigger, out);
        self.finish(id, transition).is_some()
    }

    /// Cancel whatever `who` is trading (disconnects, leaving the map).
    pub fn cancel_for(&mut self, who: CharacterId, out: &mut dyn Notifier) -> bool {
        match self.trade_of(who) {
            Some(id) => self.cancel_session(id, Some(who), out),
            None => false,
        }
    }

    /// Cancel sessions with no activity for at least `timeout`. Both sides are notified.
    pub fn expire_idle(
        &mut self,
        now: DateTime<Utc>,
        timeout: Duration,
        out: &mut dyn Notifier,
    ) -> usize {
        let stale: Vec<TradeId> = self
            .sessions
            .values()
            .filter(|s| now - s.last_activity() >= timeout)
            .map(|s| s.id())
            .collect();
        for id in &stale {
            debug!("{} expired after {}s idle", id, timeout.num_seconds());
            self.cancel_session(*id, None, out);
            metrics::inc_sessions_expired();
        }
        stale.len()
    }
}
