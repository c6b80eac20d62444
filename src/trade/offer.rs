use crate::inventory::ItemId;

/// One proposed transfer: `amount` of `item`, taken from `slot` at settlement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferEntry {
    pub item: ItemId,
    pub slot: usize,
    pub amount: u32,
}

/// Everything one participant has proposed to give up.
///
/// Entries are bounded so a client cannot grow server memory without limit. Nothing
/// here is checked against the inventory; settlement re-validates every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferList {
    entries: Vec<OfferEntry>,
    money: u32,
    max_entries: usize,
}

impl OfferList {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            money: 0,
            max_entries,
        }
    }

    /// Record an entry. Returns `false` (and records nothing) when the list is full.
    pub fn push(&mut self, entry: OfferEntry) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn set_money(&mut self, amount: u32) {
        self.money = amount;
    }

    pub fn entries(&self) -> &[OfferEntry] {
        &self.entries
    }

    pub fn money(&self) -> u32 {
        self.money
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.money == 0
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
