use std::collections::HashSet;

/// Identifiers already surfaced to the application for one subscription.
///
/// There is no eviction: the ledger lives exactly as long as the channel
/// subscription that owns it and is only ever emptied with [`clear`].
///
/// [`clear`]: DedupLedger::clear
#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Records `id`. Returns true when it was not present before.
    pub fn record(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::DedupLedger;

    #[test]
    fn record_accepts_each_id_once() {
        let mut ledger = DedupLedger::new();
        assert!(!ledger.has("m1"));
        assert!(ledger.record("m1"));
        assert!(ledger.has("m1"));
        assert!(!ledger.record("m1"));
        assert!(ledger.record("m2"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut ledger = DedupLedger::new();
        ledger.record("a");
        ledger.record("b");
        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.record("a"));
    }
}
