use std::collections::BTreeMap;
use tracing::warn;

use super::FragmentOutcome;

/// Re-sequences fragment outcomes that complete out of order.
///
/// A single cursor (`next_expected`) advances only when the outcome for that
/// ordinal is present, so [`ReorderBuffer::pop_ready`] yields strictly
/// increasing ordinals with no gaps.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: BTreeMap<u64, FragmentOutcome>,
    next_expected: u64,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an outcome until its turn comes. Duplicates and stale ordinals are dropped.
    pub fn insert(&mut self, outcome: FragmentOutcome) -> bool {
        let ordinal = outcome.ordinal();
        if ordinal < self.next_expected || self.pending.contains_key(&ordinal) {
            warn!(ordinal, "Ignoring duplicate fragment outcome");
            return false;
        }
        self.pending.insert(ordinal, outcome);
        true
    }

    /// Next outcome in ordinal order, if it has arrived
    pub fn pop_ready(&mut self) -> Option<FragmentOutcome> {
        let outcome = self.pending.remove(&self.next_expected)?;
        self.next_expected += 1;
        Some(outcome)
    }

    /// Everything still parked, in ordinal order. Only meaningful once no more
    /// outcomes can arrive.
    pub fn drain_remaining(&mut self) -> Vec<FragmentOutcome> {
        let remaining: Vec<_> = std::mem::take(&mut self.pending).into_values().collect();
        if let Some(last) = remaining.last() {
            self.next_expected = last.ordinal() + 1;
        }
        remaining
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dropped(ordinal: u64) -> FragmentOutcome {
        FragmentOutcome::Dropped {
            ordinal,
            reason: "test".to_string(),
        }
    }

    fn drain(buffer: &mut ReorderBuffer) -> Vec<u64> {
        std::iter::from_fn(|| buffer.pop_ready())
            .map(|o| o.ordinal())
            .collect()
    }

    #[test]
    fn test_holds_until_gap_filled() {
        let mut buffer = ReorderBuffer::new();
        buffer.insert(dropped(2));
        buffer.insert(dropped(1));
        assert!(buffer.pop_ready().is_none());
        assert_eq!(buffer.pending_len(), 2);

        buffer.insert(dropped(0));
        assert_eq!(drain(&mut buffer), vec![0, 1, 2]);
        assert_eq!(buffer.next_expected(), 3);
    }

    #[test]
    fn test_every_permutation_drains_in_order() {
        let orders: &[&[u64]] = &[
            &[0, 1, 2, 3],
            &[3, 2, 1, 0],
            &[1, 3, 0, 2],
            &[2, 0, 3, 1],
        ];
        for order in orders {
            let mut buffer = ReorderBuffer::new();
            let mut seen = Vec::new();
            for &ordinal in *order {
                buffer.insert(dropped(ordinal));
                seen.extend(drain(&mut buffer));
            }
            assert_eq!(seen, vec![0, 1, 2, 3], "arrival order {order:?}");
        }
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut buffer = ReorderBuffer::new();
        assert!(buffer.insert(dropped(1)));
        assert!(!buffer.insert(dropped(1)));
        assert!(buffer.insert(dropped(0)));
        assert_eq!(drain(&mut buffer), vec![0, 1]);
        assert!(!buffer.insert(dropped(0)));
    }

    #[test]
    fn test_drain_remaining_skips_gap() {
        let mut buffer = ReorderBuffer::new();
        buffer.insert(dropped(3));
        buffer.insert(dropped(5));
        let rest: Vec<_> = buffer.drain_remaining().iter().map(|o| o.ordinal()).collect();
        assert_eq!(rest, vec![3, 5]);
        assert_eq!(buffer.next_expected(), 6);
        assert_eq!(buffer.pending_len(), 0);
    }
}
