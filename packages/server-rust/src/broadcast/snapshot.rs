//! Immutable, generation-stamped view of the active operator set.

use std::collections::HashMap;

use avs_core::OperatorInfo;

/// Point-in-time copy of the active operator set.
///
/// Never mutated after construction; the broadcaster swaps in a new
/// `Arc<OperatorSnapshot>` with a higher generation instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSnapshot {
    generation: u64,
    operators: Vec<OperatorInfo>,
}

impl OperatorSnapshot {
    /// The generation-0 snapshot installed before any operators are set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            generation: 0,
            operators: Vec::new(),
        }
    }

    /// Builds a snapshot, collapsing duplicate addresses.
    ///
    /// The last entry for an address wins; it takes the position of the
    /// first occurrence.
    #[must_use]
    pub fn new(generation: u64, operators: Vec<OperatorInfo>) -> Self {
        Self {
            generation,
            operators: dedup_by_address(operators),
        }
    }

    /// The same operators under another generation number.
    #[must_use]
    pub(crate) fn with_generation(&self, generation: u64) -> Self {
        Self {
            generation,
            operators: self.operators.clone(),
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn operators(&self) -> &[OperatorInfo] {
        &self.operators
    }

    #[must_use]
    pub fn get(&self, address: &str) -> Option<&OperatorInfo> {
        self.operators.iter().find(|op| op.address == address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

fn dedup_by_address(operators: Vec<OperatorInfo>) -> Vec<OperatorInfo> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(operators.len());
    let mut out: Vec<OperatorInfo> = Vec::with_capacity(operators.len());
    for op in operators {
        match index.get(&op.address) {
            Some(&i) => out[i] = op,
            None => {
                index.insert(op.address.clone(), out.len());
                out.push(op);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn last_write_per_address_wins() {
        let snapshot = OperatorSnapshot::new(
            3,
            vec![
                OperatorInfo::new("0xa", "10.0.0.1", 1),
                OperatorInfo::new("0xb", "10.0.0.2", 1),
                OperatorInfo::new("0xa", "10.0.0.9", 2),
            ],
        );
        assert_eq!(snapshot.generation(), 3);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.operators()[0].endpoint, "10.0.0.9");
        assert_eq!(snapshot.get("0xb").unwrap().endpoint, "10.0.0.2");
        assert!(snapshot.get("0xc").is_none());
    }

    #[test]
    fn with_generation_keeps_operators() {
        let snapshot = OperatorSnapshot::new(0, vec![OperatorInfo::new("0xa", "h", 1)]);
        let next = snapshot.with_generation(7);
        assert_eq!(next.generation(), 7);
        assert_eq!(next.operators(), snapshot.operators());
    }

    #[test]
    fn empty_snapshot_is_generation_zero() {
        let snapshot = OperatorSnapshot::empty();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.is_empty());
    }

    proptest! {
        #[test]
        fn dedup_keeps_one_entry_per_address(
            entries in proptest::collection::vec((0u8..8, 0u64..1_000), 0..40)
        ) {
            let operators: Vec<OperatorInfo> = entries
                .iter()
                .map(|(a, seen)| OperatorInfo::new(format!("0x{a}"), "h", *seen))
                .collect();
            let deduped = dedup_by_address(operators.clone());

            let distinct: HashSet<&str> = operators.iter().map(|o| o.address.as_str()).collect();
            prop_assert_eq!(deduped.len(), distinct.len());

            for op in &deduped {
                let last = operators.iter().rev().find(|o| o.address == op.address).unwrap();
                prop_assert_eq!(op, last);
            }
        }
    }
}
