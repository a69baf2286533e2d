use std::alloc::Allocator;
use std::collections::BTreeMap;

/// Black-box workload: populates an ordered id → string map through the given
/// allocator, then iterates every entry and returns the aggregate size of the
/// entries themselves (key plus string value, not counting string contents).
///
/// The workload only ever touches the allocator through the standard
/// container interface, which is the point: it cannot tell a pooled
/// allocator from the general-purpose one except by timing.
#[must_use]
pub fn populate_and_measure<A>(alloc: A, entries: u64) -> usize
where
    A: Allocator + Clone,
{
    let mut id_to_digits = BTreeMap::new_in(alloc);

    for id in 0..entries {
        id_to_digits.insert(id, id.to_string());
    }

    id_to_digits
        .iter()
        .map(|(key, value)| size_of_val(key).wrapping_add(size_of_val(value)))
        .sum()
}

#[cfg(test)]
mod tests {
    use std::alloc::Global;

    use small_pool::PoolAllocator;

    use super::*;

    #[test]
    fn aggregate_size_counts_every_entry() {
        let total = populate_and_measure(Global, 100);

        let per_entry = size_of::<u64>() + size_of::<String>();
        assert_eq!(total, per_entry * 100);
    }

    #[test]
    fn pooled_and_standard_runs_agree() {
        let pooled = populate_and_measure(PoolAllocator::new(), 1_000);
        let standard = populate_and_measure(Global, 1_000);

        assert_eq!(pooled, standard);
    }

    #[test]
    fn empty_workload_measures_nothing() {
        assert_eq!(populate_and_measure(Global, 0), 0);
    }
}
