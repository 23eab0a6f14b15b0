//! Balanced group generation.
//!
//! # Responsibility
//! - Partition a person set into N draft groups with random content but a
//!   deterministic shape.
//!
//! # Invariants
//! - Every input person is assigned to exactly one group.
//! - Group sizes differ by at most 1.
//! - Group count is `max(1, count)` regardless of input size.

use crate::model::group::DraftGroup;
use crate::model::person::Person;
use rand::Rng;

/// Generates `max(1, count)` draft groups from a uniformly shuffled copy of
/// `people`, distributed round-robin.
///
/// The shuffle is Fisher-Yates over a copy, walking from the last index
/// down to 1 and swapping with a uniformly chosen index `0..=i`, so every
/// permutation is equally likely. Round-robin distribution then guarantees
/// the size-balance invariant, which a contiguous slice split would not
/// give for free.
///
/// An empty `people` input yields empty groups, not an error.
///
/// The RNG is caller-supplied so tests can seed it; use
/// [`generate_with_thread_rng`] for the interactive path.
pub fn generate_balanced_groups<R: Rng>(
    people: &[Person],
    count: usize,
    rng: &mut R,
) -> Vec<DraftGroup> {
    let group_count = count.max(1);

    let mut shuffled = people.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }

    let mut groups: Vec<DraftGroup> = (1..=group_count)
        .map(|ordinal| DraftGroup::new(format!("Group {ordinal}")))
        .collect();

    for (index, person) in shuffled.into_iter().enumerate() {
        groups[index % group_count].members.push(person);
    }

    groups
}

/// Convenience wrapper over [`generate_balanced_groups`] using the thread
/// RNG.
pub fn generate_with_thread_rng(people: &[Person], count: usize) -> Vec<DraftGroup> {
    generate_balanced_groups(people, count, &mut rand::thread_rng())
}
