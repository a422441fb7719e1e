//! Round-received ordering of events once a round's judges are known.

use std::collections::BTreeSet;

use weft_types::{Signature, Timestamp};

use crate::arena::{EventArena, NodeIndex};

/// Unordered events that more than half of the judges see.
pub(crate) fn received_events(
    arena: &EventArena,
    unordered: &BTreeSet<NodeIndex>,
    judges: &[NodeIndex],
) -> Vec<NodeIndex> {
    if judges.is_empty() {
        return Vec::new();
    }
    unordered
        .iter()
        .copied()
        .filter(|event| {
            let seen_by = judges
                .iter()
                .filter(|judge| arena.sees(**judge, *event))
                .count();
            seen_by * 2 > judges.len()
        })
        .collect()
}

/// Median over the judges that see `event` of the time each judge's
/// creator first learned of it: the creation time of the earliest event
/// in the judge's self-parent chain that sees `event`.
pub(crate) fn median_timestamp(
    arena: &EventArena,
    event: NodeIndex,
    judges: &[NodeIndex],
) -> Option<Timestamp> {
    let mut times: Vec<Timestamp> = judges
        .iter()
        .filter(|judge| arena.sees(**judge, event))
        .filter_map(|judge| {
            let mut earliest = *judge;
            while let Some(parent) = arena.get(earliest).and_then(|n| n.self_parent()) {
                if !arena.sees(parent, event) {
                    break;
                }
                earliest = parent;
            }
            arena.get(earliest).map(|n| n.created())
        })
        .collect();
    if times.is_empty() {
        return None;
    }
    times.sort_unstable();
    Some(times[times.len() / 2])
}

/// XOR of the judges' signatures. Mixed into every received event's
/// signature so no single creator can choose its tie-break position.
pub(crate) fn whitener(arena: &EventArena, judges: &[NodeIndex]) -> Signature {
    judges
        .iter()
        .filter_map(|judge| arena.get(*judge))
        .fold(Signature([0; 64]), |acc, node| acc.xor(node.signature()))
}

/// Sort received events by median time, then whitened signature, then hash.
/// Returns each event with its median timestamp.
pub(crate) fn sort_received(
    arena: &EventArena,
    received: &[NodeIndex],
    judges: &[NodeIndex],
) -> Vec<(NodeIndex, Timestamp)> {
    let whitener = whitener(arena, judges);
    let mut keyed: Vec<_> = received
        .iter()
        .filter_map(|index| {
            let node = arena.get(*index)?;
            let median = median_timestamp(arena, *index, judges)?;
            let whitened = node.signature().xor(&whitener);
            Some((median, whitened.0, *node.hash().as_bytes(), *index))
        })
        .collect();
    keyed.sort_unstable();
    keyed
        .into_iter()
        .map(|(median, _, _, index)| (index, median))
        .collect()
}
