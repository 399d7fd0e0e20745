//! Translate an edit script into single-element operations for a live,
//! remotely-held ordered collection.
//!
//! Operations are meant to be applied one at a time in emission order against
//! a collection that starts equal to the script's `old` and must end equal to
//! its `new`. A shadow copy of the live list is kept while translating, so
//! every offset is relative to what the remote holds at that moment.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::diff::EditScript;
use super::uniquify::{strip, Unique};
use crate::error::InvariantViolation;

/// One call against the live collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LiveOp<T> {
    /// Remove the element at `offset`. `value` is what should be there.
    Remove { offset: usize, value: T },
    /// Insert `value` so that it ends up at `offset`.
    Insert { offset: usize, value: T },
    /// Take the element at `from` out, then insert it so that it ends up at `to`
    /// in the resulting list.
    Move { from: usize, to: usize, value: T },
}

/// Convert a canonical edit script into a sequential operation stream.
///
/// Unpaired removals are emitted first, highest offset first. Removals that are
/// half of a move stay in place as pending elements until their insertion is
/// reached; insertions then run in ascending order, each placed right after the
/// `offset`-th settled (non-pending) element of the shadow list.
pub fn replay_ops<T>(script: &EditScript<T>) -> Result<Vec<LiveOp<T>>, InvariantViolation>
where
    T: Clone + Eq + Hash,
{
    let mut shadow: Vec<Unique<T>> = script.old().to_vec();
    let mut pending: HashSet<Unique<T>> = HashSet::new();
    let mut ops = Vec::with_capacity(script.len());

    for removal in script.removals().iter().rev() {
        if removal.moved_to.is_some() {
            pending.insert(removal.element.clone());
            continue;
        }
        if shadow.get(removal.offset) != Some(&removal.element) {
            return Err(InvariantViolation::new(format!(
                "removal at {} does not match shadow list",
                removal.offset
            )));
        }
        shadow.remove(removal.offset);
        ops.push(LiveOp::Remove {
            offset: removal.offset,
            value: removal.element.value.clone(),
        });
    }

    for insertion in script.insertions() {
        let target = settled_position(&shadow, &pending, insertion.offset)?;

        if insertion.moved_from.is_some() {
            let current = shadow
                .iter()
                .position(|e| e == &insertion.element)
                .ok_or_else(|| {
                    InvariantViolation::new(format!(
                        "moved element for offset {} missing from shadow list",
                        insertion.offset
                    ))
                })?;
            if !pending.remove(&insertion.element) {
                return Err(InvariantViolation::new(format!(
                    "moved element for offset {} was not pending",
                    insertion.offset
                )));
            }
            let to = if current < target { target - 1 } else { target };
            let element = shadow.remove(current);
            shadow.insert(to, element);
            ops.push(LiveOp::Move {
                from: current,
                to,
                value: insertion.element.value.clone(),
            });
        } else {
            shadow.insert(target, insertion.element.clone());
            ops.push(LiveOp::Insert {
                offset: target,
                value: insertion.element.value.clone(),
            });
        }
    }

    if !pending.is_empty() {
        return Err(InvariantViolation::new(format!(
            "{} moved element(s) never reinserted",
            pending.len()
        )));
    }
    if shadow.as_slice() != script.new_sequence() {
        return Err(InvariantViolation::new(
            "replayed shadow list differs from target sequence",
        ));
    }

    tracing::debug!(
        "translated {} edits into {} live ops",
        script.len(),
        ops.len()
    );
    Ok(ops)
}

/// Smallest index whose prefix holds exactly `settled` non-pending elements.
fn settled_position<T: Eq + Hash>(
    shadow: &[Unique<T>],
    pending: &HashSet<Unique<T>>,
    settled: usize,
) -> Result<usize, InvariantViolation> {
    let mut seen = 0;
    for (idx, element) in shadow.iter().enumerate() {
        if seen == settled {
            return Ok(idx);
        }
        if !pending.contains(element) {
            seen += 1;
        }
    }
    if seen == settled {
        Ok(shadow.len())
    } else {
        Err(InvariantViolation::new(format!(
            "insertion offset {} beyond {} settled elements",
            settled, seen
        )))
    }
}

/// Apply operations to an in-memory list, checking every offset and value.
pub fn apply_ops<T>(sequence: &mut Vec<T>, ops: &[LiveOp<T>]) -> Result<(), InvariantViolation>
where
    T: Clone + PartialEq + std::fmt::Debug,
{
    for op in ops {
        match op {
            LiveOp::Remove { offset, value } => {
                if sequence.get(*offset) != Some(value) {
                    return Err(InvariantViolation::new(format!(
                        "remove {:?} at {}: found {:?}",
                        value,
                        offset,
                        sequence.get(*offset)
                    )));
                }
                sequence.remove(*offset);
            }
            LiveOp::Insert { offset, value } => {
                if *offset > sequence.len() {
                    return Err(InvariantViolation::new(format!(
                        "insert at {} past end {}",
                        offset,
                        sequence.len()
                    )));
                }
                sequence.insert(*offset, value.clone());
            }
            LiveOp::Move { from, to, value } => {
                if sequence.get(*from) != Some(value) || *to >= sequence.len() {
                    return Err(InvariantViolation::new(format!(
                        "move {:?} from {} to {} in list of {}",
                        value,
                        from,
                        to,
                        sequence.len()
                    )));
                }
                let element = sequence.remove(*from);
                sequence.insert(*to, element);
            }
        }
    }
    Ok(())
}

/// Translate and verify against a scratch copy of `old` before returning.
pub fn checked_replay_ops<T>(script: &EditScript<T>) -> Result<Vec<LiveOp<T>>, InvariantViolation>
where
    T: Clone + Eq + Hash + std::fmt::Debug,
{
    let ops = replay_ops(script)?;
    let mut scratch = strip(script.old());
    apply_ops(&mut scratch, &ops)?;
    if scratch != strip(script.new_sequence()) {
        return Err(InvariantViolation::new(
            "live replay does not reproduce the target sequence",
        ));
    }
    Ok(ops)
}
