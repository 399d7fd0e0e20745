//! A single displayable list merging both sides of an edit script.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::diff::EditScript;
use super::uniquify::{strip, Unique};
use crate::error::InvariantViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChangeState {
    Unchanged,
    /// `moved_to` is the index of this element's insertion in the same unified list
    Removed { moved_to: Option<usize> },
    /// `moved_from` is the index of this element's removal in the same unified list
    Inserted { moved_from: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualEntry<T> {
    pub value: T,
    pub state: ChangeState,
}

impl<T> VisualEntry<T> {
    pub fn is_removed(&self) -> bool {
        matches!(self.state, ChangeState::Removed { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(
            self.state,
            ChangeState::Removed { moved_to: Some(_) } | ChangeState::Inserted { moved_from: Some(_) }
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tag {
    Unchanged,
    Removed,
    Inserted,
}

/// Build the unified list for `script`.
///
/// Unchanged and inserted entries read in order give `new`; removed entries sit
/// at their original position relative to the unchanged ones. An insertion is
/// placed after any removed entries that precede the next unchanged entry.
pub fn visual_diff<T>(script: &EditScript<T>) -> Result<Vec<VisualEntry<T>>, InvariantViolation>
where
    T: Clone + Eq + Hash,
{
    let mut removed = vec![false; script.old().len()];
    for removal in script.removals() {
        removed[removal.offset] = true;
    }

    let mut unified: Vec<(Unique<T>, Tag)> = script
        .old()
        .iter()
        .zip(&removed)
        .map(|(e, &gone)| (e.clone(), if gone { Tag::Removed } else { Tag::Unchanged }))
        .collect();

    for insertion in script.insertions() {
        let at = insertion_point(&unified, insertion.offset)?;
        unified.insert(at, (insertion.element.clone(), Tag::Inserted));
    }

    let mut removed_at: HashMap<&Unique<T>, usize> = HashMap::new();
    let mut inserted_at: HashMap<&Unique<T>, usize> = HashMap::new();
    for (idx, (element, tag)) in unified.iter().enumerate() {
        match tag {
            Tag::Removed => {
                removed_at.insert(element, idx);
            }
            Tag::Inserted => {
                inserted_at.insert(element, idx);
            }
            Tag::Unchanged => {}
        }
    }

    let entries: Vec<VisualEntry<T>> = unified
        .iter()
        .map(|(element, tag)| VisualEntry {
            value: element.value.clone(),
            state: match tag {
                Tag::Unchanged => ChangeState::Unchanged,
                Tag::Removed => ChangeState::Removed {
                    moved_to: inserted_at.get(element).copied(),
                },
                Tag::Inserted => ChangeState::Inserted {
                    moved_from: removed_at.get(element).copied(),
                },
            },
        })
        .collect();

    let visible: Vec<&T> = entries
        .iter()
        .filter(|e| !e.is_removed())
        .map(|e| &e.value)
        .collect();
    let target = strip(script.new_sequence());
    if visible.len() != target.len() || visible.iter().zip(&target).any(|(a, b)| *a != b) {
        return Err(InvariantViolation::new(
            "visual diff does not reproduce the target sequence",
        ));
    }

    Ok(entries)
}

/// Index of the `settled`-th non-removed entry, or the end of the list.
fn insertion_point<T>(
    unified: &[(Unique<T>, Tag)],
    settled: usize,
) -> Result<usize, InvariantViolation> {
    let mut seen = 0;
    for (idx, (_, tag)) in unified.iter().enumerate() {
        if *tag == Tag::Removed {
            continue;
        }
        if seen == settled {
            return Ok(idx);
        }
        seen += 1;
    }
    if seen == settled {
        Ok(unified.len())
    } else {
        Err(InvariantViolation::new(format!(
            "insertion offset {} beyond {} visible entries",
            settled, seen
        )))
    }
}
