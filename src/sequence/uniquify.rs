use std::collections::HashMap;
use std::hash::Hash;

/// A sequence value tagged with how many equal values precede it.
///
/// Turns a sequence with repeats into one where every element is distinct, so
/// element identity can be defined by equality. Only meaningful within a
/// single diff invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Unique<T> {
    pub value: T,
    pub occurrence: u32,
}

impl<T> Unique<T> {
    pub fn new(value: T, occurrence: u32) -> Self {
        Unique { value, occurrence }
    }
}

/// Tag every element with its 0-based occurrence count among equal values.
pub fn uniquify<T: Clone + Eq + Hash>(sequence: &[T]) -> Vec<Unique<T>> {
    let mut counts: HashMap<&T, u32> = HashMap::with_capacity(sequence.len());
    sequence
        .iter()
        .map(|value| {
            let count = counts.entry(value).or_insert(0);
            let element = Unique::new(value.clone(), *count);
            *count += 1;
            element
        })
        .collect()
}

/// Drop occurrence tags.
pub fn strip<T: Clone>(elements: &[Unique<T>]) -> Vec<T> {
    elements.iter().map(|e| e.value.clone()).collect()
}
