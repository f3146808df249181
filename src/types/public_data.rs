use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::Fr;

/// A write to a slot of the public data tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDataWrite {
    pub leaf_index: Fr,
    pub new_value: Fr,
}

impl PublicDataWrite {
    pub fn new(leaf_index: Fr, new_value: Fr) -> Self {
        Self {
            leaf_index,
            new_value,
        }
    }

    /// Collapses an ordered sequence of writes to the final write per slot.
    /// Later writes win. The result keeps the position of each slot's last
    /// write.
    pub fn squash<'a>(writes: impl IntoIterator<Item = &'a PublicDataWrite>) -> Vec<PublicDataWrite> {
        let writes: Vec<&PublicDataWrite> = writes.into_iter().collect();

        let mut last_index = HashMap::with_capacity(writes.len());
        for (i, write) in writes.iter().enumerate() {
            last_index.insert(write.leaf_index, i);
        }

        writes
            .iter()
            .enumerate()
            .filter(|(i, write)| last_index.get(&write.leaf_index) == Some(i))
            .map(|(_, write)| **write)
            .collect()
    }
}
