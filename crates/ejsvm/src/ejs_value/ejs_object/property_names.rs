// Property name table
// One entry per slot plus an optional open-chain hash index. The hash
// covers the local name only; the namespace takes part in the final compare.

use ahash::RandomState;
use std::hash::BuildHasher;
use std::sync::LazyLock;

use crate::ejs_value::QName;
use crate::ejs_vm::ejs_limits::{HASH_MIN_PROP, get_hash_size};

static NAME_HASHER: LazyLock<RandomState> = LazyLock::new(|| {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
});

#[inline]
fn hash_name(name: &str) -> usize {
    NAME_HASHER.hash_one(name) as usize
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameEntry {
    pub qname: QName,
    /// Next slot on the same hash chain
    next: Option<u32>,
}

/// Result of a namespace-agnostic lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleMatch {
    NotFound,
    /// Exactly one slot carries the bare name
    Unique(usize),
    /// More than one namespace defines the bare name
    Multiple,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyNames {
    entries: Vec<NameEntry>,
    /// Head slot of each chain. Empty until the index is built.
    buckets: Vec<Option<u32>>,
}

impl PropertyNames {
    pub fn with_len(len: usize) -> Self {
        Self {
            entries: vec![NameEntry::default(); len],
            buckets: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_hashed(&self) -> bool {
        !self.buckets.is_empty()
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn name_at(&self, slot: usize) -> Option<&QName> {
        self.entries.get(slot).map(|entry| &entry.qname)
    }

    /// Extend the table with unnamed entries up to `len`
    pub(crate) fn ensure_len(&mut self, len: usize) {
        if self.entries.len() < len {
            self.entries.resize(len, NameEntry::default());
        }
    }

    /// Reserve room for `additional` more entries. False if the allocator refuses.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> bool {
        self.entries.try_reserve(additional).is_ok()
    }

    /// Exact `(namespace, name)` lookup among the first `num_prop` slots.
    /// When a qname is present on several slots the lowest slot wins on
    /// both the linear and the hashed path.
    pub fn lookup(&self, qname: &QName, num_prop: usize) -> Option<usize> {
        if qname.is_empty() {
            return None;
        }
        if self.buckets.is_empty() {
            return self.entries[..num_prop.min(self.entries.len())]
                .iter()
                .position(|entry| entry.qname == *qname);
        }

        let mut found = None;
        let mut cursor = self.buckets[hash_name(&qname.name) % self.buckets.len()];
        while let Some(slot) = cursor {
            let slot = slot as usize;
            let entry = &self.entries[slot];
            if slot < num_prop && entry.qname == *qname {
                found = Some(found.map_or(slot, |prev: usize| prev.min(slot)));
            }
            cursor = entry.next;
        }
        found
    }

    /// Name-only lookup across all namespaces
    pub fn lookup_single(&self, name: &str, num_prop: usize) -> SingleMatch {
        if name.is_empty() {
            return SingleMatch::NotFound;
        }
        let mut result = SingleMatch::NotFound;
        let mut visit = |slot: usize| {
            result = match result {
                SingleMatch::NotFound => SingleMatch::Unique(slot),
                _ => SingleMatch::Multiple,
            };
        };

        if self.buckets.is_empty() {
            for (slot, entry) in self.entries[..num_prop.min(self.entries.len())]
                .iter()
                .enumerate()
            {
                if entry.qname.name == name {
                    visit(slot);
                }
            }
        } else {
            let mut cursor = self.buckets[hash_name(name) % self.buckets.len()];
            while let Some(slot) = cursor {
                let entry = &self.entries[slot as usize];
                if (slot as usize) < num_prop && entry.qname.name == name {
                    visit(slot as usize);
                }
                cursor = entry.next;
            }
        }
        result
    }

    /// Build or rebuild the hash index. Small tables stay unindexed; once an
    /// index exists it is kept and only ever grows.
    pub(crate) fn make_hash(&mut self, num_prop: usize) {
        if num_prop <= HASH_MIN_PROP && self.buckets.is_empty() {
            return;
        }
        let size = get_hash_size(num_prop).max(self.buckets.len());
        self.buckets.clear();
        self.buckets.resize(size, None);
        for entry in &mut self.entries {
            entry.next = None;
        }
        for slot in 0..num_prop.min(self.entries.len()) {
            self.link(slot);
        }
    }

    /// Add `slot` to the index, rebuilding it when the bucket array is too small
    pub(crate) fn hash_property(&mut self, slot: usize, num_prop: usize) {
        if self.buckets.len() < num_prop {
            self.make_hash(num_prop);
            return;
        }
        self.link(slot);
    }

    /// Append `slot` at the end of its chain
    fn link(&mut self, slot: usize) {
        if self.entries[slot].qname.is_empty() {
            return;
        }
        self.entries[slot].next = None;
        let index = hash_name(&self.entries[slot].qname.name) % self.buckets.len();
        let Some(head) = self.buckets[index] else {
            self.buckets[index] = Some(slot as u32);
            return;
        };
        let mut tail = head as usize;
        while let Some(next) = self.entries[tail].next {
            tail = next as usize;
        }
        self.entries[tail].next = Some(slot as u32);
    }

    /// Splice `slot` out of its chain and clear its name
    pub(crate) fn remove_hash_entry(&mut self, slot: usize) {
        if slot >= self.entries.len() {
            return;
        }
        if !self.buckets.is_empty() && !self.entries[slot].qname.is_empty() {
            let index = hash_name(&self.entries[slot].qname.name) % self.buckets.len();
            let next = self.entries[slot].next;
            if self.buckets[index] == Some(slot as u32) {
                self.buckets[index] = next;
            } else {
                let mut cursor = self.buckets[index];
                while let Some(prev) = cursor {
                    let prev = prev as usize;
                    if self.entries[prev].next == Some(slot as u32) {
                        self.entries[prev].next = next;
                        break;
                    }
                    cursor = self.entries[prev].next;
                }
            }
        }
        self.entries[slot] = NameEntry::default();
    }

    /// Write a name without touching the index
    pub(crate) fn set_raw(&mut self, slot: usize, qname: QName) {
        self.ensure_len(slot + 1);
        self.entries[slot].qname = qname;
    }

    /// Open `incr` unnamed entries at `offset`, shifting the rest up
    pub(crate) fn insert_entries(&mut self, offset: usize, incr: usize) {
        let offset = offset.min(self.entries.len());
        self.entries
            .splice(offset..offset, std::iter::repeat_n(NameEntry::default(), incr));
    }

    /// Drop the entry at `slot`, shifting the rest down
    pub(crate) fn remove_entry(&mut self, slot: usize) {
        if slot < self.entries.len() {
            self.entries.remove(slot);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &QName> {
        self.entries.iter().map(|entry| &entry.qname)
    }

    /// Walk every chain and check it only links slots whose name hashes to it
    #[cfg(test)]
    pub(crate) fn check_chains(&self, num_prop: usize) -> bool {
        let mut seen = vec![false; self.entries.len()];
        for (index, head) in self.buckets.iter().enumerate() {
            let mut cursor = *head;
            while let Some(slot) = cursor {
                let slot = slot as usize;
                if seen[slot] {
                    return false;
                }
                seen[slot] = true;
                let entry = &self.entries[slot];
                if hash_name(&entry.qname.name) % self.buckets.len() != index {
                    return false;
                }
                cursor = entry.next;
            }
        }
        if self.buckets.is_empty() {
            return true;
        }
        self.entries[..num_prop.min(self.entries.len())]
            .iter()
            .enumerate()
            .all(|(slot, entry)| entry.qname.is_empty() || seen[slot])
    }
}
