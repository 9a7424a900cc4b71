use crate::item::ItemId;

/// Selected scene items, backed by a bitset over `ItemId::index()`.
///
/// Iteration yields ids in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    words: Vec<u64>,
    len: usize,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, item: ItemId) -> bool {
        let (word, bit) = word_bit(item.index());
        self.words
            .get(word)
            .is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// Returns `true` if the set changed.
    pub fn insert(&mut self, item: ItemId) -> bool {
        let (word, bit) = word_bit(item.index());
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let w = &mut self.words[word];
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        self.len += 1;
        true
    }

    /// Returns `true` if the set changed.
    pub fn remove(&mut self, item: ItemId) -> bool {
        let (word, bit) = word_bit(item.index());
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << bit;
        if (*w & mask) == 0 {
            return false;
        }
        *w &= !mask;
        self.len -= 1;
        true
    }

    pub fn select_only(&mut self, item: ItemId) {
        self.clear();
        self.insert(item);
    }

    /// The selected item when exactly one is selected.
    pub fn sole(&self) -> Option<ItemId> {
        if self.len != 1 {
            return None;
        }
        self.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.words.iter().enumerate().flat_map(|(w, bits)| {
            let base = (w as u32) * 64;
            (0..64u32)
                .filter(move |b| bits & (1u64 << b) != 0)
                .map(move |b| ItemId(base + b))
        })
    }
}

fn word_bit(index: u32) -> (usize, u32) {
    ((index / 64) as usize, index % 64)
}
