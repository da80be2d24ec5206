use crate::seq_space::SeqNum;

/// Fixed-capacity buffer with one slot per sequence number. It never grows: sequence numbers wrap
///  around, and a slot is re-used by the next occupant once its previous content was consumed.
///
/// NB: The buffer does not know anything about windows - it is the owner's responsibility to
///      keep track of which slots are meaningful
pub struct SeqBuffer<V> {
    slots: Vec<Option<V>>,
}

impl<V> SeqBuffer<V> {
    pub fn new(seq_space: u32) -> SeqBuffer<V> {
        SeqBuffer {
            slots: (0..seq_space).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    /// Returns the previous content of the slot, if any
    pub fn insert(&mut self, seq: SeqNum, value: V) -> Option<V> {
        self.slots.get_mut(seq.index())
            .and_then(|slot| slot.replace(value))
    }

    pub fn get(&self, seq: SeqNum) -> Option<&V> {
        self.slots.get(seq.index())
            .and_then(|slot| slot.as_ref())
    }

    pub fn take(&mut self, seq: SeqNum) -> Option<V> {
        self.slots.get_mut(seq.index())
            .and_then(|slot| slot.take())
    }

    pub fn len(&self) -> usize {
        self.slots.iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
