use std::fmt::{Display, Formatter};

/// A sequence number, i.e. a value in `0..seq_space`. Arithmetic on sequence numbers wraps around,
///  so it is done through [SequenceSpace] which knows the modulus.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SeqNum(u32);

impl Display for SeqNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SeqNum {
    pub const ZERO: SeqNum = SeqNum(0);

    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    /// slot of this sequence number in per-sequence-number buffers and flag sets
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SequenceSpace {
    size: u32,
}

impl SequenceSpace {
    pub fn new(size: u32) -> SequenceSpace {
        assert!(size > 0, "sequence space must not be empty");
        SequenceSpace { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn contains(&self, seq: SeqNum) -> bool {
        seq.0 < self.size
    }

    pub fn next(&self, seq: SeqNum) -> SeqNum {
        self.add(seq, 1)
    }

    pub fn add(&self, seq: SeqNum, n: u32) -> SeqNum {
        SeqNum(((seq.0 as u64 + n as u64) % self.size as u64) as u32)
    }

    pub fn sub(&self, seq: SeqNum, n: u32) -> SeqNum {
        let n = n % self.size;
        self.add(seq, self.size - n)
    }

    /// number of steps from `from` forward to `to`, i.e. `(to - from) mod size`
    pub fn distance(&self, from: SeqNum, to: SeqNum) -> u32 {
        ((to.0 as u64 + self.size as u64 - from.0 as u64) % self.size as u64) as u32
    }

    /// Circular membership test: is `seq` in the window of `window_size` sequence numbers that
    ///  starts at `base`?
    ///
    /// NB: If the window covers the whole sequence space (i.e. its end coincides with `base`),
    ///      every sequence number is in the window.
    pub fn is_in_window(&self, seq: SeqNum, base: SeqNum, window_size: u32) -> bool {
        if !self.contains(seq) {
            return false;
        }

        let end = self.add(base, window_size);
        if base < end {
            base <= seq && seq < end
        }
        else {
            seq >= base || seq < end
        }
    }
}
