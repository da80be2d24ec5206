use anyhow::bail;

/// Number of sequence numbers that may be in flight (sender) or buffered (receiver) at a time
pub const WINDOW_SIZE: u32 = 6;

/// Size of the wrapping sequence number space. Must be at least twice the window size so that
///  an old, already delivered sequence number can never be mistaken for a new one.
pub const SEQ_SPACE: u32 = 12;

/// Retransmission timeout in (abstract) ticks of the driver's clock
pub const RTT: f64 = 16.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SrConfig {
    /// This is the maximum number of *packets* that the sender has in flight, and at the same
    ///  time the number of packets the receiver buffers ahead of its next expected sequence number.
    ///
    /// NB: Both endpoints must be configured with the same value.
    pub window_size: u32,

    /// Sequence numbers are `0..seq_space` with wrap-around. This must be at least
    ///  `2 * window_size`, and it must fit into the 32 bit signed number fields of a packet.
    pub seq_space: u32,

    /// the duration for which the retransmission timer is armed, in ticks of the driver's clock
    pub rtt: f64,
}

impl Default for SrConfig {
    fn default() -> Self {
        SrConfig {
            window_size: WINDOW_SIZE,
            seq_space: SEQ_SPACE,
            rtt: RTT,
        }
    }
}

impl SrConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_size == 0 {
            bail!("window size must be at least 1");
        }
        if (self.seq_space as u64) < 2 * (self.window_size as u64) {
            bail!("sequence space {} is too small for window size {} - it must be at least twice the window size", self.seq_space, self.window_size);
        }
        if self.seq_space > i32::MAX as u32 {
            bail!("sequence space {} does not fit into a packet's sequence number field", self.seq_space);
        }
        if !self.rtt.is_finite() || self.rtt <= 0.0 {
            bail!("RTT must be a positive number of ticks, was {}", self.rtt);
        }

        Ok(())
    }

    /// The receiver re-acknowledges packets in this range ahead of its base even if they were
    ///  delivered already, covering ACKs that got lost on their way to the sender
    pub fn extended_window_size(&self) -> u32 {
        2 * self.window_size
    }
}
