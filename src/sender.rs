use std::sync::Arc;
use bit_set::BitSet;
use tracing::{debug, trace, warn};
use crate::config::SrConfig;
use crate::driver::{Channel, RetransmitTimer, Side};
use crate::packet::{Message, Packet};
use crate::seq_buffer::SeqBuffer;
use crate::seq_space::{SeqNum, SequenceSpace};

#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct SenderStats {
    /// messages rejected because the send window was full
    pub window_full: u64,
    pub corrupted_acks: u64,
    /// valid ACKs inside the send window, including duplicates
    pub acks_received: u64,
    /// ACKs for sequence numbers that were not acknowledged before
    pub new_acks: u64,
    pub packets_resent: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    Sent(SeqNum),
    /// The message was not sent - this is flow control rather than an error, and it is the
    ///  caller's responsibility to retry later
    WindowFull,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AckOutcome {
    Corrupted,
    /// a packet without an acknowledgement number
    NotAnAck,
    OutsideWindow(SeqNum),
    Duplicate(SeqNum),
    /// a packet other than the oldest unacknowledged one was acknowledged - the window does
    ///  not move
    Acked(SeqNum),
    BaseAdvanced { acked: SeqNum, new_base: SeqNum },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimeoutOutcome {
    /// nothing in flight, so there was nothing to resend
    Idle,
    Resent(SeqNum),
}

/// Send side of the Selective Repeat protocol.
///
/// ```ascii
///  base                next_seq
///    │                    │
///  ──┼────────────────────┼──────────────────▶ seq space (wrapping)
///    │ <── in flight ───▶ │ <── sendable ───▶
/// ```
///
/// Every packet is acknowledged individually, and ACKs for packets after the base are remembered.
///  The window only moves when the base packet is acknowledged, and it then slides over all
///  packets that were acknowledged before.
///
/// There is a single retransmission timer which always covers the base packet. When it expires,
///  only the base packet is resent (not the whole window). Other lost packets are resent when
///  they become the base.
pub struct Sender {
    config: Arc<SrConfig>,
    space: SequenceSpace,
    channel: Arc<dyn Channel>,
    timer: Arc<dyn RetransmitTimer>,

    /// oldest sequence number that is not acknowledged yet. It never passes `next_seq`.
    base: SeqNum,
    /// sequence number for the next outgoing message
    next_seq: SeqNum,
    /// last packet sent for each sequence number, retained for retransmission. Only slots in
    ///  `base..next_seq` are meaningful.
    send_buffer: SeqBuffer<Packet>,
    /// acknowledged sequence numbers in the window - cleared when a slot is consumed or re-used
    acked: BitSet,
    timer_active: bool,

    stats: SenderStats,
}

impl Sender {
    pub fn new(config: Arc<SrConfig>, channel: Arc<dyn Channel>, timer: Arc<dyn RetransmitTimer>) -> anyhow::Result<Sender> {
        config.validate()?;

        let space = SequenceSpace::new(config.seq_space);
        let send_buffer = SeqBuffer::new(config.seq_space);
        let acked = BitSet::with_capacity(config.seq_space as usize);

        let mut sender = Sender {
            config,
            space,
            channel,
            timer,
            base: SeqNum::ZERO,
            next_seq: SeqNum::ZERO,
            send_buffer,
            acked,
            timer_active: false,
            stats: SenderStats::default(),
        };
        sender.init();
        Ok(sender)
    }

    /// Reset the protocol state to the start of a session. Statistics are kept.
    ///
    /// NB: This does not stop a running timer - it is the driver's responsibility to discard
    ///      timers from a previous session
    pub fn init(&mut self) {
        debug!("initializing sender: window size {}, sequence space {}", self.config.window_size, self.config.seq_space);

        self.base = SeqNum::ZERO;
        self.next_seq = SeqNum::ZERO;
        self.send_buffer.clear();
        self.acked.make_empty();
        self.timer_active = false;
    }

    pub fn base(&self) -> SeqNum {
        self.base
    }

    pub fn next_seq(&self) -> SeqNum {
        self.next_seq
    }

    /// number of packets that were sent but are not (cumulatively) acknowledged yet
    pub fn in_flight(&self) -> u32 {
        self.space.distance(self.base, self.next_seq)
    }

    pub fn is_timer_active(&self) -> bool {
        self.timer_active
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Accept a message from the application and send it if the window has room
    pub fn on_message(&mut self, message: &Message) -> SendOutcome {
        let outcome = self._on_message(message);

        match outcome {
            SendOutcome::Sent(seq) => trace!("sent packet #{}, {} packets in flight", seq, self.in_flight()),
            SendOutcome::WindowFull => debug!("send window is full with {} packets in flight - rejecting message", self.in_flight()),
        }
        outcome
    }

    fn _on_message(&mut self, message: &Message) -> SendOutcome {
        if self.in_flight() >= self.config.window_size {
            self.stats.window_full += 1;
            return SendOutcome::WindowFull;
        }

        let seq = self.next_seq;
        let packet = Packet::data(seq, message);

        self.send_buffer.insert(seq, packet.clone());
        self.acked.remove(seq.index());
        self.channel.send_packet(Side::Sender, packet);

        // the timer always covers the base packet, so it is started when the first packet goes out
        if self.base == seq && !self.timer_active {
            self.start_timer();
        }

        self.next_seq = self.space.next(seq);
        SendOutcome::Sent(seq)
    }

    /// Handle an incoming (ACK) packet
    pub fn on_packet(&mut self, packet: &Packet) -> AckOutcome {
        let outcome = self._on_packet(packet);

        match outcome {
            AckOutcome::Corrupted => debug!("received corrupted ACK packet - ignoring"),
            AckOutcome::NotAnAck => debug!("received packet without acknowledgement number - ignoring"),
            AckOutcome::OutsideWindow(ack) => debug!("received ACK #{} outside the send window starting at #{} - ignoring", ack, self.base),
            AckOutcome::Duplicate(ack) => trace!("received duplicate ACK #{}", ack),
            AckOutcome::Acked(ack) => trace!("received ACK #{}, window still starts at #{}", ack, self.base),
            AckOutcome::BaseAdvanced { acked, new_base } => trace!("received ACK #{} for the window base - window moved to #{}, {} packets in flight", acked, new_base, self.in_flight()),
        }
        outcome
    }

    fn _on_packet(&mut self, packet: &Packet) -> AckOutcome {
        if packet.is_corrupted() {
            self.stats.corrupted_acks += 1;
            return AckOutcome::Corrupted;
        }

        let ack = match packet.acknum {
            Some(ack) => ack,
            None => return AckOutcome::NotAnAck,
        };

        if !self.space.is_in_window(ack, self.base, self.config.window_size) {
            return AckOutcome::OutsideWindow(ack);
        }

        self.stats.acks_received += 1;
        let is_new = self.acked.insert(ack.index());
        if is_new {
            self.stats.new_acks += 1;
        }

        // NB: with nothing in flight, the base has not been sent yet and the window can not move
        if ack != self.base || self.base == self.next_seq {
            return if is_new {
                AckOutcome::Acked(ack)
            }
            else {
                AckOutcome::Duplicate(ack)
            };
        }

        if self.timer_active {
            self.stop_timer();
        }

        // slide the window over the base and all packets that were acknowledged out of order
        while self.base != self.next_seq && self.acked.remove(self.base.index()) {
            self.send_buffer.take(self.base);
            self.base = self.space.next(self.base);
        }

        if self.base != self.next_seq {
            self.start_timer();
        }

        AckOutcome::BaseAdvanced { acked: ack, new_base: self.base }
    }

    /// Handle expiry of the retransmission timer
    pub fn on_timer(&mut self) -> TimeoutOutcome {
        let outcome = self._on_timer();

        match outcome {
            TimeoutOutcome::Idle => debug!("timer expired with no packets in flight"),
            TimeoutOutcome::Resent(seq) => debug!("timer expired - resent packet #{}", seq),
        }
        outcome
    }

    fn _on_timer(&mut self) -> TimeoutOutcome {
        self.timer_active = false;

        if self.base == self.next_seq {
            return TimeoutOutcome::Idle;
        }

        match self.send_buffer.get(self.base) {
            Some(packet) => {
                self.channel.send_packet(Side::Sender, packet.clone());
                self.stats.packets_resent += 1;
            }
            None => {
                warn!("packet #{} is in flight but not in the send buffer - this is a bug", self.base);
            }
        }

        self.start_timer();
        TimeoutOutcome::Resent(self.base)
    }

    fn start_timer(&mut self) {
        self.timer.start_timer(Side::Sender, self.config.rtt);
        self.timer_active = true;
    }

    fn stop_timer(&mut self) {
        self.timer.stop_timer(Side::Sender);
        self.timer_active = false;
    }
}
