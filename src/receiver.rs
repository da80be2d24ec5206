use std::sync::Arc;
use bit_set::BitSet;
use tracing::{debug, trace};
use crate::config::SrConfig;
use crate::driver::{Channel, MessageDispatcher, Side};
use crate::packet::{Message, Packet};
use crate::seq_buffer::SeqBuffer;
use crate::seq_space::{SeqNum, SequenceSpace};

#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct ReceiverStats {
    pub corrupted_packets: u64,
    /// data packets with a valid checksum, including duplicates and stale packets
    pub packets_received: u64,
    pub acks_sent: u64,
    pub packets_delivered: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReceiveOutcome {
    /// discarded without an ACK - the sender recovers through its timeout
    Corrupted,
    /// a packet without a sequence number
    NotData,
    /// too far behind the receive window to be acknowledged again
    TooOld(SeqNum),
    /// delivered before and re-acknowledged, presumably because the ACK got lost
    AlreadyDelivered(SeqNum),
    /// buffered before and re-acknowledged
    Duplicate(SeqNum),
    /// acknowledged and buffered, waiting for a gap before it to be filled
    Buffered(SeqNum),
    /// acknowledged, and the receive window moved with `count` messages delivered
    Delivered { count: u32, new_base: SeqNum },
}

/// Receive side of the Selective Repeat protocol.
///
/// Packets inside the receive window `[base, base + window_size)` are acknowledged individually
///  and buffered, and messages are delivered to the application as soon as they form a gap-free
///  sequence starting at `base`.
///
/// Packets in an extended range of `2 * window_size` ending at `base + window_size` are
///  acknowledged even if they were delivered before: Their original ACK may have been lost, and
///  the sender would otherwise retransmit them forever. Packets outside that range are dropped
///  without reply.
pub struct Receiver {
    config: Arc<SrConfig>,
    space: SequenceSpace,
    channel: Arc<dyn Channel>,
    message_dispatcher: Arc<dyn MessageDispatcher>,

    /// the smallest sequence number that was not delivered yet
    base: SeqNum,
    /// packets received out of order, waiting for in-order delivery
    receive_buffer: SeqBuffer<Packet>,
    /// sequence numbers in the receive window that are buffered. Cleared on delivery, so the
    ///  slot is free for the next occupant after wrap-around.
    received: BitSet,

    stats: ReceiverStats,
}

impl Receiver {
    pub fn new(config: Arc<SrConfig>, channel: Arc<dyn Channel>, message_dispatcher: Arc<dyn MessageDispatcher>) -> anyhow::Result<Receiver> {
        config.validate()?;

        let space = SequenceSpace::new(config.seq_space);
        let receive_buffer = SeqBuffer::new(config.seq_space);
        let received = BitSet::with_capacity(config.seq_space as usize);

        let mut receiver = Receiver {
            config,
            space,
            channel,
            message_dispatcher,
            base: SeqNum::ZERO,
            receive_buffer,
            received,
            stats: ReceiverStats::default(),
        };
        receiver.init();
        Ok(receiver)
    }

    /// Reset the protocol state to the start of a session. Statistics are kept.
    pub fn init(&mut self) {
        debug!("initializing receiver: window size {}, sequence space {}", self.config.window_size, self.config.seq_space);

        self.base = SeqNum::ZERO;
        self.receive_buffer.clear();
        self.received.make_empty();
    }

    pub fn base(&self) -> SeqNum {
        self.base
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// number of packets buffered, waiting for a gap to be filled
    pub fn num_buffered(&self) -> usize {
        self.received.count()
    }

    /// Handle an incoming data packet
    pub fn on_packet(&mut self, packet: &Packet) -> ReceiveOutcome {
        let outcome = self._on_packet(packet);

        match outcome {
            ReceiveOutcome::Corrupted => debug!("received corrupted packet - dropping it without ACK"),
            ReceiveOutcome::NotData => debug!("received packet without sequence number - ignoring"),
            ReceiveOutcome::TooOld(seq) => debug!("received packet #{} which is too old to be acknowledged - ignoring", seq),
            ReceiveOutcome::AlreadyDelivered(seq) => debug!("received packet #{} which was delivered before - re-sent ACK", seq),
            ReceiveOutcome::Duplicate(seq) => trace!("received duplicate of buffered packet #{} - re-sent ACK", seq),
            ReceiveOutcome::Buffered(seq) => trace!("received packet #{} out of order - buffered, waiting for #{}", seq, self.base),
            ReceiveOutcome::Delivered { count, new_base } => trace!("delivered {} messages, now waiting for #{}", count, new_base),
        }
        outcome
    }

    fn _on_packet(&mut self, packet: &Packet) -> ReceiveOutcome {
        if packet.is_corrupted() {
            self.stats.corrupted_packets += 1;
            return ReceiveOutcome::Corrupted;
        }

        let seq = match packet.seqnum {
            Some(seq) => seq,
            None => return ReceiveOutcome::NotData,
        };
        self.stats.packets_received += 1;

        let extended_base = self.space.sub(self.base, self.config.window_size);
        if !self.space.is_in_window(seq, extended_base, self.config.extended_window_size()) {
            return ReceiveOutcome::TooOld(seq);
        }

        self.channel.send_packet(Side::Receiver, Packet::ack(seq));
        self.stats.acks_sent += 1;

        if !self.space.is_in_window(seq, self.base, self.config.window_size) {
            return ReceiveOutcome::AlreadyDelivered(seq);
        }

        if !self.received.insert(seq.index()) {
            return ReceiveOutcome::Duplicate(seq);
        }
        self.receive_buffer.insert(seq, packet.clone());

        if seq != self.base {
            return ReceiveOutcome::Buffered(seq);
        }

        let mut count = 0;
        while self.received.remove(self.base.index()) {
            if let Some(buffered) = self.receive_buffer.take(self.base) {
                self.message_dispatcher.deliver(Side::Receiver, buffered.message());
                self.stats.packets_delivered += 1;
                count += 1;
            }
            self.base = self.space.next(self.base);
        }

        ReceiveOutcome::Delivered { count, new_base: self.base }
    }

    /// The protocol runs in one direction only, so the receiver does not send messages
    pub fn on_message(&mut self, message: &Message) {
        debug!("receiver does not send messages - ignoring {:?}", message);
    }

    /// The receiver never starts a timer, so this is not expected to be called
    pub fn on_timer(&mut self) {
        debug!("receiver timer expired - ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockChannel, MockMessageDispatcher};
    use crate::packet::PAYLOAD_LEN;
    use crate::test_util::{RecordingChannel, RecordingDispatcher};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use rstest::rstest;

    fn s(raw: u32) -> SeqNum {
        SeqNum::from_raw(raw)
    }

    fn message(n: u8) -> Message {
        Message::new([b'A' + n; PAYLOAD_LEN])
    }

    fn data(raw: u32) -> Packet {
        Packet::data(s(raw), &message(raw as u8))
    }

    fn recording_receiver() -> (Receiver, Arc<RecordingChannel>, Arc<RecordingDispatcher>) {
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let receiver = Receiver::new(Arc::new(SrConfig::default()), channel.clone(), dispatcher.clone()).unwrap();
        (receiver, channel, dispatcher)
    }

    fn acks(channel: &RecordingChannel) -> Vec<u32> {
        channel.take_packets().into_iter()
            .map(|p| {
                assert!(!p.is_corrupted());
                assert_eq!(p.seqnum, None);
                p.acknum.unwrap().to_raw()
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SrConfig { window_size: 0, seq_space: 12, rtt: 16.0 };
        assert!(Receiver::new(Arc::new(config), Arc::new(MockChannel::new()), Arc::new(MockMessageDispatcher::new())).is_err());
    }

    #[test]
    fn test_in_order_packet_is_acked_and_delivered() {
        let mut channel = MockChannel::new();
        channel.expect_send_packet()
            .once()
            .with(eq(Side::Receiver), eq(Packet::ack(s(0))))
            .return_const(());
        let mut dispatcher = MockMessageDispatcher::new();
        dispatcher.expect_deliver()
            .once()
            .with(eq(Side::Receiver), eq(message(0)))
            .return_const(());

        let mut receiver = Receiver::new(Arc::new(SrConfig::default()), Arc::new(channel), Arc::new(dispatcher)).unwrap();
        assert_eq!(receiver.on_packet(&data(0)), ReceiveOutcome::Delivered { count: 1, new_base: s(1) });
        assert_eq!(receiver.base(), s(1));
    }

    #[test]
    fn test_gap_is_filled_by_delayed_packet() {
        let mut channel = MockChannel::new();
        channel.expect_send_packet()
            .times(3)
            .return_const(());

        let mut dispatcher = MockMessageDispatcher::new();
        let mut sequence = Sequence::new();
        for n in 0..3 {
            dispatcher.expect_deliver()
                .once()
                .in_sequence(&mut sequence)
                .with(eq(Side::Receiver), eq(message(n)))
                .return_const(());
        }

        let mut receiver = Receiver::new(Arc::new(SrConfig::default()), Arc::new(channel), Arc::new(dispatcher)).unwrap();

        assert_eq!(receiver.on_packet(&data(0)), ReceiveOutcome::Delivered { count: 1, new_base: s(1) });
        assert_eq!(receiver.on_packet(&data(2)), ReceiveOutcome::Buffered(s(2)));
        assert_eq!(receiver.base(), s(1));
        assert_eq!(receiver.num_buffered(), 1);

        assert_eq!(receiver.on_packet(&data(1)), ReceiveOutcome::Delivered { count: 2, new_base: s(3) });
        assert_eq!(receiver.base(), s(3));
        assert_eq!(receiver.num_buffered(), 0);
        assert!(receiver.receive_buffer.is_empty());
        assert_eq!(receiver.stats().packets_delivered, 3);
    }

    #[test]
    fn test_delivery_stops_at_gap() {
        let (mut receiver, channel, dispatcher) = recording_receiver();

        for raw in [5, 3, 1, 2] {
            assert_eq!(receiver.on_packet(&data(raw)), ReceiveOutcome::Buffered(s(raw)));
        }
        assert!(dispatcher.delivered().is_empty());
        assert_eq!(acks(&channel), vec![5, 3, 1, 2]);

        assert_eq!(receiver.on_packet(&data(0)), ReceiveOutcome::Delivered { count: 4, new_base: s(4) });
        assert_eq!(dispatcher.take_messages(), (0..4).map(message).collect::<Vec<_>>());
        assert_eq!(receiver.num_buffered(), 1);

        assert_eq!(receiver.on_packet(&data(4)), ReceiveOutcome::Delivered { count: 2, new_base: s(6) });
        assert_eq!(dispatcher.take_messages(), vec![message(4), message(5)]);
    }

    #[test]
    fn test_buffered_duplicate_is_reacked_but_not_redelivered() {
        let (mut receiver, channel, dispatcher) = recording_receiver();

        assert_eq!(receiver.on_packet(&data(3)), ReceiveOutcome::Buffered(s(3)));
        assert_eq!(receiver.on_packet(&data(3)), ReceiveOutcome::Duplicate(s(3)));
        assert_eq!(acks(&channel), vec![3, 3]);

        for raw in 0..3 {
            receiver.on_packet(&data(raw));
        }
        assert_eq!(dispatcher.take_messages(), (0..4).map(message).collect::<Vec<_>>());
        assert_eq!(receiver.base(), s(4));
    }

    #[test]
    fn test_delivered_duplicate_is_reacked_but_not_redelivered() {
        let (mut receiver, channel, dispatcher) = recording_receiver();
        receiver.on_packet(&data(0));
        receiver.on_packet(&data(1));
        dispatcher.take_messages();
        channel.take_packets();

        assert_eq!(receiver.on_packet(&data(0)), ReceiveOutcome::AlreadyDelivered(s(0)));
        assert_eq!(acks(&channel), vec![0]);
        assert!(dispatcher.delivered().is_empty());
        assert_eq!(receiver.base(), s(2));
        assert_eq!(receiver.num_buffered(), 0);
    }

    #[test]
    fn test_corrupted_packet_is_dropped_without_ack() {
        let mut channel = MockChannel::new();
        channel.expect_send_packet()
            .never();
        let mut dispatcher = MockMessageDispatcher::new();
        dispatcher.expect_deliver()
            .never();

        let mut receiver = Receiver::new(Arc::new(SrConfig::default()), Arc::new(channel), Arc::new(dispatcher)).unwrap();

        let mut packet = data(0);
        packet.checksum ^= 0x100;
        assert_eq!(receiver.on_packet(&packet), ReceiveOutcome::Corrupted);
        assert_eq!(receiver.base(), s(0));
        assert_eq!(receiver.num_buffered(), 0);
        assert_eq!(receiver.stats(), ReceiverStats {
            corrupted_packets: 1,
            packets_received: 0,
            acks_sent: 0,
            packets_delivered: 0,
        });
    }

    #[test]
    fn test_corrupted_packet_then_valid_retransmission() {
        let (mut receiver, channel, dispatcher) = recording_receiver();
        for raw in 0..4 {
            receiver.on_packet(&data(raw));
        }
        channel.take_packets();
        dispatcher.take_messages();

        let mut corrupted = data(4);
        corrupted.payload[7] = b'#';
        assert_eq!(receiver.on_packet(&corrupted), ReceiveOutcome::Corrupted);
        assert!(channel.sent().is_empty());
        assert_eq!(receiver.base(), s(4));
        assert_eq!(receiver.num_buffered(), 0);

        assert_eq!(receiver.on_packet(&data(4)), ReceiveOutcome::Delivered { count: 1, new_base: s(5) });
        assert_eq!(acks(&channel), vec![4]);
        assert_eq!(dispatcher.take_messages(), vec![message(4)]);
    }

    #[test]
    fn test_packet_without_seqnum_is_ignored() {
        let (mut receiver, channel, _) = recording_receiver();
        assert_eq!(receiver.on_packet(&Packet::ack(s(0))), ReceiveOutcome::NotData);
        assert!(channel.sent().is_empty());
        assert_eq!(receiver.stats().packets_received, 0);
    }

    #[rstest]
    #[case::ahead_of_window(6)]
    #[case::just_behind_window(11)]
    #[case::far_behind_window(7)]
    fn test_outside_receive_window_is_reacked_only(#[case] raw: u32) {
        let (mut receiver, channel, dispatcher) = recording_receiver();

        // with a sequence space of exactly twice the window size, the extended range covers
        //  everything
        assert_eq!(receiver.on_packet(&data(raw)), ReceiveOutcome::AlreadyDelivered(s(raw)));
        assert_eq!(acks(&channel), vec![raw]);
        assert!(dispatcher.delivered().is_empty());
        assert_eq!(receiver.num_buffered(), 0);
    }

    #[rstest]
    #[case::just_behind_window(19, ReceiveOutcome::AlreadyDelivered(s(19)))]
    #[case::start_of_extended_range(14, ReceiveOutcome::AlreadyDelivered(s(14)))]
    #[case::before_extended_range(13, ReceiveOutcome::TooOld(s(13)))]
    #[case::far_before_extended_range(0, ReceiveOutcome::TooOld(s(0)))]
    #[case::far_ahead(27, ReceiveOutcome::TooOld(s(27)))]
    #[case::outside_seq_space(40, ReceiveOutcome::TooOld(s(40)))]
    #[case::in_window(22, ReceiveOutcome::Buffered(s(22)))]
    fn test_extended_acceptance_range(#[case] raw: u32, #[case] expected: ReceiveOutcome) {
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let config = SrConfig { window_size: 6, seq_space: 32, rtt: 16.0 };
        let mut receiver = Receiver::new(Arc::new(config), channel.clone(), dispatcher.clone()).unwrap();
        receiver.base = s(20);

        assert_eq!(receiver.on_packet(&data(raw)), expected);

        let expected_acks = match expected {
            ReceiveOutcome::TooOld(_) => vec![],
            _ => vec![raw],
        };
        assert_eq!(acks(&channel), expected_acks);
        assert!(dispatcher.delivered().is_empty());
        assert_eq!(receiver.base(), s(20));
    }

    #[test]
    fn test_window_wraps_around() {
        let (mut receiver, channel, dispatcher) = recording_receiver();
        for raw in 0..10 {
            receiver.on_packet(&data(raw));
        }
        assert_eq!(receiver.base(), s(10));
        dispatcher.take_messages();
        channel.take_packets();

        assert_eq!(receiver.on_packet(&data(1)), ReceiveOutcome::Buffered(s(1)));
        assert_eq!(receiver.on_packet(&data(11)), ReceiveOutcome::Buffered(s(11)));
        assert_eq!(receiver.on_packet(&data(0)), ReceiveOutcome::Buffered(s(0)));
        // stale slot of the previous occupant of #4 is outside the window
        assert_eq!(receiver.on_packet(&data(4)), ReceiveOutcome::AlreadyDelivered(s(4)));

        assert_eq!(receiver.on_packet(&data(10)), ReceiveOutcome::Delivered { count: 4, new_base: s(2) });
        assert_eq!(dispatcher.take_messages(), vec![message(10), message(11), message(0), message(1)]);
        assert_eq!(acks(&channel), vec![1, 11, 0, 4, 10]);
    }

    #[test]
    fn test_reverse_direction_is_inert() {
        let mut channel = MockChannel::new();
        channel.expect_send_packet()
            .never();
        let mut dispatcher = MockMessageDispatcher::new();
        dispatcher.expect_deliver()
            .never();

        let mut receiver = Receiver::new(Arc::new(SrConfig::default()), Arc::new(channel), Arc::new(dispatcher)).unwrap();
        receiver.on_message(&message(0));
        receiver.on_timer();
        assert_eq!(receiver.base(), SeqNum::ZERO);
    }

    #[test]
    fn test_init_resets_state() {
        let (mut receiver, _, _) = recording_receiver();
        receiver.on_packet(&data(0));
        receiver.on_packet(&data(2));

        receiver.init();
        assert_eq!(receiver.base(), SeqNum::ZERO);
        assert_eq!(receiver.num_buffered(), 0);
        assert!(receiver.receive_buffer.is_empty());
        assert_eq!(receiver.stats().packets_delivered, 1);
    }
}
