//! Endpoint logic of a Selective Repeat ARQ protocol: reliable, in-order delivery of fixed-size
//!  messages over a channel that may lose, reorder or corrupt packets.
//!
//! ## Design
//!
//! * There are two endpoints, a [sender::Sender] and a [receiver::Receiver]. Data flows in one
//!   direction only, ACKs flow back.
//! * Both endpoints are pure state machines reacting to events from an external driver:
//!   initialization, a message from the application (sender), a packet from the channel, and
//!   expiry of a timer (sender). They react synchronously and never block.
//! * The driver owns the channel, the timers and the application layer, and the endpoints talk
//!   to it through the traits in [driver]. There is no notion of wall-clock time - timer durations
//!   are ticks of the driver's clock.
//! * Anomalies (corruption, stale or duplicate packets, a full send window) are regular protocol
//!   conditions, not errors. Every entry point returns an outcome describing what happened, and
//!   the endpoints keep counters for statistics.
//!
//! ## Sequence numbers and windows
//!
//! Sequence numbers wrap around in a space of `seq_space` values, which must be at least twice
//!  the window size so that sender and receiver windows never alias. All window membership tests
//!  are based on [seq_space::SequenceSpace::is_in_window].
//!
//! The sender has at most `window_size` packets in flight. Every packet is acknowledged
//!  individually, but the window only moves when its base packet is acknowledged - it then slides
//!  over all packets that were acknowledged out of order.
//!
//! There is a single retransmission timer per sender, and it always covers the base packet. On
//!  expiry, only the base packet is resent. This approximates per-packet timers: any other lost
//!  packet is recovered when it becomes the base.
//!
//! The receiver buffers packets in its window `[base, base + window_size)` and delivers the
//!  gap-free prefix as soon as it is complete. It acknowledges every valid packet in an extended
//!  range of `2 * window_size` ending at the end of its window - this includes packets that were
//!  delivered already, in case their ACK was lost. Corrupted packets are never acknowledged.
//!
//! ## Packet format
//!
//! See [packet] for the fixed-width wire representation and the checksum.
//!
//! TODO per-packet timers would resend lost non-base packets without waiting for them to become
//!  the base, but this changes retransmission timing and requires a timer per sequence number in
//!  the driver interface

pub mod config;
pub mod driver;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq_buffer;
pub mod seq_space;
pub mod test_util;
