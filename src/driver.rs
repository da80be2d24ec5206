//! The endpoints are pure state machines - they are driven by an external driver that owns the
//!  (unreliable) channel, the timers and the application layer. These traits are the requests
//!  the endpoints make to the driver, abstracted to facilitate mocking for testing.

#[cfg(test)] use mockall::automock;
use crate::packet::{Message, Packet};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Side {
    Sender,
    Receiver,
}

#[cfg_attr(test, automock)]
pub trait Channel: Send + Sync + 'static {
    /// Hand a packet to the channel which may drop, delay, reorder or corrupt it
    fn send_packet(&self, from: Side, packet: Packet);
}

/// There is a single logical timer per endpoint. When it expires, the driver calls the endpoint's
///  `on_timer()` unless the timer was stopped before.
///
/// NB: Endpoints never start a timer that is running or stop a timer that is not running
#[cfg_attr(test, automock)]
pub trait RetransmitTimer: Send + Sync + 'static {
    fn start_timer(&self, side: Side, duration: f64);
    fn stop_timer(&self, side: Side);
}

#[cfg_attr(test, automock)]
pub trait MessageDispatcher: Send + Sync + 'static {
    /// Called for every message, in order and without gaps
    fn deliver(&self, side: Side, message: Message);
}
