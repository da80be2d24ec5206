//! Tracking implementations of the driver traits. They are used for testing the endpoints
//!  themselves, but they are also exported so applications can test their own driver code.

use std::collections::HashSet;
use std::sync::Mutex;
use crate::driver::{Channel, MessageDispatcher, RetransmitTimer, Side};
use crate::packet::{Message, Packet};

#[derive(Debug, Default)]
pub struct RecordingChannel {
    tracker: Mutex<Vec<(Side, Packet)>>,
}
impl RecordingChannel {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn sent(&self) -> Vec<(Side, Packet)> {
        self.tracker.lock().unwrap().clone()
    }

    /// remove and return all packets sent so far
    pub fn take_packets(&self) -> Vec<Packet> {
        self.tracker.lock().unwrap()
            .drain(..)
            .map(|(_, packet)| packet)
            .collect()
    }

    pub fn assert_no_remaining_packets(&self) {
        assert!(
            self.tracker.lock().unwrap()
                .is_empty()
        );
    }
}

impl Channel for RecordingChannel {
    fn send_packet(&self, from: Side, packet: Packet) {
        self.tracker.lock().unwrap().push((from, packet));
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TimerEvent {
    Started(Side, f64),
    Stopped(Side),
}

/// Records timer requests. It panics if a timer is started while running or stopped while not
///  running, since there is only one timer per endpoint.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    events: Mutex<Vec<TimerEvent>>,
    running: Mutex<HashSet<Side>>,
}
impl RecordingTimer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn events(&self) -> Vec<TimerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take_events(&self) -> Vec<TimerEvent> {
        self.events.lock().unwrap()
            .drain(..)
            .collect()
    }

    pub fn is_running(&self, side: Side) -> bool {
        self.running.lock().unwrap()
            .contains(&side)
    }

    /// simulate expiry: the timer is not running afterwards, and the caller is expected to
    ///  call the endpoint's `on_timer()`
    pub fn expire(&self, side: Side) {
        let was_running = self.running.lock().unwrap().remove(&side);
        assert!(was_running, "expiring a timer for {:?} that is not running", side);
    }
}

impl RetransmitTimer for RecordingTimer {
    fn start_timer(&self, side: Side, duration: f64) {
        let newly_started = self.running.lock().unwrap().insert(side);
        assert!(newly_started, "timer for {:?} started while it is running", side);
        self.events.lock().unwrap().push(TimerEvent::Started(side, duration));
    }

    fn stop_timer(&self, side: Side) {
        let was_running = self.running.lock().unwrap().remove(&side);
        assert!(was_running, "timer for {:?} stopped while it is not running", side);
        self.events.lock().unwrap().push(TimerEvent::Stopped(side));
    }
}

#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    tracker: Mutex<Vec<(Side, Message)>>,
}
impl RecordingDispatcher {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn delivered(&self) -> Vec<Message> {
        self.tracker.lock().unwrap()
            .iter()
            .map(|(_, msg)| *msg)
            .collect()
    }

    pub fn take_messages(&self) -> Vec<Message> {
        self.tracker.lock().unwrap()
            .drain(..)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl MessageDispatcher for RecordingDispatcher {
    fn deliver(&self, side: Side, message: Message) {
        self.tracker.lock().unwrap().push((side, message));
    }
}
