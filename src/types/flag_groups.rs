//! Flag-group constants for the event bus
//!
//! Each task owns one group. Groups never overlap; every bit has a single
//! consumer. Connectivity of the long-range link is fanned out by its task
//! into the `LINK_UP`/`LINK_DOWN` bits of the stream and telemetry groups.
//!
//! Within one wake a task handles its bits in the order the constants are
//! listed in its group (connect before disconnect before message bits).

use super::EventFlags;

// Short-range link group (0x000F)
pub mod ble {
    use super::EventFlags;

    pub const CONNECTED: EventFlags = EventFlags(0x0001);
    pub const DISCONNECTED: EventFlags = EventFlags(0x0002);
    pub const RECV_MSG: EventFlags = EventFlags(0x0004);
    pub const SEND_MSG: EventFlags = EventFlags(0x0008);

    pub const MASK: EventFlags = EventFlags(0x000F);
    pub const ORDER: [EventFlags; 4] = [CONNECTED, DISCONNECTED, RECV_MSG, SEND_MSG];
}

// Long-range link group (0x00F0)
pub mod wifi {
    use super::EventFlags;

    pub const CONNECTED: EventFlags = EventFlags(0x0010);
    pub const DISCONNECTED: EventFlags = EventFlags(0x0020);
    pub const START: EventFlags = EventFlags(0x0040);
    pub const STOP: EventFlags = EventFlags(0x0080);

    pub const MASK: EventFlags = EventFlags(0x00F0);
    pub const ORDER: [EventFlags; 4] = [CONNECTED, DISCONNECTED, START, STOP];
}

// EKG pipeline group (0x0700)
pub mod ekg {
    use super::EventFlags;

    pub const START: EventFlags = EventFlags(0x0100);
    pub const STOP: EventFlags = EventFlags(0x0200);
    pub const TICK: EventFlags = EventFlags(0x0400);

    pub const MASK: EventFlags = EventFlags(0x0700);
    pub const ORDER: [EventFlags; 3] = [START, STOP, TICK];
}

// Stream group (0x1F000)
pub mod stream {
    use super::EventFlags;

    pub const LINK_UP: EventFlags = EventFlags(0x0_1000);
    pub const LINK_DOWN: EventFlags = EventFlags(0x0_2000);
    pub const START: EventFlags = EventFlags(0x0_4000);
    pub const STOP: EventFlags = EventFlags(0x0_8000);
    pub const TICK: EventFlags = EventFlags(0x1_0000);

    pub const MASK: EventFlags = EventFlags(0x1_F000);
    pub const ORDER: [EventFlags; 5] = [LINK_UP, LINK_DOWN, START, STOP, TICK];
}

// Telemetry group (0x3E0000)
pub mod telemetry {
    use super::EventFlags;

    pub const LINK_UP: EventFlags = EventFlags(0x02_0000);
    pub const LINK_DOWN: EventFlags = EventFlags(0x04_0000);
    pub const START: EventFlags = EventFlags(0x08_0000);
    pub const STOP: EventFlags = EventFlags(0x10_0000);
    pub const TICK: EventFlags = EventFlags(0x20_0000);

    pub const MASK: EventFlags = EventFlags(0x3E_0000);
    pub const ORDER: [EventFlags; 5] = [LINK_UP, LINK_DOWN, START, STOP, TICK];
}

/// All group masks, in task order.
pub const ALL_GROUPS: [EventFlags; 5] = [ble::MASK, wifi::MASK, ekg::MASK, stream::MASK, telemetry::MASK];
