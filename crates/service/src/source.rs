use codec::{Packet, extensions::Extensions};

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Payload type carried by every packet of the messaging channel. A single
/// dynamic payload type is enough because the channel multiplexes nothing.
pub const PAYLOAD_KIND: u8 = 96;

/// Sample-clock advance per packet: 48 kHz sampling at 20 ms per packet.
pub const TIMESTAMP_STEP: u32 = 960;

/// Outbound state of one synchronization source.
///
/// Holds the header fields that are fixed for the lifetime of the sender
/// (SSRC, payload type, CSRC list) together with the two counters the send
/// path advances once per packet emitted. The counters are never reset;
/// the caller serializes access so that building a packet and advancing
/// stay atomic per packet.
#[derive(Debug)]
pub struct Source {
    pub payload_kind: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc_list: Vec<u32>,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            payload_kind: PAYLOAD_KIND,
            sequence_number: 0,
            timestamp: wall_clock(),
            ssrc: rand::rng().random(),
            csrc_list: Vec::new(),
        }
    }
}

impl Source {
    /// Build a packet around the current counters.
    ///
    /// The extension bit of the result follows from `extensions`; version
    /// and profile tag are fixed by the codec. Does not advance anything.
    pub fn packet<'a>(&self, marker: bool, extensions: Extensions<'a>) -> Packet<'a> {
        Packet {
            marker,
            payload_kind: self.payload_kind,
            sequence_number: self.sequence_number,
            timestamp: self.timestamp,
            ssrc: self.ssrc,
            csrc: self.csrc_list.clone(),
            extensions: Some(extensions),
            payload: None,
            padding: None,
        }
    }

    /// Advance the counters after a packet has been emitted. Called exactly
    /// once per packet, fragment or not.
    pub fn advance(&mut self) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(TIMESTAMP_STEP);
    }
}

fn wall_clock() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_sequence_number() {
        let mut source = Source {
            sequence_number: u16::MAX,
            ..Default::default()
        };

        let timestamp = source.timestamp;
        source.advance();

        assert_eq!(source.sequence_number, 0);
        assert_eq!(source.timestamp, timestamp.wrapping_add(TIMESTAMP_STEP));
    }

    #[test]
    fn counters_advance_once_per_call() {
        let mut source = Source::default();
        let (sequence_number, timestamp) = (source.sequence_number, source.timestamp);

        for _ in 0..5 {
            source.advance();
        }

        assert_eq!(source.sequence_number, sequence_number.wrapping_add(5));
        assert_eq!(source.timestamp, timestamp.wrapping_add(5 * TIMESTAMP_STEP));
    }
}
