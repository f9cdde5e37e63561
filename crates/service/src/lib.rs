//! ## Messaging channel over RTP
//!
//! The protocol logic of the messenger: turning outgoing messages into RTP
//! datagrams and incoming datagrams back into messages. A message that fits
//! one datagram travels whole; anything larger is fragmented across several
//! packets and reassembled on the far side, tolerating reordered arrival.
//!
//! Nothing here touches a socket. [`Channel::send`] hands back the wire
//! bytes to transmit and [`Channel::recv`] consumes the wire bytes of one
//! received datagram, which keeps the transport a thin loop around the
//! channel.

pub mod fragment;
pub mod reassembly;
pub mod source;

use self::{reassembly::ReassemblyBuffer, source::Source};

use bytes::BytesMut;
use codec::Packet;
use parking_lot::Mutex;

/// Protocol violations on either the send or the receive path.
///
/// Receive-side errors condemn a single datagram or fragment, never the
/// channel; the receive loop logs them and keeps reading. Send-side errors
/// reject the whole message with nothing transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    EmptyMessage,
    MessageTooLarge,
    InvalidFragmentInfo,
    EmptyFragmentData,
    InconsistentTotalFragments,
    MissingFragment,
    Codec(codec::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<codec::Error> for Error {
    fn from(value: codec::Error) -> Self {
        Self::Codec(value)
    }
}

/// A complete message delivered by the receive path, tagged with the
/// sender identity taken from the packet that completed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub message: Vec<u8>,
}

/// One end of a peer-to-peer messaging channel.
///
/// Owns the outbound source counters and the inbound reassembly buffer.
/// Both sides are internally locked: concurrent senders advance the
/// counters atomically per packet, and the single receive path may live on
/// its own task.
#[derive(Debug, Default)]
pub struct Channel {
    source: Mutex<Source>,
    buffer: ReassemblyBuffer,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local synchronization source identifier.
    pub fn ssrc(&self) -> u32 {
        self.source.lock().ssrc
    }

    /// Turn a message into the datagrams that carry it, in send order.
    ///
    /// Note that even an unfragmented message rides in an extension
    /// element rather than the packet payload; see [`Channel::recv`] for
    /// how the receive side tells the cases apart. This matches what the
    /// channel has always put on the wire.
    pub fn send(&self, message: &[u8]) -> Result<Vec<BytesMut>, Error> {
        let mut source = self.source.lock();
        fragment::fragment(&mut source, message)
    }

    /// Consume one received datagram.
    ///
    /// Returns a [`Delivery`] when the datagram completes a message: either
    /// an unfragmented message, delivered immediately, or the last missing
    /// fragment of the in-flight one. Returns `None` when the fragment was
    /// absorbed but the message is still incomplete.
    ///
    /// A packet is treated as a fragment only when it carries a data-chunk
    /// element; a lone descriptor-slot element holds an entire unfragmented
    /// message, not a descriptor. Packets with no extensions at all deliver
    /// their primary payload, so a peer speaking plain RTP still gets
    /// through.
    pub fn recv(&self, datagram: &[u8]) -> Result<Option<Delivery>, Error> {
        let packet = Packet::try_from(datagram)?;
        let (ssrc, sequence_number) = (packet.ssrc, packet.sequence_number);

        let deliver = |message: Vec<u8>| Delivery {
            ssrc,
            sequence_number,
            message,
        };

        match packet.extensions {
            Some(ref extensions) => {
                if let Some(chunk) = extensions.get(fragment::CHUNK_ID) {
                    let info = extensions.get(fragment::DESCRIPTOR_ID).unwrap_or(&[]);
                    Ok(self.buffer.process(info, chunk)?.map(deliver))
                } else {
                    let message = extensions
                        .0
                        .first()
                        .map(|extension| extension.data)
                        .or(packet.payload)
                        .unwrap_or(&[]);

                    Ok(Some(deliver(message.to_vec())))
                }
            }
            None => Ok(Some(deliver(
                packet.payload.unwrap_or(&[]).to_vec(),
            ))),
        }
    }
}
