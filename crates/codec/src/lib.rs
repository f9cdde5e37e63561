//! ## RTP framing for the messaging channel
//!
//! Encoding and decoding of the RTP data packets this messenger exchanges
//! over UDP. Each datagram is one RTP packet: the fixed twelve-byte header,
//! an optional CSRC list, an optional header-extension region, and an
//! optional payload.
//!
//! ```bash
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        0xBEDE (when X)        |         element count         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      id       |    length     |         value  ....           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        payload  ....                          |
//! ```
//!
//! The extension region carries a list of (identifier, length, value)
//! elements under the 0xBEDE profile tag. Elements are addressed by
//! identifier, never by position; the messaging protocol reserves two of
//! them for fragment metadata and fragment data. A byte-sized length field
//! lets a single element carry up to 255 value bytes, which the fragment
//! data elements need.

pub mod extensions;

use self::extensions::Extensions;

use bytes::{Buf, BufMut, BytesMut};

const MARKER_MASK: u8 = 0b10000000;
const VERSION_MASK: u8 = 0b11000000;
const PADDING_MASK: u8 = 0b00100000;
const EXTENSION_MASK: u8 = 0b00010000;
const CSRC_COUNT_MASK: u8 = 0b00001111;
const PAYLOAD_KIND_MASK: u8 = 0b01111111;

const LE_CSRC_COUNT_MASK: u8 = !CSRC_COUNT_MASK;
const LE_PAYLOAD_KIND_MASK: u8 = !PAYLOAD_KIND_MASK;

/// Structural decode failures.
///
/// Any of these means the datagram does not parse as a packet of this
/// protocol; the datagram is dropped and the receive loop moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    PacketTooShort,
    UnsupportedVersion,
    InvalidExtensionProfile,
    InvalidExtensionElement,
    TruncatedExtensions,
    InvalidPadding,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One RTP data packet.
///
/// Decoding borrows the extension values and the payload straight out of
/// the input buffer, so a decoded packet must not outlive the datagram it
/// was read from. Anything that has to survive the next socket read (the
/// reassembly buffer does) copies the bytes out.
///
/// The extension and padding bits of the wire header are derived from the
/// `extensions` and `padding` fields; attaching extension elements to a
/// packet therefore always raises the extension bit.
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    /// Marks significant packets; the fragmenter raises it on the last
    /// fragment of a message.
    pub marker: bool,
    /// Payload type identifier. This protocol uses a single dynamic
    /// payload type for everything it sends.
    pub payload_kind: u8,
    /// Increments by one per packet sent, wrapping at 65536.
    pub sequence_number: u16,
    /// Sample clock of the sender at the time the packet was built.
    pub timestamp: u32,
    /// Synchronization source identifier, chosen randomly once per sender.
    pub ssrc: u32,
    /// Contributing sources. Always empty in this protocol, kept for wire
    /// fidelity.
    pub csrc: Vec<u32>,
    /// Header-extension elements, present iff the extension bit is set.
    pub extensions: Option<Extensions<'a>>,
    /// Primary payload bytes, if any remain after the extension region.
    pub payload: Option<&'a [u8]>,
    /// Padding octets excluding the trailing count byte.
    pub padding: Option<&'a [u8]>,
}

impl<'a> Packet<'a> {
    /// Encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        12 + self.csrc.len() * 4
            + self.extensions.as_ref().map(|e| e.wire_len()).unwrap_or(0)
            + self.payload.map(|p| p.len()).unwrap_or(0)
            + self.padding.map(|p| p.len() + 1).unwrap_or(0)
    }

    /// Serialize the packet into `buf`.
    #[rustfmt::skip]
    pub fn encode(self, buf: &mut BytesMut) {
        let is_pd = self.padding.is_some();
        let is_es = self.extensions.is_some();
        let cc = self.csrc.len() as u8;

        let mut basic = [0u8; 2];
        basic[0] = 2 << 6;
        basic[0] = if is_pd { basic[0] | 1 << 5 } else { basic[0] & !(1 << 5) };
        basic[0] = if is_es { basic[0] | 1 << 4 } else { basic[0] & !(1 << 4) };
        basic[0] = (basic[0] & LE_CSRC_COUNT_MASK) | cc;
        basic[1] = if self.marker { basic[1] | 1 << 7 } else { basic[1] & !(1 << 7) };
        basic[1] = (basic[1] & LE_PAYLOAD_KIND_MASK) | (self.payload_kind & PAYLOAD_KIND_MASK);

        buf.put(&basic[..]);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for item in self.csrc {
            buf.put_u32(item);
        }

        if let Some(extensions) = self.extensions {
            extensions.encode(buf);
        }

        if let Some(payload) = self.payload {
            buf.put(payload);
        }

        if let Some(padding) = self.padding {
            buf.put(padding);
            buf.put_u8((padding.len() + 1) as u8);
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for Packet<'a> {
    type Error = Error;

    fn try_from(mut buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 12 {
            return Err(Error::PacketTooShort);
        }

        // lock rtp version in rfc 3550
        if (buf[0] & VERSION_MASK) >> 6 != 2 {
            return Err(Error::UnsupportedVersion);
        }

        let is_padding = (buf[0] & PADDING_MASK) >> 5 == 1;
        let is_extension = (buf[0] & EXTENSION_MASK) >> 4 == 1;
        let csrc_count = (buf[0] & CSRC_COUNT_MASK) as usize;
        let marker = (buf[1] & MARKER_MASK) >> 7 == 1;
        let payload_kind = buf[1] & PAYLOAD_KIND_MASK;
        buf.advance(2);

        if buf.len() < 10 + csrc_count * 4 {
            return Err(Error::PacketTooShort);
        }

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let csrc = (0..csrc_count).map(|_| buf.get_u32()).collect::<Vec<u32>>();

        let extensions = if is_extension {
            let extensions = Extensions::try_from(buf)?;
            buf.advance(extensions.wire_len());
            Some(extensions)
        } else {
            None
        };

        let pd_size = if is_padding {
            match buf.last() {
                Some(&size) if size > 0 && size as usize <= buf.len() => size as usize,
                _ => return Err(Error::InvalidPadding),
            }
        } else {
            0
        };

        let pl_size = buf.len() - pd_size;
        let payload = if pl_size > 0 {
            let payload = &buf[..pl_size];
            buf.advance(pl_size);
            Some(payload)
        } else {
            None
        };

        let padding = if pd_size > 0 {
            Some(&buf[..pd_size - 1])
        } else {
            None
        };

        Ok(Self {
            marker,
            payload_kind,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extensions,
            payload,
            padding,
        })
    }
}
