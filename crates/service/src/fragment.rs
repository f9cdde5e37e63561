use crate::{Error, source::Source};

use bytes::BytesMut;
use codec::extensions::{Extension, Extensions};

/// Extension identifier of the fragment descriptor. On unfragmented
/// messages the same identifier carries the whole message bytes instead;
/// receivers tell the two apart by the presence of a data-chunk element.
pub const DESCRIPTOR_ID: u8 = 1;

/// Extension identifier of the fragment data chunk.
pub const CHUNK_ID: u8 = 2;

/// Upper bound on the data bytes of one fragment, sized so a full fragment
/// packet stays well inside a common 1500-byte UDP MTU.
pub const MAX_CHUNK_SIZE: usize = 251;

/// A fragment index is a u16, which caps a message at this many chunks.
pub const MAX_FRAGMENTS: usize = u16::MAX as usize;

/// Position of one fragment within its message: the 4-byte descriptor
/// element, `{index: u16, total: u16}`, both big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub index: u16,
    pub total: u16,
}

impl FragmentInfo {
    pub fn encode(&self) -> [u8; 4] {
        let mut buf = [0u8; 4];
        buf[..2].copy_from_slice(&self.index.to_be_bytes());
        buf[2..].copy_from_slice(&self.total.to_be_bytes());
        buf
    }
}

impl TryFrom<&[u8]> for FragmentInfo {
    type Error = Error;

    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() != 4 {
            return Err(Error::InvalidFragmentInfo);
        }

        Ok(Self {
            index: u16::from_be_bytes([buf[0], buf[1]]),
            total: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

/// Split a message into ready-to-send datagrams.
///
/// A message that fits one chunk becomes a single packet carrying the raw
/// bytes under [`DESCRIPTOR_ID`] and no descriptor. Anything larger is cut
/// into [`MAX_CHUNK_SIZE`]-byte chunks, one packet per chunk, each carrying
/// its descriptor and data as two extension elements, with the marker bit
/// raised on the last fragment. Fragments are numbered in ascending order;
/// receivers reassemble by index and tolerate reordered arrival.
///
/// The source counters advance once per packet built, so the sequence
/// numbers of a fragmented message are consecutive.
pub fn fragment(source: &mut Source, message: &[u8]) -> Result<Vec<BytesMut>, Error> {
    if message.is_empty() {
        return Err(Error::EmptyMessage);
    }

    if message.len() <= MAX_CHUNK_SIZE {
        let extensions = Extensions(vec![Extension {
            id: DESCRIPTOR_ID,
            data: message,
        }]);

        let packet = source.packet(false, extensions);
        let mut buf = BytesMut::with_capacity(packet.wire_len());
        packet.encode(&mut buf);
        source.advance();

        return Ok(vec![buf]);
    }

    let total = message.len().div_ceil(MAX_CHUNK_SIZE);
    if total > MAX_FRAGMENTS {
        return Err(Error::MessageTooLarge);
    }

    let mut packets = Vec::with_capacity(total);

    for (index, chunk) in message.chunks(MAX_CHUNK_SIZE).enumerate() {
        let info = FragmentInfo {
            index: index as u16,
            total: total as u16,
        }
        .encode();

        let extensions = Extensions(vec![
            Extension {
                id: DESCRIPTOR_ID,
                data: &info,
            },
            Extension {
                id: CHUNK_ID,
                data: chunk,
            },
        ]);

        let packet = source.packet(index == total - 1, extensions);
        let mut buf = BytesMut::with_capacity(packet.wire_len());
        packet.encode(&mut buf);
        source.advance();

        packets.push(buf);
    }

    Ok(packets)
}
