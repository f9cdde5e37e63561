use crate::Error;

use bytes::{Buf, BufMut, BytesMut};

/// Profile tag marking the extension region of a packet. Fixed for every
/// packet this protocol emits.
pub const EXTENSION_PROFILE: u16 = 0xBEDE;

/// One header-extension element.
///
/// A byte identifier followed by a byte length and the value bytes. The
/// length counts the value bytes, so an element carries between 1 and 255
/// of them; zero-length elements do not exist on the wire.
#[derive(Debug, Clone)]
pub struct Extension<'a> {
    pub id: u8,
    pub data: &'a [u8],
}

impl<'a> Extension<'a> {
    /// Encoded size of this element, header byte pair included.
    pub fn wire_len(&self) -> usize {
        2 + self.data.len()
    }

    pub fn encode(self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        buf.put_u8(self.data.len() as u8);
        buf.put(self.data);
    }
}

impl<'a> TryFrom<&'a [u8]> for Extension<'a> {
    type Error = Error;

    fn try_from(mut buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 2 {
            return Err(Error::TruncatedExtensions);
        }

        let id = buf.get_u8();
        let size = buf.get_u8() as usize;
        if size == 0 {
            return Err(Error::InvalidExtensionElement);
        }

        if buf.len() < size {
            return Err(Error::TruncatedExtensions);
        }

        Ok(Self {
            id,
            data: &buf[..size],
        })
    }
}

/// The extension region of a packet: the 0xBEDE profile tag, an element
/// count, and that many elements back to back.
///
/// Elements are looked up by identifier. A packet may carry several
/// elements, and which one a caller wants depends on what it is after;
/// positional access is deliberately not offered.
#[derive(Debug, Clone)]
pub struct Extensions<'a>(pub Vec<Extension<'a>>);

impl<'a> Extensions<'a> {
    /// The value of the first element with the given identifier.
    pub fn get(&self, id: u8) -> Option<&'a [u8]> {
        self.0.iter().find(|item| item.id == id).map(|item| item.data)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encoded size of the whole region, profile tag and count included.
    pub fn wire_len(&self) -> usize {
        4 + self.0.iter().map(|item| item.wire_len()).sum::<usize>()
    }

    pub fn encode(self, buf: &mut BytesMut) {
        buf.put_u16(EXTENSION_PROFILE);
        buf.put_u16(self.0.len() as u16);

        for extension in self.0 {
            extension.encode(buf);
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for Extensions<'a> {
    type Error = Error;

    fn try_from(mut buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 4 {
            return Err(Error::TruncatedExtensions);
        }

        if buf.get_u16() != EXTENSION_PROFILE {
            return Err(Error::InvalidExtensionProfile);
        }

        let count = buf.get_u16() as usize;

        // Every element needs at least its two header bytes, which bounds
        // a count claimed by a hostile packet.
        let mut extensions = Vec::with_capacity(count.min(buf.len() / 2));

        for _ in 0..count {
            let extension = Extension::try_from(buf)?;
            buf.advance(extension.wire_len());
            extensions.push(extension);
        }

        Ok(Self(extensions))
    }
}
