use crate::{Error, fragment::FragmentInfo};

use ahash::HashMap;
use parking_lot::Mutex;

/// Accumulated state of one in-flight fragmented message.
///
/// `total` doubles as the session's liveness flag: zero means no fragment
/// has been accepted yet, and the first descriptor to arrive records the
/// expected count.
#[derive(Debug, Default)]
struct Session {
    fragments: HashMap<u16, Vec<u8>>,
    total: u16,
}

/// Rebuilds one message at a time from its fragments.
///
/// Fragments may arrive in any order; each is stored by index until every
/// distinct index up to the expected total is present, at which point the
/// chunks are concatenated in ascending index order and the session resets
/// for the next message.
///
/// Exactly one message may be in flight per buffer. Interleaved fragments
/// of a second message surface as [`Error::InconsistentTotalFragments`]
/// the moment their total disagrees with the recorded one; supporting
/// several peers means one buffer per remote source. A descriptor conflict
/// rejects only the offending packet and keeps the session as it was, so a
/// resend of the message can still complete it. A session that never
/// completes keeps its fragments until the process exits.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    session: Mutex<Session>,
}

impl ReassemblyBuffer {
    /// Feed one fragment in, by its descriptor bytes and data chunk.
    ///
    /// Returns the whole message once the final distinct index arrives,
    /// `None` while more fragments are still missing. The chunk is copied
    /// into the session immediately; callers are free to reuse the receive
    /// buffer it points into. A duplicate index simply replaces the stored
    /// chunk without advancing completion.
    pub fn process(&self, info: &[u8], chunk: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let info = FragmentInfo::try_from(info)?;

        if chunk.is_empty() {
            return Err(Error::EmptyFragmentData);
        }

        let mut session = self.session.lock();

        if session.total == 0 {
            session.total = info.total;
        } else if session.total != info.total {
            return Err(Error::InconsistentTotalFragments);
        }

        session.fragments.insert(info.index, chunk.to_vec());

        if session.fragments.len() != session.total as usize {
            return Ok(None);
        }

        let size = session.fragments.values().map(Vec::len).sum();
        let mut message = Vec::with_capacity(size);

        for index in 0..session.total {
            match session.fragments.get(&index) {
                Some(data) => message.extend_from_slice(data),
                None => return Err(Error::MissingFragment),
            }
        }

        session.fragments.clear();
        session.total = 0;

        Ok(Some(message))
    }
}
