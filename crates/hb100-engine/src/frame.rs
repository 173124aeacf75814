//! Response de-framing and reassembly.
//!
//! The device splits every logical response into 64-byte bulk fragments.
//! The first fragment of a framed stream starts with a 6-byte prefix
//! (`3F AA 55 xx 00 yy`, command-dependent); every later fragment starts
//! with a single framing byte. Observed framing bytes are `3F`, `28`, `0D`
//! and `0C`. This module is the only place that knows those rules.

use tracing::warn;

/// Framing bytes observed at the start of continuation fragments.
pub const CONTINUATION_BYTES: [u8; 4] = [0x3f, 0x28, 0x0d, 0x0c];

/// Scratch size reserved for one reassembled response. A full bank is
/// 200 × 184 bytes, so 40 KiB covers every known response with room left.
pub const RESPONSE_BUFFER_SIZE: usize = 40960;

/// Strip the framing from one fragment of a prefixed stream.
///
/// The first fragment must carry the expected 6-byte prefix in full;
/// anything else is an unexpected frame and yields `None` (the caller skips
/// it). Continuation fragments lose their single framing byte; a fragment
/// that does not start with a known framing byte is passed through whole.
pub fn deframe<'a>(fragment: &'a [u8], is_first: bool, prefix: &[u8; 6]) -> Option<&'a [u8]> {
    if is_first {
        if fragment.len() >= prefix.len() && fragment[..prefix.len()] == prefix[..] {
            Some(&fragment[prefix.len()..])
        } else {
            None
        }
    } else {
        Some(strip_continuation(fragment))
    }
}

/// Strip a single leading framing byte, if present.
///
/// Used directly for streams that carry no 6-byte prefix (the extras
/// catalogue), and for continuation fragments of prefixed streams.
pub fn strip_continuation(fragment: &[u8]) -> &[u8] {
    match fragment.first() {
        Some(b) if CONTINUATION_BYTES.contains(b) => &fragment[1..],
        _ => fragment,
    }
}

/// Reassembly buffer for one multi-fragment response.
///
/// Reset at the start of every command; fragments are appended after
/// de-framing until the transfer that drives them times out.
#[derive(Debug)]
pub struct Reassembly {
    buf: Vec<u8>,
}

impl Default for Reassembly {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembly {
    /// Allocate an empty buffer with the full response capacity reserved.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RESPONSE_BUFFER_SIZE),
        }
    }

    /// Reset to zero length, keeping the allocation.
    pub fn begin(&mut self) {
        self.buf.clear();
    }

    /// True while no fragment has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// The reassembled payload.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Append a de-framed payload, refusing to grow past the scratch size.
    pub fn append(&mut self, payload: &[u8]) {
        if self.buf.len() + payload.len() > RESPONSE_BUFFER_SIZE {
            warn!(
                have = self.buf.len(),
                more = payload.len(),
                "response exceeds reassembly buffer, dropping fragment"
            );
            return;
        }
        self.buf.extend_from_slice(payload);
    }

    /// De-frame a fragment of a prefixed stream and append it. Returns
    /// whether the fragment was accepted.
    pub fn append_framed(&mut self, fragment: &[u8], prefix: &[u8; 6]) -> bool {
        match deframe(fragment, self.is_empty(), prefix) {
            Some(payload) => {
                self.append(payload);
                true
            }
            None => {
                warn!("skipping unexpected data frame");
                false
            }
        }
    }

    /// Strip a continuation byte from a fragment of an unprefixed stream
    /// and append it.
    pub fn append_unprefixed(&mut self, fragment: &[u8]) {
        self.append(strip_continuation(fragment));
    }
}
