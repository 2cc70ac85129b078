use bytes::{Buf, BytesMut};

/// Reassembles a byte stream into newline-terminated lines.
///
/// Raw bytes are buffered rather than decoded text, so a UTF-8 sequence split
/// across two reads is decoded only once the whole line has arrived.
///
/// There is no line length limit: a peer that never sends a newline keeps
/// growing `pending` until it disconnects.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them, in order.
    /// The trailing `\n` (and a `\r` before it) is not part of the line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut raw = self.pending.split_to(pos);
            self.pending.advance(1);

            if raw.last() == Some(&b'\r') {
                raw.truncate(raw.len() - 1);
            }

            lines.push(String::from_utf8_lossy(&raw).into_owned());
        }

        lines
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
