//! Request tagging for out-of-order responses.
//!
//! A [`SeqSource`] hands out monotonically increasing tags for the lifetime of
//! the composer; a [`LatestRequest`] remembers the newest tag issued for one
//! domain. Only the response carrying that tag is installed.

#[derive(Debug, Default)]
pub struct SeqSource {
    last: u64,
}

impl SeqSource {
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatestRequest {
    latest: Option<u64>,
}

impl LatestRequest {
    pub fn issue(&mut self, seq: u64) {
        self.latest = Some(seq);
    }

    /// True if `seq` is the newest outstanding request; it is then settled.
    pub fn settle(&mut self, seq: u64) -> bool {
        if self.latest == Some(seq) {
            self.latest = None;
            true
        } else {
            false
        }
    }

    pub fn in_flight(&self) -> bool {
        self.latest.is_some()
    }
}
