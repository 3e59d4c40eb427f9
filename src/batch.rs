//! Payload assembly for bulk ingestion
//!
//! Encoded lines are concatenated newline-terminated into payloads no
//! larger than the configured maximum; an event that would overflow the
//! current payload starts a continuation payload instead, preserving
//! order. A line that cannot fit any payload on its own is rejected
//! individually so its siblings still ship.

use tracing::warn;

/// One HTTP delivery unit: the newline-delimited body plus the original
/// positions of the events it contains.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub body: String,
    pub event_indexes: Vec<usize>,
}

/// The outcome of chunking a set of encoded lines.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub payloads: Vec<EncodedPayload>,
    /// Original positions of events dropped for size, with the diagnostic
    pub rejected: Vec<(usize, String)>,
}

#[derive(Debug, Clone)]
pub struct BatchEncoder {
    max_payload_bytes: usize,
    max_event_bytes: usize,
}

impl BatchEncoder {
    pub fn new(max_payload_bytes: usize, max_event_bytes: usize) -> Self {
        Self {
            max_payload_bytes,
            max_event_bytes,
        }
    }

    /// Splits `lines` (original index, encoded line) into payloads.
    pub fn build(&self, lines: Vec<(usize, String)>) -> BatchPlan {
        let mut plan = BatchPlan::default();
        let mut body = String::new();
        let mut event_indexes = Vec::new();

        for (index, line) in lines {
            let needed = line.len() + 1;

            if needed > self.max_event_bytes || needed > self.max_payload_bytes {
                let reason = format!(
                    "encoded event is {} bytes, exceeding the {} byte limit",
                    needed,
                    self.max_event_bytes.min(self.max_payload_bytes)
                );
                warn!("Dropping oversized event at position {}: {}", index, reason);
                plan.rejected.push((index, reason));
                continue;
            }

            if body.len() + needed > self.max_payload_bytes && !body.is_empty() {
                plan.payloads.push(EncodedPayload {
                    body: std::mem::take(&mut body),
                    event_indexes: std::mem::take(&mut event_indexes),
                });
            }

            body.push_str(&line);
            body.push('\n');
            event_indexes.push(index);
        }

        if !body.is_empty() {
            plan.payloads.push(EncodedPayload {
                body,
                event_indexes,
            });
        }

        plan
    }
}
