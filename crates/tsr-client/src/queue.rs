//! FIFO buffer for frames submitted before the transport is ready.

use std::collections::VecDeque;

use tracing::{debug, warn};
use tsr_core::Result;

use crate::transport::TransportSink;

/// Outbound frame buffer.
///
/// Frames wait here until the connection becomes ready, then [`drain`]
/// forwards them once, in submission order. After the drain every frame
/// goes straight to the transport.
///
/// [`drain`]: OutboundQueue::drain
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
    drained: bool,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame to the tail.
    pub fn enqueue(&mut self, frame: String) {
        self.frames.push_back(frame);
    }

    /// Number of frames waiting.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the one-time drain already happened.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Forwards `frame` immediately when `ready`, otherwise buffers it.
    pub fn send<S: TransportSink>(
        &mut self,
        frame: String,
        ready: bool,
        sink: &mut S,
    ) -> Result<()> {
        if ready {
            sink.send(frame)
        } else {
            self.enqueue(frame);
            Ok(())
        }
    }

    /// Forwards every buffered frame to `sink` in FIFO order and empties
    /// the buffer. Runs once; later calls forward nothing.
    ///
    /// Stops at the first transport fault; frames after the failing one
    /// are discarded since the transport is gone.
    pub fn drain<S: TransportSink>(&mut self, sink: &mut S) -> Result<usize> {
        if self.drained {
            return Ok(0);
        }
        self.drained = true;

        let mut forwarded = 0;
        while let Some(frame) = self.frames.pop_front() {
            if let Err(e) = sink.send(frame) {
                self.discard();
                return Err(e);
            }
            forwarded += 1;
        }

        debug!(forwarded, "Outbound queue drained");
        Ok(forwarded)
    }

    /// Drops every buffered frame. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.frames.len();
        if dropped > 0 {
            warn!(dropped, "Discarding queued frames");
        }
        self.frames.clear();
        dropped
    }
}
