use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::packet::PacketFrame;
use crate::transport::SharedState;

/// Creates the bounded handoff queue between the receive worker and the reader.
pub(crate) fn frame_channel(capacity: usize) -> (FrameQueue, mpsc::Receiver<PacketFrame>) {
    let (tx, rx) = mpsc::channel(capacity);
    (FrameQueue { tx }, rx)
}

/// Producer side of the handoff queue. This is the only structure shared between
///  the worker and the consumer; everything else is exclusively owned.
pub struct FrameQueue {
    tx: mpsc::Sender<PacketFrame>,
}

impl FrameQueue {
    /// Non-blocking enqueue. Returns false if the queue is at capacity - the
    ///  frame is dropped, never the receive loop's time.
    pub(crate) fn offer(&self, frame: PacketFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!("handoff queue full - dropping frame with sequence {}", frame.sequence());
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("handoff queue closed - dropping frame");
                false
            }
        }
    }
}

/// Adapts the queue of frames into the pull-based "give me N bytes now" contract
///  a playback pipeline expects.
///
/// `Ok(0)` means "no data yet, try again" - it is returned after a short bounded
///  wait, never an indefinite block. A broken or stopped transport surfaces as an
///  error instead, so a dead stream is distinguishable from a slow one.
pub struct StreamReader {
    frames: mpsc::Receiver<PacketFrame>,
    /// a partially consumed frame carried over from the previous read
    current: Option<PacketFrame>,
    poll_timeout: Duration,
    shared: Arc<SharedState>,
}

impl StreamReader {
    pub(crate) fn new(
        frames: mpsc::Receiver<PacketFrame>,
        poll_timeout: Duration,
        shared: Arc<SharedState>,
    ) -> StreamReader {
        StreamReader {
            frames,
            current: None,
            poll_timeout,
            shared,
        }
    }

    /// Fills `dst` with the next bytes of the reconstructed stream.
    ///
    /// Drains a retained partial frame first; waits (bounded by the poll timeout)
    ///  only when it would otherwise return empty-handed. Once at least one byte
    ///  is available, more queued frames are drained without waiting until `dst`
    ///  is full or the queue is momentarily empty.
    pub async fn read(&mut self, dst: &mut [u8]) -> Result<usize, TransportError> {
        if let Some(reason) = self.shared.broken_reason() {
            return Err(TransportError::StreamBroken(reason));
        }
        if self.shared.is_stopped() {
            return Err(TransportError::Closed);
        }
        if dst.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        if let Some(mut frame) = self.current.take() {
            written += frame.read_into(dst);
            if frame.remaining() > 0 {
                // dst is full, the rest of the frame waits for the next call
                self.current = Some(frame);
                return Ok(written);
            }
        }

        loop {
            if written == dst.len() {
                return Ok(written);
            }

            let mut frame = if written == 0 {
                match timeout(self.poll_timeout, self.frames.recv()).await {
                    Err(_) => {
                        trace!("no frame within poll timeout - signalling 'retry'");
                        return Ok(0);
                    }
                    Ok(None) => return Err(self.terminal_error()),
                    Ok(Some(frame)) => frame,
                }
            }
            else {
                match self.frames.try_recv() {
                    Ok(frame) => frame,
                    // empty or closed: report what we have, errors surface on the
                    // next call
                    Err(_) => return Ok(written),
                }
            };

            written += frame.read_into(&mut dst[written..]);
            if frame.remaining() > 0 {
                self.current = Some(frame);
            }
        }
    }

    fn terminal_error(&self) -> TransportError {
        if let Some(reason) = self.shared.broken_reason() {
            TransportError::StreamBroken(reason)
        }
        else if self.shared.is_stopped() {
            TransportError::Closed
        }
        else {
            TransportError::StreamBroken("receive worker terminated".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::RtpDatagram;

    fn reader_with_queue(capacity: usize) -> (FrameQueue, StreamReader, Arc<SharedState>) {
        let (queue, rx) = frame_channel(capacity);
        let shared = Arc::new(SharedState::new());
        let reader = StreamReader::new(rx, Duration::from_millis(50), shared.clone());
        (queue, reader, shared)
    }

    fn raw_frame(payload: &[u8]) -> PacketFrame {
        PacketFrame::from_slice(payload)
    }

    fn rtp_frame(seq: u16, payload: &[u8]) -> PacketFrame {
        let mut frame =
            PacketFrame::from_slice(&RtpDatagram::new(seq).payload(payload).build());
        frame.strip_rtp_header().unwrap();
        frame
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_returns_zero_within_timeout() {
        let (_queue, mut reader, _shared) = reader_with_queue(4);

        let mut dst = [0u8; 16];
        assert_eq!(reader.read(&mut dst).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_frame_retained_across_reads() {
        let (queue, mut reader, _shared) = reader_with_queue(4);
        assert!(queue.offer(raw_frame(b"hello world!")));

        let mut dst = [0u8; 5];
        assert_eq!(reader.read(&mut dst).await.unwrap(), 5);
        assert_eq!(&dst, b"hello");

        assert_eq!(reader.read(&mut dst).await.unwrap(), 5);
        assert_eq!(&dst, b" worl");

        assert_eq!(reader.read(&mut dst).await.unwrap(), 2);
        assert_eq!(&dst[..2], b"d!");
    }

    #[tokio::test]
    async fn test_read_spans_multiple_frames() {
        let (queue, mut reader, _shared) = reader_with_queue(4);
        assert!(queue.offer(rtp_frame(1, b"abc")));
        assert!(queue.offer(rtp_frame(2, b"def")));
        assert!(queue.offer(rtp_frame(3, b"gh")));

        let mut dst = [0u8; 64];
        let count = reader.read(&mut dst).await.unwrap();
        assert_eq!(&dst[..count], b"abcdefgh");
    }

    #[tokio::test]
    async fn test_offer_rejects_when_full() {
        let (queue, mut reader, _shared) = reader_with_queue(1);
        assert!(queue.offer(raw_frame(b"kept")));
        assert!(!queue.offer(raw_frame(b"dropped")));

        let mut dst = [0u8; 16];
        let count = reader.read(&mut dst).await.unwrap();
        assert_eq!(&dst[..count], b"kept");
    }

    #[tokio::test]
    async fn test_read_after_stop_is_an_error() {
        let (queue, mut reader, shared) = reader_with_queue(4);
        assert!(queue.offer(raw_frame(b"stale")));

        shared.mark_stopped();

        // queued frames are discarded, not flushed
        let mut dst = [0u8; 16];
        assert!(matches!(
            reader.read(&mut dst).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_read_after_receive_failure_is_an_error() {
        let (queue, mut reader, shared) = reader_with_queue(4);
        shared.mark_broken("socket receive failed: connection refused".to_string());
        drop(queue);

        let mut dst = [0u8; 16];
        assert!(matches!(
            reader.read(&mut dst).await,
            Err(TransportError::StreamBroken(reason)) if reason.contains("connection refused")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_disappearing_surfaces_as_broken() {
        let (queue, mut reader, _shared) = reader_with_queue(4);
        drop(queue);

        let mut dst = [0u8; 16];
        assert!(matches!(
            reader.read(&mut dst).await,
            Err(TransportError::StreamBroken(_))
        ));
    }
}
