//! The orchestrating worker: receive -> classify -> order -> handoff queue.
//!
//! Lifecycle of a transport instance:
//!
//! ```ascii
//! Unstarted --start()--> Detecting --first datagram--> Streaming(Rtp | Raw)
//!                            |                              |
//!                            +------- stop() / socket error-+--> Stopped
//! ```
//!
//! `start()` performs the group join and waits for the first datagram to decide
//!  whether the stream is RTP or raw; classification then stays fixed for the
//!  lifetime of the instance, so a group that switches framing mid-session needs
//!  a new transport. Streaming runs on a dedicated worker task that owns the
//!  socket and the reorder buffer exclusively; the bounded handoff queue is the
//!  only thing crossing the task boundary.

use std::cmp::Ordering;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::packet::{Classification, PacketFrame};
use crate::reader::{frame_channel, FrameQueue, StreamReader};
use crate::receiver::MulticastReceiver;
use crate::reorder::ReorderBuffer;
use crate::sequence::compare_seq;

/// How the stream is framed, decided once from the first datagram of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Rtp,
    Raw,
}

/// Lifecycle flags shared between the worker, the transport handle and the
///  reader. This is deliberately the only mutable state besides the handoff
///  queue that crosses the task boundary.
pub(crate) struct SharedState {
    stopped: AtomicBool,
    broken: Mutex<Option<String>>,
}

impl SharedState {
    pub(crate) fn new() -> SharedState {
        SharedState {
            stopped: AtomicBool::new(false),
            broken: Mutex::new(None),
        }
    }

    /// Returns whether stop had already been requested before this call.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.stopped.swap(true, SeqCst)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(SeqCst)
    }

    /// Records a receive failure unless the transport is being stopped anyway -
    ///  a stop-induced socket error is a normal shutdown, not a broken stream.
    pub(crate) fn mark_broken(&self, reason: String) {
        if self.is_stopped() {
            debug!("receive failed during shutdown - ignoring");
            return;
        }
        self.broken.lock().unwrap().get_or_insert(reason);
    }

    pub(crate) fn broken_reason(&self) -> Option<String> {
        self.broken.lock().unwrap().clone()
    }
}

/// Handle to a running stream transport. Dropping the handle aborts the worker;
///  calling [`StreamTransport::stop`] does the same but makes the shutdown
///  observable to the reader as [`TransportError::Closed`].
pub struct StreamTransport {
    worker: JoinHandle<()>,
    shared: Arc<SharedState>,
    framing: Framing,
    local_addr: Option<SocketAddr>,
}

impl StreamTransport {
    /// Joins the multicast group, waits for the first datagram to classify the
    ///  stream, and spawns the receive worker.
    ///
    /// The returned reader is the consumer end of the handoff queue. `start()`
    ///  stays pending until the first classifiable datagram arrives; callers that
    ///  need a bound on that should wrap the future in a timeout or drop it.
    pub async fn start(
        config: TransportConfig,
    ) -> Result<(StreamTransport, StreamReader), TransportError> {
        config.validate().map_err(|e| TransportError::Config(e.to_string()))?;

        let receiver = MulticastReceiver::join(&config)?;
        let local_addr = receiver.local_addr().ok();

        // Detecting: unclassifiable datagrams are dropped until one decides the
        // framing for the rest of the session
        let (framing, first) = loop {
            let mut frame = receiver.recv_frame().await?;
            match frame.classify(&config.payload_types) {
                Classification::Raw => break (Framing::Raw, frame),
                Classification::Rtp => match frame.strip_rtp_header() {
                    Ok(()) => break (Framing::Rtp, frame),
                    Err(e) => debug!("dropping malformed first RTP packet: {}", e),
                },
                Classification::Invalid(reason) => {
                    debug!("dropping unclassifiable datagram: {}", reason);
                }
            }
        };
        info!("stream classified as {:?}", framing);

        let (queue, frames) = frame_channel(config.queue_capacity);
        let shared = Arc::new(SharedState::new());
        let reader = StreamReader::new(frames, config.poll_timeout, shared.clone());

        // meaningful only for RTP, where the first frame seeds the counter
        let expected = first.next_sequence();
        queue.offer(first);

        let worker = match framing {
            Framing::Rtp => tokio::spawn(run_rtp_loop(
                receiver,
                queue,
                ReorderBuffer::new(config.reorder_capacity),
                expected,
                config.payload_types.clone(),
                shared.clone(),
            )),
            Framing::Raw => tokio::spawn(run_raw_loop(receiver, queue, shared.clone())),
        };

        Ok((
            StreamTransport {
                worker,
                shared,
                framing,
                local_addr,
            },
            reader,
        ))
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Stops the transport: cancels the worker (unblocking any in-flight
    ///  receive), leaves the multicast group and discards all queued and buffered
    ///  frames. Idempotent; safe to call at any time.
    pub fn stop(&self) {
        if self.shared.mark_stopped() {
            return;
        }
        debug!("stopping stream transport");
        // the receiver is dropped with the worker, leaving the group
        self.worker.abort();
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_rtp_loop(
    receiver: MulticastReceiver,
    queue: FrameQueue,
    mut reorder: ReorderBuffer,
    mut expected: u16,
    payload_types: Vec<u8>,
    shared: Arc<SharedState>,
) {
    debug!("starting RTP ordering loop, expecting sequence {}", expected);
    loop {
        let mut frame = match receiver.recv_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                error!("socket receive failed: {}", e);
                shared.mark_broken(format!("socket receive failed: {}", e));
                return;
            }
        };

        match frame.classify(&payload_types) {
            Classification::Rtp => {}
            Classification::Raw => {
                debug!("raw datagram inside an RTP stream - dropping");
                continue;
            }
            Classification::Invalid(reason) => {
                debug!("dropping invalid packet: {}", reason);
                continue;
            }
        }
        if let Err(e) = frame.strip_rtp_header() {
            debug!("dropping packet: {}", e);
            continue;
        }

        expected = on_rtp_frame(frame, expected, &mut reorder, &queue);
    }
}

async fn run_raw_loop(receiver: MulticastReceiver, queue: FrameQueue, shared: Arc<SharedState>) {
    debug!("starting raw pass-through loop");
    loop {
        match receiver.recv_frame().await {
            Ok(frame) => {
                queue.offer(frame);
            }
            Err(e) => {
                error!("socket receive failed: {}", e);
                shared.mark_broken(format!("socket receive failed: {}", e));
                return;
            }
        }
    }
}

/// One step of the ordering algorithm: the frame is delivered, dropped as stale,
///  or buffered, and the new expected sequence is returned.
fn on_rtp_frame(
    frame: PacketFrame,
    expected: u16,
    reorder: &mut ReorderBuffer,
    queue: &FrameQueue,
) -> u16 {
    match compare_seq(frame.sequence(), expected) {
        Ordering::Equal => deliver_and_drain(frame, reorder, queue),
        Ordering::Less => {
            trace!("dropping stale packet {} (expecting {})", frame.sequence(), expected);
            expected
        }
        Ordering::Greater => {
            trace!("buffering out-of-order packet {} (expecting {})", frame.sequence(), expected);
            match reorder.insert(frame) {
                Some(evicted) => {
                    warn!(
                        "reorder buffer full - treating packets before {} as lost",
                        evicted.sequence()
                    );
                    deliver_and_drain(evicted, reorder, queue)
                }
                None => expected,
            }
        }
    }
}

/// Delivers a frame and flushes the run of consecutively buffered frames behind
///  it. Returns the sequence expected next.
fn deliver_and_drain(
    frame: PacketFrame,
    reorder: &mut ReorderBuffer,
    queue: &FrameQueue,
) -> u16 {
    let mut expected = frame.next_sequence();
    if !queue.offer(frame) {
        // the consumer stopped draining; clear the backlog so it resumes near
        // the live position once it catches up
        reorder.clear();
        return expected;
    }

    while let Some(buffered) = reorder.pop_if_next(expected) {
        expected = buffered.next_sequence();
        if !queue.offer(buffered) {
            reorder.clear();
            break;
        }
    }
    expected
}
