//! Receiver side of a live multicast UDP media stream that may or may not be
//!  RTP-encapsulated. The crate reconstructs a correctly ordered, contiguous byte
//!  stream from unreliable, out-of-order, lossy datagrams and exposes it through a
//!  pull-based reader for a playback pipeline to consume.
//!
//! ## Design goals
//!
//! * Never block the network receive path: the worker delivers frames to a bounded
//!   queue with `try_send` semantics and drops on overflow rather than waiting
//! * Never stall the consumer indefinitely: gaps in the sequence space are skipped
//!   once the bounded reorder buffer forces a decision, so transient loss shows up
//!   as a glitch in the byte stream rather than a hang
//! * Bounded memory: one MTU-sized buffer per in-flight datagram, a fixed-capacity
//!   reorder buffer, a fixed-capacity handoff queue
//! * Classification happens exactly once per session, from the first datagram: a
//!   stream is either RTP or raw MPEG-TS for the transport's whole lifetime
//!
//! ## Wire format
//!
//! A datagram starting with the MPEG-TS sync byte `0x47` is treated as a raw
//!  elementary stream and passed through unmodified. Anything else must be an RTP
//!  packet (all numbers in network byte order):
//!
//! ```ascii
//! 0:  V V P X C C C C   version (2 bits, must be 2), padding bit, extension bit,
//!                        CSRC count (4 bits)
//! 1:  M T T T T T T T   marker bit, payload type (7 bits) - only a configurable
//!                        allow-list of MPEG profiles is accepted
//! 2:  sequence number (u16)
//! 4:  timestamp (u32)
//! 8:  SSRC (u32)
//! 12: CSRC identifiers (4 bytes each, CSRC-count times)
//! *:  optional extension block if the extension bit is set:
//!      2 bytes id + 2 bytes length in 32-bit words + that many words
//! *:  payload
//! *:  if the padding bit is set, the last byte of the datagram is the number of
//!      trailing padding bytes (including itself) to discard
//! ```
//!
//! Sequence numbers live in a circular 16-bit space: comparisons split that space
//!  into half-windows of 32768, the standard RTP/TCP-style comparator. The reorder
//!  buffer keeps out-of-order arrivals sorted under that comparison and releases
//!  them as the expected counter catches up; a persistent gap is eventually treated
//!  as permanent loss when buffer pressure forces the lowest buffered entry out.
//!
//! ## Structure
//!
//! * [`config::TransportConfig`] - multicast group, port, interface selection and
//!   the various capacity / timeout knobs
//! * [`packet::PacketFrame`] - one received datagram with cursor/limit bookkeeping,
//!   classification and RTP header stripping
//! * [`sequence`] - wraparound-aware sequence number comparison
//! * [`reorder::ReorderBuffer`] - bounded sorted holding area for early arrivals
//! * [`receiver::MulticastReceiver`] - socket setup, group join/leave lifecycle
//! * [`transport::StreamTransport`] - the worker that ties it all together
//! * [`reader::StreamReader`] - the pull-based byte-stream interface

pub mod config;
pub mod error;
pub mod packet;
pub mod reader;
pub mod receiver;
pub mod reorder;
pub mod sequence;
pub mod transport;

#[cfg(test)]
mod test_util;
