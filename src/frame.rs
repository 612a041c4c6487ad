//! SOF-framed, checksummed byte codec.
//!
//! On the wire: `SOF | len_hi | len_lo | payload[len] | checksum`, where
//! `checksum` is the ones-complement of the 8-bit sum of the payload bytes.
//! This module is pure: it has no knowledge of the serial port and operates
//! entirely over byte slices / single bytes, so it can be exercised without
//! any I/O.

use crate::consts::SOF;
use derive_more::Display;

/// Failures distinguishable at the framing layer. All of these fold into
/// [`crate::Error::Communication`] at the command boundary.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// No byte arrived before the inter-byte budget elapsed.
    #[display("timed out waiting for a frame byte")]
    Timeout,
    /// The declared payload length exceeds the receiver's buffer capacity.
    #[display("frame length {got} exceeds buffer capacity {cap}")]
    Overflow { cap: usize, got: usize },
    /// The trailing checksum byte did not match the computed checksum.
    #[display("frame checksum mismatch")]
    Checksum,
    /// The underlying port reported a hard I/O failure.
    #[display("serial port I/O failure")]
    Io,
}

/// Encode `payload` as a complete frame (SOF, length, payload, checksum).
///
/// Mirrors the write side of the state machine: returns the encoded bytes
/// as a `Vec<u8>`; a zero-length payload is never produced by the engine
/// but is accepted here as a 4-byte frame (SOF, 0, 0, checksum=0xFF) for
/// symmetry with [`decode`].
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 4);
    out.push(SOF);
    out.push((len >> 8) as u8);
    out.push((len & 0xFF) as u8);
    let mut sum: u8 = 0;
    for &b in payload {
        out.push(b);
        sum = sum.wrapping_add(b);
    }
    out.push(0xFFu8.wrapping_sub(sum));
    out
}

/// Incremental decode state machine driven one byte at a time by a reader
/// loop that owns the actual timing/I/O (see [`crate::engine`]).
#[derive(Debug)]
pub(crate) enum DecodeOutcome {
    /// Need more bytes; keep feeding.
    Pending,
    /// A complete, checksum-valid frame was decoded.
    Done,
}

#[derive(Debug)]
enum State {
    Sof,
    LenHi,
    LenLo,
    Payload,
    Checksum,
}

/// Drives the byte-by-byte decode state machine from §4.2 of the wire
/// protocol. Garbage before SOF is discarded; once SOF is seen, a malformed
/// length or checksum aborts the frame (no resynchronization).
pub(crate) struct FrameDecoder {
    state: State,
    len: usize,
    remaining: usize,
    sum: u8,
    cap: usize,
}

impl FrameDecoder {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            state: State::Sof,
            len: 0,
            remaining: 0,
            sum: 0,
            cap,
        }
    }

    /// Feed one byte, appending payload bytes to `out` as they arrive.
    pub(crate) fn feed(&mut self, b: u8, out: &mut Vec<u8>) -> Result<DecodeOutcome, FrameError> {
        match self.state {
            State::Sof => {
                if b == SOF {
                    self.state = State::LenHi;
                }
                Ok(DecodeOutcome::Pending)
            }
            State::LenHi => {
                self.len = (b as usize) << 8;
                self.state = State::LenLo;
                Ok(DecodeOutcome::Pending)
            }
            State::LenLo => {
                self.len += b as usize;
                if self.len > self.cap {
                    self.state = State::Sof;
                    return Err(FrameError::Overflow {
                        cap: self.cap,
                        got: self.len,
                    });
                }
                self.remaining = self.len;
                self.sum = 0;
                out.clear();
                if self.remaining == 0 {
                    self.sum = 0xFFu8.wrapping_sub(self.sum);
                    self.state = State::Checksum;
                } else {
                    self.state = State::Payload;
                }
                Ok(DecodeOutcome::Pending)
            }
            State::Payload => {
                out.push(b);
                self.sum = self.sum.wrapping_add(b);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.sum = 0xFFu8.wrapping_sub(self.sum);
                    self.state = State::Checksum;
                }
                Ok(DecodeOutcome::Pending)
            }
            State::Checksum => {
                self.state = State::Sof;
                if b == self.sum {
                    Ok(DecodeOutcome::Done)
                } else {
                    Err(FrameError::Checksum)
                }
            }
        }
    }
}

/// One-shot decode of a complete, well-formed byte stream (used by tests
/// and by callers that already have every byte of a frame in hand).
pub fn decode(cap: usize, bytes: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut decoder = FrameDecoder::new(cap);
    let mut out = Vec::new();
    for &b in bytes {
        match decoder.feed(b, &mut out)? {
            DecodeOutcome::Pending => continue,
            DecodeOutcome::Done => return Ok(out),
        }
    }
    Err(FrameError::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty() {
        let encoded = encode(&[]);
        assert_eq!(decode(256, &encoded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn round_trip_arbitrary() {
        for len in [0usize, 1, 3, 64, 255] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let encoded = encode(&payload);
            assert_eq!(decode(256, &encoded).unwrap(), payload);
        }
    }

    #[test]
    fn s1_frame_encode() {
        let encoded = encode(&[0x01, 0x02, 0x03]);
        assert_eq!(encoded, vec![0x7E, 0x00, 0x03, 0x01, 0x02, 0x03, 0xF9]);
    }

    #[test]
    fn s2_decode_with_leading_garbage() {
        let stream = [0xAA, 0xBB, 0x7E, 0x00, 0x01, 0x2A, 0xD4];
        assert_eq!(decode(256, &stream).unwrap(), vec![0x2A]);
    }

    #[test]
    fn s3_checksum_failure() {
        let stream = [0x7E, 0x00, 0x01, 0x2A, 0xD5];
        assert_eq!(decode(256, &stream).unwrap_err(), FrameError::Checksum);
    }

    #[test]
    fn length_over_capacity_overflows() {
        let mut decoder = FrameDecoder::new(4);
        let mut out = Vec::new();
        decoder.feed(SOF, &mut out).unwrap();
        decoder.feed(0x00, &mut out).unwrap();
        let err = decoder.feed(0x05, &mut out).unwrap_err();
        assert_eq!(err, FrameError::Overflow { cap: 4, got: 5 });
    }

    #[test]
    fn single_bit_flip_breaks_checksum() {
        let payload = [0x10, 0x20, 0x30, 0x40];
        let mut encoded = encode(&payload);
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;
        assert_eq!(decode(256, &encoded).unwrap_err(), FrameError::Checksum);

        let mut encoded2 = encode(&payload);
        encoded2[4] ^= 0x01; // flip a payload bit
        assert_eq!(decode(256, &encoded2).unwrap_err(), FrameError::Checksum);
    }
}
