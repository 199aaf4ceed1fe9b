//! eISCP packet framing.
//!
//! Every ISCP message travelling over Ethernet is wrapped in an eISCP packet:
//!
//! | Offset | Size | Field | Value |
//! |--------|------|-------|-------|
//! | 0 | 4 | Magic | `"ISCP"` |
//! | 4 | 4 | Header length (big-endian) | 16 |
//! | 8 | 4 | Payload length (big-endian) | length of the ISCP message |
//! | 12 | 1 | Version | 1 |
//! | 13 | 3 | Reserved | 0 |
//! | 16 | n | ISCP message | `"!" + destination + message + "\r\n"` |
//!
//! The destination character is `'1'` for commands sent to a receiver and
//! `'x'` for the broadcast discovery query.
//!
//! Receivers terminate their messages with `EOF CR LF` (`\x1A\r\n`) while
//! this crate sends `CR LF`; [`decode`] strips any trailing run of these
//! characters so both forms decode to the bare message.
//!
//! # Example
//!
//! ```
//! use eiscp::packet::{decode, encode, Destination};
//!
//! let frame = encode("PWR01", Destination::Receiver);
//! assert_eq!(&frame[..4], b"ISCP");
//! assert_eq!(decode(&frame).unwrap(), "PWR01");
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{EiscpError, Result};

/// Packet magic.
pub const MAGIC: &[u8; 4] = b"ISCP";

/// eISCP header size in bytes. Only this header layout is supported.
pub const HEADER_SIZE: usize = 16;

/// eISCP protocol version written into every header.
pub const PROTOCOL_VERSION: u8 = 1;

/// ISCP start character.
pub const START_CHAR: u8 = b'!';

/// Terminator appended to outgoing ISCP messages.
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// End-of-file marker receivers place before `CR LF`.
pub const EOF_CHAR: u8 = 0x1A;

/// Smallest frame [`decode`] accepts: header, start and destination
/// characters, and a three byte trailer.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 2 + 3;

/// Largest payload accepted from the network.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// ISCP destination character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Unicast command to a receiver (`'1'`).
    #[default]
    Receiver,
    /// Broadcast discovery query (`'x'`).
    Broadcast,
}

impl Destination {
    /// Returns the wire character.
    pub fn as_byte(self) -> u8 {
        match self {
            Destination::Receiver => b'1',
            Destination::Broadcast => b'x',
        }
    }
}

/// Fixed 16-byte eISCP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Declared header length; always [`HEADER_SIZE`] for supported frames.
    pub header_len: u32,
    /// Length of the ISCP message following the header.
    pub payload_len: u32,
    /// Protocol version.
    pub version: u8,
}

impl PacketHeader {
    /// Creates a header for a payload of the given length.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::packet::PacketHeader;
    ///
    /// let header = PacketHeader::new(9);
    /// let bytes = header.to_bytes();
    /// assert_eq!(&bytes[..4], b"ISCP");
    /// assert_eq!(bytes[11], 9);
    /// ```
    pub fn new(payload_len: u32) -> Self {
        Self {
            header_len: HEADER_SIZE as u32,
            payload_len,
            version: PROTOCOL_VERSION,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(MAGIC);
        bytes[4..8].copy_from_slice(&self.header_len.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes[12] = self.version;
        bytes
    }

    /// Parses a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `EiscpError::InvalidFrame` if the slice is shorter than the
    /// header, the magic is wrong, or the declared header length is not 16.
    ///
    /// # Example
    ///
    /// ```
    /// use eiscp::packet::PacketHeader;
    ///
    /// let bytes = PacketHeader::new(12).to_bytes();
    /// let header = PacketHeader::from_bytes(&bytes).unwrap();
    /// assert_eq!(header.payload_len, 12);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(EiscpError::invalid_frame(format!(
                "header too short: expected {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }
        if &data[..4] != MAGIC {
            return Err(EiscpError::invalid_frame("missing ISCP magic"));
        }

        let header_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if header_len as usize != HEADER_SIZE {
            return Err(EiscpError::invalid_frame(format!(
                "unsupported header length {}",
                header_len
            )));
        }

        Ok(Self {
            header_len,
            payload_len: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            version: data[12],
        })
    }

    /// Total frame size (header plus payload).
    pub fn frame_len(self) -> usize {
        self.header_len as usize + self.payload_len as usize
    }
}

/// Wraps an ISCP message (e.g. `"PWR01"`) in an eISCP frame.
///
/// # Example
///
/// ```
/// use eiscp::packet::{encode, Destination};
///
/// let frame = encode("ECNQSTN", Destination::Broadcast);
/// assert_eq!(&frame[16..], b"!xECNQSTN\r\n");
/// ```
pub fn encode(payload: &str, destination: Destination) -> Vec<u8> {
    let message_len = 2 + payload.len() + TERMINATOR.len();
    let mut frame = Vec::with_capacity(HEADER_SIZE + message_len);
    frame.extend_from_slice(&PacketHeader::new(message_len as u32).to_bytes());
    frame.push(START_CHAR);
    frame.push(destination.as_byte());
    frame.extend_from_slice(payload.as_bytes());
    frame.extend_from_slice(TERMINATOR);
    frame
}

/// Extracts the ISCP message (command code and argument) from a frame.
///
/// Strips the header, the `'!'` start character, the destination character
/// and any trailing `EOF`/`CR`/`LF` bytes.
///
/// # Errors
///
/// Returns `EiscpError::InvalidFrame` if the frame is shorter than
/// [`MIN_FRAME_SIZE`], declares a header length other than 16, is truncated
/// relative to its declared payload length, or lacks the start character.
///
/// # Example
///
/// ```
/// use eiscp::packet::{decode, PacketHeader};
///
/// let mut frame = PacketHeader::new(10).to_bytes().to_vec();
/// frame.extend_from_slice(b"!1PWR01\x1a\r\n");
/// assert_eq!(decode(&frame).unwrap(), "PWR01");
/// ```
pub fn decode(frame: &[u8]) -> Result<String> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(EiscpError::invalid_frame(format!(
            "frame too short: expected at least {} bytes, got {}",
            MIN_FRAME_SIZE,
            frame.len()
        )));
    }

    let header = PacketHeader::from_bytes(frame)?;
    if frame.len() < header.frame_len() {
        return Err(EiscpError::invalid_frame(format!(
            "frame truncated: declared {} bytes, got {}",
            header.frame_len(),
            frame.len()
        )));
    }

    let message = &frame[HEADER_SIZE..header.frame_len()];
    if message.first() != Some(&START_CHAR) {
        return Err(EiscpError::invalid_frame("missing start character"));
    }

    let mut body = &message[2.min(message.len())..];
    while let Some((&last, rest)) = body.split_last() {
        if matches!(last, EOF_CHAR | b'\r' | b'\n') {
            body = rest;
        } else {
            break;
        }
    }

    Ok(String::from_utf8_lossy(body).into_owned())
}

/// Stream codec splitting a TCP byte stream into ISCP messages.
///
/// Frames are delimited by the payload length in their header. Bytes that do
/// not start with the `ISCP` magic are skipped up to the next magic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EiscpCodec {
    destination: Destination,
}

impl EiscpCodec {
    /// Creates a codec encoding for the given destination.
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }
}

impl Decoder for EiscpCodec {
    type Item = String;
    type Error = EiscpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if src.len() < MAGIC.len() {
            return Ok(None);
        }

        if &src[..MAGIC.len()] != MAGIC {
            match src.windows(MAGIC.len()).position(|w| w == MAGIC) {
                Some(pos) => {
                    tracing::warn!(skipped = pos, "discarding bytes before ISCP magic");
                    src.advance(pos);
                }
                None => {
                    // Keep a possible partial magic at the end.
                    let keep = MAGIC.len() - 1;
                    let skipped = src.len() - keep;
                    tracing::warn!(skipped, "discarding bytes without ISCP magic");
                    src.advance(skipped);
                    return Ok(None);
                }
            }
        }

        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = PacketHeader::from_bytes(&src[..HEADER_SIZE])?;
        if header.payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(EiscpError::invalid_frame(format!(
                "payload length {} exceeds {}",
                header.payload_len, MAX_PAYLOAD_SIZE
            )));
        }

        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        decode(&frame).map(Some)
    }
}

impl<'a> Encoder<&'a str> for EiscpCodec {
    type Error = EiscpError;

    fn encode(&mut self, payload: &'a str, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&encode(payload, self.destination));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_frame(message: &[u8]) -> Vec<u8> {
        let mut frame = PacketHeader::new(message.len() as u32).to_bytes().to_vec();
        frame.extend_from_slice(message);
        frame
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode("PWR01", Destination::Receiver);
        assert_eq!(
            hex::encode(&frame),
            "49534350000000100000000901000000213150575230310d0a"
        );
    }

    #[test]
    fn test_encode_payload_length() {
        let frame = encode("PWR01", Destination::Receiver);
        assert_eq!(&frame[..4], b"ISCP");
        assert_eq!(frame[11] as usize, "!1PWR01\r\n".len());
        assert_eq!(frame.len(), HEADER_SIZE + "!1PWR01\r\n".len());
    }

    #[test]
    fn test_encode_broadcast_destination() {
        let frame = encode("ECNQSTN", Destination::Broadcast);
        assert_eq!(&frame[HEADER_SIZE..HEADER_SIZE + 2], b"!x");
    }

    #[test]
    fn test_decode_own_frame() {
        let frame = encode("MVL2A", Destination::Receiver);
        assert_eq!(decode(&frame).unwrap(), "MVL2A");
    }

    #[test]
    fn test_decode_device_terminator() {
        let frame = device_frame(b"!1AMT01\x1a\r\n");
        assert_eq!(decode(&frame).unwrap(), "AMT01");
    }

    #[test]
    fn test_decode_too_short() {
        let frame = device_frame(b"!1");
        assert!(matches!(
            decode(&frame),
            Err(EiscpError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_header_length() {
        let mut frame = encode("PWR01", Destination::Receiver);
        frame[7] = 0x20;
        assert!(decode(&frame).is_err());
    }

    #[test]
    fn test_decode_truncated() {
        let frame = encode("PWR01", Destination::Receiver);
        assert!(decode(&frame[..frame.len() - 1]).is_err());
    }

    #[test]
    fn test_decode_missing_start_char() {
        let frame = device_frame(b"?1PWR01\r\n");
        assert!(decode(&frame).is_err());
    }

    #[test]
    fn test_header_roundtrip() {
        let original = PacketHeader::new(42);
        let parsed = PacketHeader::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, parsed);
        assert_eq!(parsed.frame_len(), HEADER_SIZE + 42);
    }

    #[test]
    fn test_codec_splits_concatenated_frames() {
        let mut codec = EiscpCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&device_frame(b"!1PWR01\x1a\r\n"));
        buf.extend_from_slice(&device_frame(b"!1MVL28\x1a\r\n"));

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PWR01"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("MVL28"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_waits_for_partial_frame() {
        let mut codec = EiscpCodec::default();
        let frame = device_frame(b"!1PWR01\x1a\r\n");
        let mut buf = BytesMut::from(&frame[..20]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&frame[20..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PWR01"));
    }

    #[test]
    fn test_codec_resyncs_on_garbage() {
        let mut codec = EiscpCodec::default();
        let mut buf = BytesMut::from(&b"\x00\x01junk"[..]);
        buf.extend_from_slice(&device_frame(b"!1AMT00\x1a\r\n"));

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("AMT00"));
    }

    #[test]
    fn test_codec_rejects_oversized_payload() {
        let mut codec = EiscpCodec::default();
        let mut buf = BytesMut::from(&PacketHeader::new(MAX_PAYLOAD_SIZE as u32 + 1).to_bytes()[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_codec_encode() {
        let mut codec = EiscpCodec::new(Destination::Receiver);
        let mut buf = BytesMut::new();
        codec.encode("PWRQSTN", &mut buf).unwrap();
        assert_eq!(&buf[..], &encode("PWRQSTN", Destination::Receiver)[..]);
    }
}
