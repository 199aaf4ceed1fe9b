//! Fixtures shared by the unit tests.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::dictionary::Dictionary;
use crate::packet::{self, PacketHeader, HEADER_SIZE};

pub(crate) const FIXTURE_JSON: &str = include_str!("../data/eiscp-commands.json");

pub(crate) fn fixture_dictionary() -> Dictionary {
    Dictionary::from_json_str(FIXTURE_JSON).unwrap()
}

pub(crate) fn shared_dictionary() -> Arc<Dictionary> {
    Arc::new(fixture_dictionary())
}

/// Builds a frame the way a receiver sends it (`EOF CR LF` trailer).
pub(crate) fn device_frame(message: &str) -> Vec<u8> {
    let payload = format!("!1{}\x1a\r\n", message);
    let mut frame = PacketHeader::new(payload.len() as u32).to_bytes().to_vec();
    frame.extend_from_slice(payload.as_bytes());
    frame
}

/// Reads one frame from a mock receiver socket and returns its message.
pub(crate) async fn read_frame(stream: &mut TcpStream) -> String {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    let parsed = PacketHeader::from_bytes(&header).unwrap();

    let mut frame = header.to_vec();
    frame.resize(parsed.frame_len(), 0);
    stream.read_exact(&mut frame[HEADER_SIZE..]).await.unwrap();
    packet::decode(&frame).unwrap()
}
