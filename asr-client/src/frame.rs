//! Binary frame layout for the ASR protocol (§3, §4.C).
//!
//! `[header 4B][sequence 4B big-endian][payload_size 4B big-endian][payload]`

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use psych_core::CoreError;
use std::io::Read;

pub const PROTOCOL_VERSION: u8 = 0b0001;
pub const DEFAULT_HEADER_SIZE: u8 = 0b0001;

pub const FULL_CLIENT_REQUEST: u8 = 0x1;
pub const AUDIO_ONLY_REQUEST: u8 = 0x2;
pub const FULL_SERVER_RESPONSE: u8 = 0x9;
pub const SERVER_ACK: u8 = 0xB;
pub const SERVER_ERROR_RESPONSE: u8 = 0xF;

pub const FLAG_NO_SEQUENCE: u8 = 0b0000;
pub const FLAG_POS_SEQUENCE: u8 = 0x1;
pub const FLAG_NEG_SEQUENCE: u8 = 0x2;

pub const SERIALIZATION_JSON: u8 = 0x1;

pub const COMPRESSION_NONE: u8 = 0b0000;
pub const COMPRESSION_GZIP: u8 = 0x1;

fn header(message_type: u8, flags: u8, serialization: u8, compression: u8) -> [u8; 4] {
    [
        (PROTOCOL_VERSION << 4) | DEFAULT_HEADER_SIZE,
        (message_type << 4) | flags,
        (serialization << 4) | compression,
        0,
    ]
}

pub fn int_to_bytes(n: i32) -> [u8; 4] {
    n.to_be_bytes()
}

pub fn bytes_to_int(data: &[u8]) -> Result<i32, CoreError> {
    if data.len() != 4 {
        return Err(CoreError::WrongFrameType);
    }
    Ok(i32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut encoder = GzEncoder::new(data, Compression::default());
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).map_err(CoreError::Io)?;
    Ok(out)
}

pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CoreError::Io)?;
    Ok(out)
}

/// Build a full client request frame: gzip-compressed JSON payload,
/// sequence always positive.
pub fn build_full_client_request(seq: i32, payload: &[u8]) -> Result<Vec<u8>, CoreError> {
    build_frame(FULL_CLIENT_REQUEST, FLAG_POS_SEQUENCE, seq, payload)
}

/// Build an audio-only request frame carrying gzip-compressed raw PCM.
pub fn build_audio_only_request(seq: i32, payload: &[u8]) -> Result<Vec<u8>, CoreError> {
    build_frame(AUDIO_ONLY_REQUEST, FLAG_POS_SEQUENCE, seq, payload)
}

fn build_frame(message_type: u8, flags: u8, seq: i32, payload: &[u8]) -> Result<Vec<u8>, CoreError> {
    let compressed = gzip_compress(payload)?;
    let mut frame = Vec::with_capacity(12 + compressed.len());
    frame.extend_from_slice(&header(message_type, flags, SERIALIZATION_JSON, COMPRESSION_GZIP));
    frame.extend_from_slice(&int_to_bytes(seq));
    frame.extend_from_slice(&int_to_bytes(compressed.len() as i32));
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// One parsed server frame.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub payload: Vec<u8>,
    pub sequence: i32,
}

/// Parse one inbound binary frame per §4.C's dispatch table.
pub fn parse(data: &[u8]) -> Result<ParsedFrame, CoreError> {
    if data.len() < 12 {
        return Err(CoreError::WrongFrameType);
    }

    let message_type = (data[1] >> 4) & 0x0f;
    let compression = data[2] & 0x0f;
    let sequence = bytes_to_int(&data[4..8])?;
    let payload = &data[12..];

    let payload = if compression == COMPRESSION_GZIP {
        gzip_decompress(payload)?
    } else {
        payload.to_vec()
    };

    match message_type {
        FULL_CLIENT_REQUEST | FULL_SERVER_RESPONSE | SERVER_ACK => Ok(ParsedFrame { payload, sequence }),
        SERVER_ERROR_RESPONSE => Err(CoreError::AsrServerError {
            code: sequence,
            msg: String::from_utf8_lossy(&payload).to_string(),
        }),
        other => Err(CoreError::UnknownFrameType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips_arbitrary_payload() {
        let payload = b"hello psych-digital, \xE4\xBD\xA0\xE5\xA5\xBD".to_vec();
        let compressed = gzip_compress(&payload).unwrap();
        let restored = gzip_decompress(&compressed).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn int_bytes_round_trip_any_u32_range_value() {
        for n in [0i32, 1, -1, i32::MAX, i32::MIN, 42, -42] {
            let bytes = int_to_bytes(n);
            assert_eq!(bytes_to_int(&bytes).unwrap(), n);
        }
    }

    #[test]
    fn full_server_response_parses_payload_and_sequence() {
        let payload = br#"{"text":"hi"}"#;
        let frame = build_frame(FULL_SERVER_RESPONSE, FLAG_POS_SEQUENCE, 7, payload).unwrap();
        let parsed = parse(&frame).unwrap();
        assert_eq!(parsed.sequence, 7);
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn server_error_response_surfaces_code_and_message() {
        let payload = b"quota";
        let frame = build_frame(SERVER_ERROR_RESPONSE, FLAG_POS_SEQUENCE, 42, payload).unwrap();
        let err = parse(&frame).unwrap_err();
        match err {
            CoreError::AsrServerError { code, msg } => {
                assert_eq!(code, 42);
                assert_eq!(msg, "quota");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let frame = build_frame(0x3, FLAG_POS_SEQUENCE, 1, b"x").unwrap();
        assert!(matches!(parse(&frame), Err(CoreError::UnknownFrameType(0x3))));
    }
}
