//! Wire codec (C3): a 16-bit length prefix followed by a schema-encoded
//! payload. The schema itself is these `serde`-derived types; `bincode`
//! plays the role the spec assigns to an external schema compiler.

use serde::{Deserialize, Serialize};

/// Informational framing prefix width, per the base spec.
const LENGTH_PREFIX_BYTES: usize = 2;

/// Number of `RequestPayload` variants (`None` through `Bye`). With
/// `with_fixed_int_encoding()`, bincode writes a struct's fields in
/// declaration order and an enum's variant index as a fixed 4-byte
/// little-endian `u32` ahead of its fields. `Request { id: u64, request:
/// RequestPayload }` therefore encodes as 8 bytes of `id` followed by the
/// 4-byte `RequestPayload` discriminant, which is the tag this crate checks
/// before trusting the rest of a request body to the decoder.
const REQUEST_VARIANT_COUNT: u32 = 6;
const REQUEST_ID_BYTES: usize = 8;
const REQUEST_TAG_BYTES: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("frame too short to contain a length prefix")]
    MissingLengthPrefix,
    #[error("declared frame length {declared} exceeds buffer of {available} bytes")]
    TruncatedFrame { declared: usize, available: usize },
    #[error("unknown request discriminant {tag}")]
    UnknownRequestTag { tag: u32 },
    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

pub type CodecResult<T> = core::result::Result<T, CodecError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestPayload {
    None,
    Hello {
        address: String,
    },
    GetElitedPeers {
        number_of_peers: u32,
    },
    GetPeersByLastAlive {
        last_alive_since: i64,
    },
    PeerStatus {
        address: String,
        last_alive: i64,
        peer_current_connections: Vec<String>,
    },
    Bye {
        address: String,
    },
}

impl RequestPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            RequestPayload::None => "None",
            RequestPayload::Hello { .. } => "Hello",
            RequestPayload::GetElitedPeers { .. } => "GetElitedPeers",
            RequestPayload::GetPeersByLastAlive { .. } => "GetPeersByLastAlive",
            RequestPayload::PeerStatus { .. } => "PeerStatus",
            RequestPayload::Bye { .. } => "Bye",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub request: RequestPayload,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HelloResult {
    RegisteredSuccessfully,
    AlreadyRegistered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponsePayload {
    HelloResponse {
        result: HelloResult,
        ping_interval_seconds: Option<u32>,
    },
    GetElitedPeersResponse {
        peers: Vec<String>,
    },
    GetAlivePeersResponse {
        peers: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub id: u64,
    pub response: ResponsePayload,
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

fn encode_frame<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(value, bincode_config())?;
    let len: u16 = body
        .len()
        .try_into()
        .map_err(|_| bincode::error::EncodeError::Other("payload exceeds u16 length prefix"))?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_BYTES + body.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Honors the length prefix as authoritative (Open Question #1): a buffer
/// shorter than declared is rejected, and bytes past the declared length are
/// ignored rather than fed to the decoder. Returns the declared-length slice
/// of the payload, not yet decoded.
fn framed_body(buf: &[u8]) -> CodecResult<&[u8]> {
    if buf.len() < LENGTH_PREFIX_BYTES {
        return Err(CodecError::MissingLengthPrefix);
    }
    let (len_bytes, rest) = buf.split_at(LENGTH_PREFIX_BYTES);
    let declared = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if rest.len() < declared {
        return Err(CodecError::TruncatedFrame {
            declared,
            available: rest.len(),
        });
    }
    Ok(&rest[..declared])
}

fn decode_frame<T: serde::de::DeserializeOwned>(buf: &[u8]) -> CodecResult<T> {
    let body = framed_body(buf)?;
    let (value, _) = bincode::serde::decode_from_slice(body, bincode_config())?;
    Ok(value)
}

pub fn encode_request(req: &Request) -> CodecResult<Vec<u8>> {
    encode_frame(req)
}

/// Decodes a request, distinguishing an out-of-range `RequestPayload`
/// discriminant (`UnknownRequestTag`) from every other decode failure
/// (`Decode`/`TruncatedFrame`/`MissingLengthPrefix`), so the dispatcher can
/// log "unknown request type" and "malformed frame" as the distinct events
/// the base spec calls for.
pub fn decode_request(buf: &[u8]) -> CodecResult<Request> {
    let body = framed_body(buf)?;
    if body.len() >= REQUEST_ID_BYTES + REQUEST_TAG_BYTES {
        let tag_bytes = &body[REQUEST_ID_BYTES..REQUEST_ID_BYTES + REQUEST_TAG_BYTES];
        let tag = u32::from_le_bytes(tag_bytes.try_into().unwrap());
        if tag >= REQUEST_VARIANT_COUNT {
            return Err(CodecError::UnknownRequestTag { tag });
        }
    }
    let (value, _) = bincode::serde::decode_from_slice(body, bincode_config())?;
    Ok(value)
}

pub fn encode_response(resp: &Response) -> CodecResult<Vec<u8>> {
    encode_frame(resp)
}

pub fn decode_response(buf: &[u8]) -> CodecResult<Response> {
    decode_frame(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let cases = [
            Request {
                id: 1,
                request: RequestPayload::Hello {
                    address: "10.0.0.1:7000".into(),
                },
            },
            Request {
                id: 2,
                request: RequestPayload::GetElitedPeers {
                    number_of_peers: 10,
                },
            },
            Request {
                id: 3,
                request: RequestPayload::GetPeersByLastAlive {
                    last_alive_since: 1500,
                },
            },
            Request {
                id: 4,
                request: RequestPayload::PeerStatus {
                    address: "10.0.0.1:7000".into(),
                    last_alive: 1000,
                    peer_current_connections: vec!["x".into(), "y".into()],
                },
            },
            Request {
                id: 5,
                request: RequestPayload::Bye {
                    address: "10.0.0.1:7000".into(),
                },
            },
        ];
        for req in cases {
            let framed = encode_request(&req).unwrap();
            let decoded = decode_request(&framed).unwrap();
            assert_eq!(req, decoded);
        }
    }

    #[test]
    fn response_round_trips() {
        let cases = [
            Response {
                id: 1,
                response: ResponsePayload::HelloResponse {
                    result: HelloResult::RegisteredSuccessfully,
                    ping_interval_seconds: Some(30),
                },
            },
            Response {
                id: 1,
                response: ResponsePayload::HelloResponse {
                    result: HelloResult::AlreadyRegistered,
                    ping_interval_seconds: None,
                },
            },
            Response {
                id: 2,
                response: ResponsePayload::GetElitedPeersResponse {
                    peers: vec!["a".into(), "b".into()],
                },
            },
            Response {
                id: 3,
                response: ResponsePayload::GetAlivePeersResponse { peers: vec![] },
            },
        ];
        for resp in cases {
            let framed = encode_response(&resp).unwrap();
            let decoded = decode_response(&framed).unwrap();
            assert_eq!(resp, decoded);
        }
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let req = Request {
            id: 1,
            request: RequestPayload::Bye {
                address: "x".into(),
            },
        };
        let mut framed = encode_request(&req).unwrap();
        framed.truncate(framed.len() - 1);
        let err = decode_request(&framed).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedFrame { .. }));
    }

    #[test]
    fn unknown_request_tag_is_distinguished_from_malformed_frame() {
        let req = Request {
            id: 1,
            request: RequestPayload::Hello { address: "x".into() },
        };
        let mut framed = encode_request(&req).unwrap();
        // Body starts right after the 2-byte length prefix; id (8 bytes,
        // fixed-width u64) comes first, then the RequestPayload
        // discriminant (4 bytes, fixed-width u32). Overwrite it with a
        // value past the last known variant.
        let tag_start = LENGTH_PREFIX_BYTES + REQUEST_ID_BYTES;
        framed[tag_start..tag_start + REQUEST_TAG_BYTES]
            .copy_from_slice(&99u32.to_le_bytes());
        let err = decode_request(&framed).unwrap_err();
        assert!(matches!(err, CodecError::UnknownRequestTag { tag: 99 }));
    }

    #[test]
    fn garbage_is_not_a_panic() {
        let garbage = [0u8; 8];
        assert!(decode_request(&garbage).is_err());
    }

    #[test]
    fn trailing_bytes_past_declared_length_are_ignored() {
        let req = Request {
            id: 7,
            request: RequestPayload::GetElitedPeers {
                number_of_peers: 1,
            },
        };
        let mut framed = encode_request(&req).unwrap();
        framed.extend_from_slice(b"trailing-garbage");
        let decoded = decode_request(&framed).unwrap();
        assert_eq!(req, decoded);
    }
}
