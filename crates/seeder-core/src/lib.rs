pub mod affinity;
pub mod error;
pub mod handlers;
pub mod index;
pub mod protocol;

pub use error::{Result, SeederError};
pub use handlers::{handle, HandlerContext};
pub use index::{MembershipIndex, PeerRecord};
pub use protocol::{
    decode_request, decode_response, encode_request, encode_response, CodecError, HelloResult,
    Request, RequestPayload, Response, ResponsePayload,
};
