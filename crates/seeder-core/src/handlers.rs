//! Request handlers (C5): pure translation from a decoded request payload
//! plus the current membership state into a response payload, with no I/O
//! of their own. The dispatcher owns sockets and timing; these functions
//! only ever see what they need to decide an answer.

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::error::SeederError;
use crate::index::MembershipIndex;
use crate::protocol::{HelloResult, RequestPayload, ResponsePayload};

/// Per-call context a handler needs beyond the index itself.
pub struct HandlerContext<'a> {
    pub index: &'a MembershipIndex,
    pub peer_addr: SocketAddr,
    pub now: i64,
    pub ping_interval_seconds: u32,
}

/// Runs one request to completion. Returns `None` when the base spec calls
/// for no reply at all (`PeerStatus`, `Bye`) — the caller must not send a
/// packet in that case, not even an empty one.
pub fn handle(ctx: &HandlerContext, request: RequestPayload) -> Option<ResponsePayload> {
    match request {
        RequestPayload::None => {
            warn!(addr = %ctx.peer_addr, "empty request payload, no-op");
            None
        }
        RequestPayload::Hello { address } => Some(handle_hello(ctx, address)),
        RequestPayload::GetElitedPeers { number_of_peers } => {
            Some(handle_get_elited_peers(ctx, number_of_peers))
        }
        RequestPayload::GetPeersByLastAlive { last_alive_since } => {
            Some(handle_get_peers_by_last_alive(ctx, last_alive_since))
        }
        RequestPayload::PeerStatus {
            address,
            last_alive,
            peer_current_connections,
        } => {
            handle_peer_status(ctx, address, last_alive, peer_current_connections);
            None
        }
        RequestPayload::Bye { address } => {
            handle_bye(ctx, address);
            None
        }
    }
}

fn handle_hello(ctx: &HandlerContext, address: String) -> ResponsePayload {
    if ctx.index.add(&address, ctx.now) {
        info!(addr = %ctx.peer_addr, peer = %address, "registered");
        ResponsePayload::HelloResponse {
            result: HelloResult::RegisteredSuccessfully,
            ping_interval_seconds: Some(ctx.ping_interval_seconds),
        }
    } else {
        let err = SeederError::DuplicateRegistration {
            address: address.clone(),
        };
        warn!(addr = %ctx.peer_addr, peer = %address, error = %err, "hello rejected");
        ResponsePayload::HelloResponse {
            result: HelloResult::AlreadyRegistered,
            ping_interval_seconds: None,
        }
    }
}

fn handle_get_elited_peers(ctx: &HandlerContext, number_of_peers: u32) -> ResponsePayload {
    let peers = ctx.index.elite_top(number_of_peers as usize);
    ResponsePayload::GetElitedPeersResponse { peers }
}

fn handle_get_peers_by_last_alive(ctx: &HandlerContext, last_alive_since: i64) -> ResponsePayload {
    let peers = ctx.index.alive_since(last_alive_since);
    ResponsePayload::GetAlivePeersResponse { peers }
}

fn handle_peer_status(
    ctx: &HandlerContext,
    address: String,
    last_alive: i64,
    peer_current_connections: Vec<String>,
) {
    ctx.index.touch(&address, last_alive);
    ctx.index
        .set_connections(&address, peer_current_connections.len() as u32);
    info!(
        addr = %ctx.peer_addr,
        peer = %address,
        connections = peer_current_connections.len(),
        "status update"
    );
}

fn handle_bye(ctx: &HandlerContext, address: String) {
    ctx.index.remove(&address);
    info!(addr = %ctx.peer_addr, peer = %address, "deregistered");
}
