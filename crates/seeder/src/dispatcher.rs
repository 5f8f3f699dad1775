//! Dispatcher (C4): binds the worker pool and runs each socket's
//! receive/decode/handle/reply loop until cancellation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use seeder_core::{decode_request, encode_response, handle, HandlerContext, MembershipIndex};
use seeder_core::{CodecError, Request, Response, SeederError};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, error_span, info, warn, Instrument};

use crate::config::SeederConfig;

const MAX_DATAGRAM_SIZE: usize = 2048;

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Binds `config.worker_count` consecutive UDP sockets starting at
/// `config.beginning_port` and runs one worker loop per socket until
/// `cancel` fires. Binding any socket is fatal to the whole process: the
/// first failure aborts startup before any worker is spawned.
pub async fn run(
    config: Arc<SeederConfig>,
    index: Arc<MembershipIndex>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut sockets = Vec::with_capacity(config.worker_count as usize);
    for offset in 0..config.worker_count {
        let port = config.beginning_port + offset;
        let bind_addr = SocketAddr::new(config.bind_address, port);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| SeederError::BindFailure { port, source })?;
        info!(port, "bound worker socket");
        sockets.push(socket);
    }

    let mut workers = tokio::task::JoinSet::new();
    for (worker_id, socket) in sockets.into_iter().enumerate() {
        let config = config.clone();
        let index = index.clone();
        let cancel = cancel.clone();
        let span = error_span!("worker", worker_id, port = config.beginning_port + worker_id as u16);
        workers.spawn(
            async move { worker_loop(worker_id, socket, config, index, cancel).await }
                .instrument(span),
        );
    }

    while let Some(result) = workers.join_next().await {
        if let Err(join_err) = result {
            error!(error = %join_err, "worker task panicked");
        }
    }
    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    socket: UdpSocket,
    config: Arc<SeederConfig>,
    index: Arc<MembershipIndex>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (len, peer_addr) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(worker_id, "shutting down");
                return;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(worker_id, error = %e, "recv_from failed");
                    continue;
                }
            },
        };

        let request = match decode_request(&buf[..len]) {
            Ok(request) => request,
            Err(CodecError::UnknownRequestTag { tag }) => {
                let err = SeederError::UnknownRequestType {
                    addr: peer_addr,
                    tag: tag as u8,
                };
                warn!(worker_id, addr = %peer_addr, error = %err, "unknown request type");
                continue;
            }
            Err(e) => {
                let err = SeederError::MalformedFrame {
                    addr: peer_addr,
                    reason: e.to_string(),
                };
                warn!(worker_id, addr = %peer_addr, error = %err, "dropping malformed frame");
                continue;
            }
        };

        handle_one(worker_id, &socket, peer_addr, request, &config, &index).await;
    }
}

async fn handle_one(
    worker_id: usize,
    socket: &UdpSocket,
    peer_addr: SocketAddr,
    request: Request,
    config: &SeederConfig,
    index: &MembershipIndex,
) {
    info!(
        worker_id,
        addr = %peer_addr,
        id = request.id,
        request_type = request.request.type_name(),
        "accepted request"
    );

    let ctx = HandlerContext {
        index,
        peer_addr,
        now: unix_timestamp(),
        ping_interval_seconds: config.client_ping_interval,
    };

    let Some(response_payload) = handle(&ctx, request.request) else {
        return;
    };

    let response = Response {
        id: request.id,
        response: response_payload,
    };
    let framed = match encode_response(&response) {
        Ok(framed) => framed,
        Err(e) => {
            error!(worker_id, addr = %peer_addr, error = %e, "failed to encode reply");
            return;
        }
    };

    if let Err(source) = socket.send_to(&framed, peer_addr).await {
        let err = SeederError::SendFailure {
            addr: peer_addr,
            source,
        };
        error!(worker_id, error = %err, "reply send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_core::{encode_request, HelloResult, RequestPayload, ResponsePayload};
    use std::net::Ipv4Addr;

    async fn client_roundtrip(
        server_addr: SocketAddr,
        id: u64,
        payload: RequestPayload,
    ) -> Option<Response> {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let framed = encode_request(&Request {
            id,
            request: payload,
        })
        .unwrap();
        client.send_to(&framed, server_addr).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let recv = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
        let (len, _) = match recv {
            Ok(r) => r.unwrap(),
            Err(_) => return None,
        };
        Some(seeder_core::decode_response(&buf[..len]).unwrap())
    }

    #[tokio::test]
    async fn hello_then_status_then_query_end_to_end() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let config = Arc::new(SeederConfig {
            beginning_port: server_addr.port(),
            worker_count: 1,
            client_ping_interval: 15,
            bind_address: Ipv4Addr::LOCALHOST.into(),
        });
        let index = Arc::new(MembershipIndex::new());
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        let worker_index = index.clone();
        let worker_config = config.clone();
        let worker = tokio::spawn(async move {
            worker_loop(0, socket, worker_config, worker_index, worker_cancel).await;
        });

        let hello = client_roundtrip(
            server_addr,
            1,
            RequestPayload::Hello {
                address: "10.0.0.5:6000".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            hello.response,
            ResponsePayload::HelloResponse {
                result: HelloResult::RegisteredSuccessfully,
                ping_interval_seconds: Some(15),
            }
        );

        let status = client_roundtrip(
            server_addr,
            2,
            RequestPayload::PeerStatus {
                address: "10.0.0.5:6000".into(),
                last_alive: unix_timestamp(),
                peer_current_connections: vec!["10.0.0.6:6000".into()],
            },
        )
        .await;
        assert!(status.is_none());

        let elite = client_roundtrip(
            server_addr,
            3,
            RequestPayload::GetElitedPeers { number_of_peers: 5 },
        )
        .await
        .unwrap();
        assert_eq!(
            elite.response,
            ResponsePayload::GetElitedPeersResponse {
                peers: vec!["10.0.0.5:6000".into()],
            }
        );

        let bye = client_roundtrip(
            server_addr,
            4,
            RequestPayload::Bye {
                address: "10.0.0.5:6000".into(),
            },
        )
        .await;
        assert!(bye.is_none());
        assert_eq!(index.size(), 0);

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_request_tag_is_dropped_and_worker_keeps_running() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        let config = Arc::new(SeederConfig {
            beginning_port: server_addr.port(),
            worker_count: 1,
            client_ping_interval: 15,
            bind_address: Ipv4Addr::LOCALHOST.into(),
        });
        let index = Arc::new(MembershipIndex::new());
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(worker_loop(
            0,
            socket,
            config.clone(),
            index.clone(),
            cancel.clone(),
        ));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut framed = encode_request(&Request {
            id: 1,
            request: RequestPayload::Hello {
                address: "x".into(),
            },
        })
        .unwrap();
        // Body starts after the 2-byte length prefix; id is 8 bytes, then
        // the discriminant is a fixed 4-byte u32 — set it past the last
        // known RequestPayload variant.
        let tag_start = 2 + 8;
        framed[tag_start..tag_start + 4].copy_from_slice(&99u32.to_le_bytes());
        client.send_to(&framed, server_addr).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let recv = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
        assert!(recv.is_err(), "no reply should be sent for an unknown request type");

        let hello = client_roundtrip(
            server_addr,
            2,
            RequestPayload::Hello {
                address: "10.0.0.1:1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            hello.response,
            ResponsePayload::HelloResponse {
                result: HelloResult::RegisteredSuccessfully,
                ping_interval_seconds: Some(15),
            }
        );

        cancel.cancel();
        worker.await.unwrap();
    }
}
