//! The main event loop (§4.10): a single cooperative `select!` over client
//! sockets, the resolver channel, the parent channel, the routing socket,
//! and the pending-table sweep timer. Nothing here blocks anything else —
//! grounded on the teacher's `server.rs` loop shape, restructured around
//! this front-end's own set of event sources instead of heimdall's upstream
//! pool and cache.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::net::UnixStream;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::accept_limiter::AcceptLimiter;
use crate::blocklist::Blocklist;
use crate::config::FrontendConfig;
use crate::dns::{wire, DnsHeader, Rcode};
use crate::error::{FrontendError, Result};
use crate::guard::{self, CheckOutcome};
use crate::http;
use crate::ipc::main_channel::{MainChannel, MainEvent};
use crate::ipc::resolver::{ResolverChannel, ResolverInbound, ResolverOutbound};
use crate::metrics::FrontendMetrics;
use crate::pending::{PendingQuery, PendingTable, Transport};
use crate::pool::BufferPool;
use crate::routesock::{RouteEvent, RouteSocket};
use crate::sandbox::Sandbox;
use crate::session::tcp::TcpConnection;
use crate::session::{TcpServer, UdpSession};
use crate::shutdown::GracefulShutdown;
use crate::taset::TrustAnchorStore;

type TcpReplyChannels = DashMap<u64, mpsc::UnboundedSender<Vec<u8>>>;

pub async fn run(config: FrontendConfig) -> Result<()> {
    let metrics = Arc::new(
        FrontendMetrics::new().map_err(|e| FrontendError::Config(e.to_string()))?,
    );
    let blocklist = Arc::new(load_blocklist(&config).await?);
    let mut taset = TrustAnchorStore::load(&config.trust_anchor_file).await?;
    let pending = Arc::new(PendingTable::new(config.pending_capacity));
    let buffers = BufferPool::new(65536, 512);
    let shutdown = Arc::new(GracefulShutdown::new());

    let mut route_socket = match RouteSocket::open() {
        Ok(sock) => Some(sock),
        Err(e) => {
            warn!(error = %e, "routing socket unavailable, network-change notifications disabled");
            None
        }
    };

    let (udp_session, tcp_server, main_channel) = setup_listeners(&config, buffers).await?;

    let resolver_stream = UnixStream::connect(&config.resolver_sock)
        .await
        .map_err(|e| FrontendError::Config(format!("connecting to resolver socket: {e}")))?;
    let resolver_channel = ResolverChannel::new(resolver_stream);

    let (resolver_out_tx, resolver_out_rx) = mpsc::channel::<(ResolverOutbound, Vec<u8>)>(1024);
    let (resolver_in_tx, mut resolver_in_rx) = mpsc::channel::<(ResolverInbound, Vec<u8>)>(1024);
    tokio::spawn(run_resolver_actor(resolver_channel, resolver_out_rx, resolver_in_tx));

    let (main_event_tx, mut main_event_rx) = mpsc::channel::<MainEvent>(32);
    if let Some(channel) = main_channel {
        tokio::spawn(run_main_actor(channel, main_event_tx));
    }

    // Every listening socket and IPC channel this process will ever need is
    // open by now; nothing past this point may open a new one.
    let _sandbox = Sandbox::install()?;

    if let Some(addr) = config.metrics_listen {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(addr, metrics).await {
                error!(error = %e, "metrics endpoint exited");
            }
        });
    }

    let tcp_reply_channels: Arc<TcpReplyChannels> = Arc::new(DashMap::new());
    let next_conn_id = Arc::new(AtomicU64::new(1));

    let mut sweep = tokio::time::interval(config.sweep_interval());
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    info!("unwindd-front event loop started");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sighup.recv() => {
                debug!("SIGHUP ignored");
            }

            _ = sweep.tick() => {
                let expired = pending.sweep_expired(config.query_timeout());
                for (_id, query) in expired {
                    metrics.resolver_timeouts_total.inc();
                    let reply = wire::encode_error(Some(&query.question), query.client_id, query.rd, Rcode::ServFail);
                    deliver_reply(&udp_session, &tcp_reply_channels, &query.transport, &reply).await;
                }
                metrics.pending_queries.set(pending.len() as i64);
            }

            result = udp_session.recv() => {
                match result {
                    Ok((buf, peer)) => {
                        metrics.queries_total.with_label_values(&["udp"]).inc();
                        handle_udp_datagram(buf, peer, &blocklist, &pending, &resolver_out_tx, &udp_session, &metrics).await;
                    }
                    Err(e) => warn!(error = %e, "udp recv failed"),
                }
            }

            result = tcp_server.accept() => {
                match result {
                    Ok(conn) => {
                        metrics.queries_total.with_label_values(&["tcp"]).inc();
                        metrics.tcp_connections.inc();
                        let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
                        tcp_reply_channels.insert(conn_id, reply_tx);

                        let blocklist = blocklist.clone();
                        let pending = pending.clone();
                        let resolver_out_tx = resolver_out_tx.clone();
                        let metrics = metrics.clone();
                        let tcp_reply_channels = tcp_reply_channels.clone();
                        tokio::spawn(async move {
                            handle_tcp_connection(conn, conn_id, blocklist, pending, resolver_out_tx, reply_rx).await;
                            tcp_reply_channels.remove(&conn_id);
                            metrics.tcp_connections.dec();
                        });
                    }
                    Err(e) => warn!(error = %e, "tcp accept failed"),
                }
            }

            Some((message, payload)) = resolver_in_rx.recv() => {
                handle_resolver_message(message, payload, &pending, &udp_session, &tcp_reply_channels, &mut taset, &metrics, &resolver_out_tx).await;
            }

            Some(event) = main_event_rx.recv() => {
                handle_main_event(event, &blocklist, &mut taset, &resolver_out_tx).await;
            }

            result = poll_route_socket(&mut route_socket) => {
                match result {
                    Ok(Some(event)) => dispatch_route_event(event, &resolver_out_tx).await,
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "routing socket read failed"),
                }
            }
        }
    }

    if let Err(e) = taset.persist().await {
        error!(error = %e, "failed to persist trust anchors on shutdown");
    }
    shutdown.run().await;
    Ok(())
}

async fn poll_route_socket(route_socket: &mut Option<RouteSocket>) -> Result<Option<RouteEvent>> {
    match route_socket {
        Some(sock) => sock.next_event().await,
        None => std::future::pending().await,
    }
}

/// Forward a routing-socket event to the resolver (§4.9).
async fn dispatch_route_event(
    event: RouteEvent,
    resolver_out_tx: &mpsc::Sender<(ResolverOutbound, Vec<u8>)>,
) {
    let message = match event {
        RouteEvent::NetworkChanged => ResolverOutbound::NetworkChanged,
        RouteEvent::InterfaceDeparted { if_index } => ResolverOutbound::ReplaceDns {
            if_index,
            src: 0,
            rtdns: Vec::new(),
        },
        RouteEvent::DnsProposal { if_index, rtdns, .. } => ResolverOutbound::ReplaceDns {
            if_index,
            src: 1,
            rtdns,
        },
    };
    let _ = resolver_out_tx.send((message, Vec::new())).await;
}

async fn setup_listeners(
    config: &FrontendConfig,
    buffers: BufferPool,
) -> Result<(UdpSession, TcpServer, Option<MainChannel>)> {
    match UnixStream::connect(&config.main_sock).await {
        Ok(stream) => {
            let mut channel = MainChannel::new(stream);
            let mut udp_socket = None;
            let mut tcp_listener = None;
            while udp_socket.is_none() || tcp_listener.is_none() {
                match channel.next_event().await? {
                    MainEvent::NewUdpListener(socket) => udp_socket = Some(socket),
                    MainEvent::NewTcpListener(listener) => tcp_listener = Some(listener),
                    _ => warn!("ignoring non-listener message before startup handshake completed"),
                }
            }
            let udp_session = UdpSession::from_socket(udp_socket.unwrap(), buffers);
            let tokio_listener = tokio::net::TcpListener::from_std(tcp_listener.unwrap())?;
            let tcp_server = TcpServer::from_listener(tokio_listener, AcceptLimiter::from_rlimit());
            Ok((udp_session, tcp_server, Some(channel)))
        }
        Err(e) => {
            info!(error = %e, "main channel unavailable, binding listeners directly (standalone mode)");
            let udp_session = UdpSession::bind(config.udp_listen, buffers).await?;
            let tcp_server = TcpServer::bind(config.tcp_listen, AcceptLimiter::from_rlimit()).await?;
            Ok((udp_session, tcp_server, None))
        }
    }
}

async fn load_blocklist(config: &FrontendConfig) -> Result<Blocklist> {
    let Some(path) = &config.blocklist_file else {
        return Ok(Blocklist::empty());
    };
    let text = tokio::fs::read_to_string(path).await?;
    let names = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string);
    Ok(Blocklist::from_names(names))
}

async fn handle_udp_datagram(
    buf: Vec<u8>,
    peer: SocketAddr,
    blocklist: &Blocklist,
    pending: &PendingTable,
    resolver_out_tx: &mpsc::Sender<(ResolverOutbound, Vec<u8>)>,
    udp: &UdpSession,
    metrics: &FrontendMetrics,
) {
    match guard::check_query(&buf, blocklist) {
        CheckOutcome::Drop => {}
        CheckOutcome::Respond(reply) => {
            record_guard_rejection(metrics, &reply);
            if let Err(e) = udp.send(&reply, peer).await {
                warn!(error = %e, "udp send failed");
            }
        }
        CheckOutcome::Forward {
            question,
            header_id,
            rd,
            cd,
            edns,
        } => {
            let qname = question.qname.to_string();
            let pq = PendingQuery {
                question,
                client_id: header_id,
                rd,
                cd,
                edns,
                transport: Transport::Udp { peer },
                submitted_at: Instant::now(),
            };
            match pending.insert(pq) {
                Ok(id) => {
                    debug!(query_id = id, transport = "udp", client = %peer, qname, "query forwarded to resolver");
                    if resolver_out_tx.send((ResolverOutbound::Query { id }, buf)).await.is_err() {
                        pending.remove(id);
                        warn!("resolver channel closed, dropping query");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "pending table full, refusing query");
                    let reply = wire::encode_error(None, header_id, rd, Rcode::ServFail);
                    let _ = udp.send(&reply, peer).await;
                }
            }
        }
    }
}

async fn handle_tcp_connection(
    mut conn: TcpConnection,
    conn_id: u64,
    blocklist: Arc<Blocklist>,
    pending: Arc<PendingTable>,
    resolver_out_tx: mpsc::Sender<(ResolverOutbound, Vec<u8>)>,
    mut reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let peer = conn.peer();
    loop {
        tokio::select! {
            read = conn.read_query() => {
                match read {
                    Ok(Some(buf)) => match guard::check_query(&buf, &blocklist) {
                        CheckOutcome::Drop => debug!(%peer, "dropping malformed tcp query"),
                        CheckOutcome::Respond(reply) => {
                            if let Err(e) = conn.write_reply(&reply).await {
                                warn!(%peer, error = %e, "tcp write failed");
                                break;
                            }
                        }
                        CheckOutcome::Forward { question, header_id, rd, cd, edns } => {
                            let qname = question.qname.to_string();
                            let pq = PendingQuery {
                                question,
                                client_id: header_id,
                                rd,
                                cd,
                                edns,
                                transport: Transport::Tcp { conn_id },
                                submitted_at: Instant::now(),
                            };
                            match pending.insert(pq) {
                                Ok(id) => {
                                    debug!(query_id = id, transport = "tcp", client = %peer, qname, "query forwarded to resolver");
                                    if resolver_out_tx.send((ResolverOutbound::Query { id }, buf)).await.is_err() {
                                        pending.remove(id);
                                        break;
                                    }
                                }
                                Err(_) => {
                                    let reply = wire::encode_error(None, header_id, rd, Rcode::ServFail);
                                    if conn.write_reply(&reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    },
                    Ok(None) => break,
                    Err(FrontendError::TcpTimeout) => {
                        debug!(%peer, "tcp connection idle timeout");
                        break;
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "tcp read failed");
                        break;
                    }
                }
            }
            Some(reply) = reply_rx.recv() => {
                if let Err(e) = conn.write_reply(&reply).await {
                    warn!(%peer, error = %e, "tcp write failed");
                    break;
                }
            }
        }
    }
    pending.remove_for_connection(conn_id);
}

async fn handle_resolver_message(
    message: ResolverInbound,
    payload: Vec<u8>,
    pending: &PendingTable,
    udp: &UdpSession,
    tcp_reply_channels: &TcpReplyChannels,
    taset: &mut TrustAnchorStore,
    metrics: &FrontendMetrics,
    resolver_out_tx: &mpsc::Sender<(ResolverOutbound, Vec<u8>)>,
) {
    match message {
        ResolverInbound::Answer { id, bogus, srvfail } => {
            metrics.resolver_answers_total.inc();
            let Some(query) = pending.remove(id) else {
                debug!(id, "answer for unknown or already-completed query");
                return;
            };

            let (transport_label, max_size) = match query.transport {
                Transport::Udp { .. } => ("udp", query.edns.udp_budget() as usize),
                Transport::Tcp { .. } => ("tcp", wire::TCP_MAX_SIZE),
            };
            debug!(query_id = id, transport = transport_label, qname = %query.question.qname, bogus, srvfail, "resolver answer received");

            // §4.5: a bogus answer is only forced to SERVFAIL when the
            // client didn't set CD=1 asking to see it as-is.
            let force_servfail = (bogus && !query.cd) || srvfail;
            let reply = if force_servfail {
                wire::encode_error(Some(&query.question), query.client_id, query.rd, Rcode::ServFail)
            } else {
                match wire::parse_reply(&payload) {
                    Ok(resolver_reply) => {
                        let ctx = wire::ReplyContext {
                            qname: &query.question.qname,
                            qtype: query.question.qtype,
                            qclass: query.question.qclass,
                            client_id: query.client_id,
                            client_rd: query.rd,
                            client_edns: query.edns,
                            max_size,
                        };
                        wire::encode_reply(&ctx, &resolver_reply)
                    }
                    Err(e) => {
                        warn!(error = %e, "resolver answer failed to parse, answering SERVFAIL");
                        wire::encode_error(Some(&query.question), query.client_id, query.rd, Rcode::ServFail)
                    }
                }
            };

            if let Ok(header) = DnsHeader::read(&reply) {
                if header.tc {
                    metrics.truncated_responses_total.inc();
                }
            }

            deliver_reply(udp, tcp_reply_channels, &query.transport, &reply).await;
        }
        ResolverInbound::NewTrustAnchor { anchor } => {
            if !taset.is_staging() {
                taset.begin_staging();
            }
            debug!(%anchor, "resolver staging trust anchor");
            taset.stage(anchor);
        }
        ResolverInbound::NewTrustAnchorsDone => {
            let (added, removed) = taset.diff_and_swap();
            if !added.is_empty() || !removed.is_empty() {
                info!(added = added.len(), removed = removed.len(), "trust anchor set updated by resolver");
            }
            if let Err(e) = taset.persist().await {
                error!(error = %e, "failed to persist trust anchors");
            }
            // Loopback: echo the committed set back in sorted order so the
            // resolver's and front-end's views converge even if some of its
            // own anchors were dropped by the diff.
            for anchor in taset.current().iter() {
                let _ = resolver_out_tx
                    .send((ResolverOutbound::NewTrustAnchor { anchor: anchor.to_string() }, Vec::new()))
                    .await;
            }
            let _ = resolver_out_tx.send((ResolverOutbound::NewTrustAnchorsDone, Vec::new())).await;
        }
        ResolverInbound::NewTrustAnchorsAbort => {
            taset.abort_staging();
        }
        ResolverInbound::CtlStatus { message } => {
            info!(resolver_status = %message, "resolver status report");
        }
    }
}

async fn handle_main_event(
    event: MainEvent,
    blocklist: &Blocklist,
    taset: &mut TrustAnchorStore,
    resolver_out_tx: &mpsc::Sender<(ResolverOutbound, Vec<u8>)>,
) {
    match event {
        MainEvent::NewUdpListener(_) | MainEvent::NewTcpListener(_) => {
            warn!("parent offered a replacement listener after startup; hot-swap is not supported, ignoring");
        }
        MainEvent::ReconfCommitted(staged) => {
            if let Some(names) = staged.blocklist {
                blocklist.reload(names);
            }
            if let Some(anchors) = staged.trust_anchors {
                taset.begin_staging();
                for anchor in &anchors {
                    taset.stage(anchor.clone());
                }
                let (added, removed) = taset.diff_and_swap();
                if !added.is_empty() || !removed.is_empty() {
                    info!(added = added.len(), removed = removed.len(), "trust anchor set reconfigured");
                    if let Err(e) = taset.persist().await {
                        error!(error = %e, "failed to persist trust anchors");
                    }
                    for anchor in added {
                        let _ = resolver_out_tx
                            .send((ResolverOutbound::NewTrustAnchor { anchor }, Vec::new()))
                            .await;
                    }
                    let _ = resolver_out_tx.send((ResolverOutbound::NewTrustAnchorsDone, Vec::new())).await;
                }
            }
            if let Some(forwarders) = staged.forwarders {
                let _ = resolver_out_tx
                    .send((ResolverOutbound::ReplaceForwarders { forwarders }, Vec::new()))
                    .await;
            }
        }
        MainEvent::NetworkChanged => {
            let _ = resolver_out_tx.send((ResolverOutbound::NetworkChanged, Vec::new())).await;
        }
    }
}

async fn run_resolver_actor(
    mut channel: ResolverChannel,
    mut outbound_rx: mpsc::Receiver<(ResolverOutbound, Vec<u8>)>,
    inbound_tx: mpsc::Sender<(ResolverInbound, Vec<u8>)>,
) {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some((ResolverOutbound::Query { id }, payload)) => {
                        if let Err(e) = channel.send_query(id, &payload).await {
                            error!(error = %e, "failed to send query to resolver");
                            break;
                        }
                    }
                    Some((message, _)) => {
                        if let Err(e) = channel.send(&message).await {
                            error!(error = %e, "failed to send message to resolver");
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = channel.recv() => {
                match inbound {
                    Ok((message, payload)) => {
                        if inbound_tx.send((message, payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "resolver channel closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn run_main_actor(mut channel: MainChannel, event_tx: mpsc::Sender<MainEvent>) {
    loop {
        match channel.next_event().await {
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "main channel closed");
                break;
            }
        }
    }
}

async fn deliver_reply(
    udp: &UdpSession,
    tcp_reply_channels: &TcpReplyChannels,
    transport: &Transport,
    reply: &[u8],
) {
    match transport {
        Transport::Udp { peer } => {
            if let Err(e) = udp.send(reply, *peer).await {
                warn!(error = %e, "udp send failed");
            }
        }
        Transport::Tcp { conn_id } => {
            if let Some(tx) = tcp_reply_channels.get(conn_id) {
                let _ = tx.send(reply.to_vec());
            }
        }
    }
}

fn record_guard_rejection(metrics: &FrontendMetrics, reply: &[u8]) {
    if let Ok(header) = DnsHeader::read(reply) {
        metrics
            .guard_rejections
            .with_label_values(&[&header.rcode.to_string()])
            .inc();
    }
}
