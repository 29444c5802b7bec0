//! Distributed master
//!
//! The master:
//! - Prepares the work plan (failing fast on bad partitions)
//! - Accepts worker connections and authenticates them
//! - Leases items to workers and records their results
//! - Re-queues the leases of workers that disconnect or time out
//! - Returns the summed coefficient once every item is done

use crate::coordinator::{accumulate, WorkPlan};
use crate::distributed::protocol::*;
use crate::distributed::queue::WorkQueue;
use crate::error::KroneckerError;
use crate::weight::Weight;
use anyhow::{Context, Result};
use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default port for the master's queue service
pub const DEFAULT_PORT: u16 = 12345;

/// Default deadline for a new connection to authenticate
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long finished masters wait for connected workers to hang up
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Master settings
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub port: u16,
    pub authkey: String,
    /// Re-queue leases held longer than this
    pub lease_timeout: Option<Duration>,
    /// Drop connections that have not authenticated within this
    pub handshake_timeout: Duration,
}

/// Outcome of a distributed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterReport {
    pub coefficient: BigInt,
    pub total_items: usize,
    /// Accepted results per worker node id
    pub per_node_completed: BTreeMap<String, usize>,
}

/// State shared by all connection tasks
struct Shared {
    queue: WorkQueue,
    authkey: Vec<u8>,
    dims: Vec<usize>,
    total: usize,
    handshake_timeout: Duration,
    completed: Mutex<BTreeMap<String, usize>>,
}

/// Distributed master
pub struct Master {
    config: MasterConfig,
    shared: Arc<Shared>,
}

impl Master {
    /// Prepare the work plan for `partitions` and queue every item
    pub fn new(partitions: &[Weight], config: MasterConfig) -> Result<Self, KroneckerError> {
        let plan = WorkPlan::prepare(partitions)?;

        let queue = WorkQueue::new();
        let total = plan.len();
        for item in plan.items {
            queue.put(item);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                queue,
                authkey: config.authkey.as_bytes().to_vec(),
                dims: plan.dims,
                total,
                handshake_timeout: config.handshake_timeout,
                completed: Mutex::new(BTreeMap::new()),
            }),
            config,
        })
    }

    pub fn total_items(&self) -> usize {
        self.shared.total
    }

    /// Listen on all interfaces and serve until every item is done
    pub async fn run(self) -> Result<MasterReport> {
        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind master to {}", addr))?;

        info!("master listening on port {}", self.config.port);
        self.serve(listener).await
    }

    /// Serve workers on `listener` until every item is done
    pub async fn serve(self, listener: TcpListener) -> Result<MasterReport> {
        let shared = self.shared;
        info!("waiting for workers to process {} item(s)", shared.total);

        let reaper = self.config.lease_timeout.map(|timeout| {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval((timeout / 2).max(Duration::from_millis(100)));
                loop {
                    interval.tick().await;
                    shared.queue.requeue_expired(timeout);
                }
            })
        });

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shared.queue.join() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("connection from {}", addr);
                        let shared = Arc::clone(&shared);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(&shared, stream, addr).await {
                                warn!("connection from {} failed: {:#}", addr, e);
                            }
                        });
                    }
                    Err(e) => accept_failed(&e).await,
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        if let Some(reaper) = reaper {
            reaper.abort();
        }

        // let connected workers receive QUEUE_EMPTY and hang up
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!("closing {} lingering connection(s)", connections.len());
            connections.abort_all();
        }

        let results = shared.queue.results().drain_all();
        let coefficient = accumulate(results);
        let per_node_completed = lock_completed(&shared).clone();

        info!("all {} item(s) done, coefficient {}", shared.total, coefficient);

        Ok(MasterReport {
            coefficient,
            total_items: shared.total,
            per_node_completed,
        })
    }
}

async fn accept_failed(e: &std::io::Error) {
    warn!("failed to accept connection: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

fn lock_completed(shared: &Shared) -> std::sync::MutexGuard<'_, BTreeMap<String, usize>> {
    shared.completed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Authenticate one worker, then serve its requests until it hangs up
async fn handle_connection(shared: &Shared, mut stream: TcpStream, addr: SocketAddr) -> Result<()> {
    let handshake = tokio::time::timeout(shared.handshake_timeout, authenticate(shared, &mut stream, addr)).await;
    let node_id = match handshake {
        Ok(authenticated) => match authenticated? {
            Some(node_id) => node_id,
            None => return Ok(()),
        },
        Err(_) => {
            warn!(
                "dropping connection from {}: no AUTHENTICATE within {:?}",
                addr, shared.handshake_timeout
            );
            return Ok(());
        }
    };
    info!("worker {} attached from {}", node_id, addr);

    // leases are per connection, a node may hold several
    let owner = format!("{}@{}", node_id, addr);
    let outcome = serve_worker(shared, &mut stream, &node_id, &owner).await;
    shared.queue.release(&owner);
    outcome
}

/// Run the challenge/response handshake
///
/// Returns the worker's node id, or `None` after rejecting it. Frames
/// from unauthenticated peers are capped at `MAX_HANDSHAKE_FRAME_BYTES`.
async fn authenticate(shared: &Shared, stream: &mut TcpStream, addr: SocketAddr) -> Result<Option<String>> {
    let nonce = generate_nonce();
    write_message(
        stream,
        &Message::Challenge(ChallengeMessage {
            protocol_version: PROTOCOL_VERSION,
            nonce: nonce.clone(),
        }),
    )
    .await?;

    let rejection = match read_message_limited(stream, MAX_HANDSHAKE_FRAME_BYTES)
        .await
        .context("Failed to read AUTHENTICATE")?
    {
        Message::Authenticate(auth) => {
            if auth.protocol_version != PROTOCOL_VERSION {
                format!(
                    "Protocol version mismatch: master={}, worker={}",
                    PROTOCOL_VERSION, auth.protocol_version
                )
            } else if !verify_digest(&shared.authkey, &nonce, &auth.digest) {
                format!("digest sent by {} does not match", auth.node_id)
            } else {
                write_message(
                    stream,
                    &Message::Welcome(WelcomeMessage {
                        dims: shared.dims.clone(),
                        total: shared.total,
                    }),
                )
                .await?;
                return Ok(Some(auth.node_id));
            }
        }
        other => format!("expected AUTHENTICATE, got {}", other.kind()),
    };

    warn!("rejected worker from {}: {}", addr, rejection);
    let reply = Message::Error(ErrorMessage {
        node_id: "master".to_string(),
        error: rejection,
    });
    // the worker may already be gone
    let _ = write_message(stream, &reply).await;
    Ok(None)
}

/// Answer PULL and RESULT requests until the worker disconnects
async fn serve_worker(shared: &Shared, stream: &mut TcpStream, node_id: &str, owner: &str) -> Result<()> {
    loop {
        let msg = match read_message(stream).await {
            Ok(msg) => msg,
            Err(e) => {
                debug!("worker {} disconnected: {:#}", owner, e);
                return Ok(());
            }
        };
        debug!("{} from {}", msg.kind(), owner);

        match msg {
            Message::Pull => {
                let reply = match shared.queue.try_pull(owner) {
                    Some(item) => Message::Work(item),
                    None => Message::QueueEmpty,
                };
                write_message(stream, &reply).await?;
            }
            Message::Result(result) => {
                if shared.queue.complete(result.index, result.value) {
                    *lock_completed(shared).entry(node_id.to_string()).or_insert(0) += 1;
                    let progress = shared.queue.progress();
                    info!(
                        "({:3}/{:3}) item {} done by {}",
                        progress.done, progress.total, result.index, node_id
                    );
                }
                write_message(stream, &Message::ResultAck).await?;
            }
            Message::Error(err) => {
                warn!("worker {} gave up: {}", err.node_id, err.error);
                return Ok(());
            }
            other => {
                return Err(KroneckerError::Protocol(format!("unexpected {} from {}", other.kind(), owner)).into());
            }
        }
    }
}
