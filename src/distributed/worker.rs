//! Distributed worker
//!
//! A worker attaches to a master, pulls items until the queue reports empty,
//! evaluates each one locally and sends back `coefficient × count`. The
//! evaluator runs on tokio's blocking pool so a long external count never
//! stalls the connection's runtime thread.

use crate::distributed::protocol::*;
use crate::error::KroneckerError;
use crate::evaluator::Evaluator;
use crate::weight::build_partition_matrix;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// How long a failing worker waits for the master to close the connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where to find the master
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub host: String,
    pub port: u16,
    pub authkey: String,
}

/// What a worker (or a pool of workers) got done
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub node_id: String,
    pub items_completed: usize,
}

/// Distributed worker
pub struct DistributedWorker {
    config: WorkerConfig,
    evaluator: Arc<dyn Evaluator>,
    node_id: String,
}

impl DistributedWorker {
    pub fn new(config: WorkerConfig, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            config,
            evaluator,
            node_id: get_node_id(),
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Attach to the master and process items until none are left
    pub async fn run(&self) -> Result<WorkerSummary> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Failed to connect to master at {}", addr))?;

        let welcome = self.attach(&mut stream).await?;
        info!(
            "[{}] attached to {} ({} item(s), evaluator {})",
            self.node_id,
            addr,
            welcome.total,
            self.evaluator.name()
        );

        let matrix = Arc::new(build_partition_matrix(&welcome.dims)?);
        let mut items_completed = 0;

        loop {
            write_message(&mut stream, &Message::Pull).await?;
            let item = match read_message(&mut stream).await {
                Ok(Message::Work(item)) => item,
                Ok(Message::QueueEmpty) => break,
                Ok(other) => {
                    return Err(KroneckerError::Protocol(format!("expected WORK, got {}", other.kind())).into());
                }
                Err(e) if e.is::<ConnectionClosed>() => {
                    // a finished master closes idle connections
                    debug!("[{}] master closed the connection", self.node_id);
                    break;
                }
                Err(e) => return Err(e.context("Failed to read WORK")),
            };

            info!(
                "({:3}/{:3}) [{}] computing multiplicity of {} (coefficient {})",
                item.index, item.total, self.node_id, item.weight, item.coefficient
            );

            let index = item.index;
            let outcome = {
                let matrix = Arc::clone(&matrix);
                let evaluator = Arc::clone(&self.evaluator);
                tokio::task::spawn_blocking(move || item.evaluate(&matrix, evaluator.as_ref()))
                    .await
                    .context("Evaluation task panicked")?
            };

            let value = match outcome {
                Ok(value) => value,
                Err(e) => {
                    warn!("[{}] evaluating item {} failed: {}", self.node_id, index, e);
                    self.give_up(&mut stream, &e.to_string()).await;
                    return Err(KroneckerError::from(e).into());
                }
            };

            write_message(&mut stream, &Message::Result(ResultMessage { index, value })).await?;
            match read_message(&mut stream).await? {
                Message::ResultAck => items_completed += 1,
                other => {
                    return Err(KroneckerError::Protocol(format!("expected RESULT_ACK, got {}", other.kind())).into());
                }
            }
        }

        info!("[{}] queue empty, {} item(s) completed", self.node_id, items_completed);
        Ok(WorkerSummary {
            node_id: self.node_id.clone(),
            items_completed,
        })
    }

    /// Answer the master's challenge
    async fn attach(&self, stream: &mut TcpStream) -> Result<WelcomeMessage> {
        let challenge = match read_message(stream).await.context("Failed to read CHALLENGE")? {
            Message::Challenge(challenge) => challenge,
            other => {
                return Err(KroneckerError::Protocol(format!("expected CHALLENGE, got {}", other.kind())).into());
            }
        };

        if challenge.protocol_version != PROTOCOL_VERSION {
            return Err(KroneckerError::Protocol(format!(
                "Protocol version mismatch: master={}, worker={}",
                challenge.protocol_version, PROTOCOL_VERSION
            ))
            .into());
        }

        let auth = AuthenticateMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: self.node_id.clone(),
            digest: compute_digest(self.config.authkey.as_bytes(), &challenge.nonce),
        };
        write_message(stream, &Message::Authenticate(auth)).await?;

        match read_message(stream).await.context("Failed to read WELCOME")? {
            Message::Welcome(welcome) => Ok(welcome),
            Message::Error(err) => Err(KroneckerError::Authentication(err.error).into()),
            other => Err(KroneckerError::Protocol(format!("expected WELCOME, got {}", other.kind())).into()),
        }
    }

    /// Tell the master this worker is quitting and wait for it to hang up,
    /// by which time the worker's leases are back in the queue
    async fn give_up(&self, stream: &mut TcpStream, error: &str) {
        let msg = Message::Error(ErrorMessage {
            node_id: self.node_id.clone(),
            error: error.to_string(),
        });
        if write_message(stream, &msg).await.is_ok() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, read_message(stream)).await;
        }
    }
}

/// Run one worker per evaluator against the same master
///
/// Node ids get a `-<n>` suffix. Fails with the first worker error after all
/// workers have stopped.
pub async fn run_pool(config: WorkerConfig, evaluators: Vec<Arc<dyn Evaluator>>) -> Result<WorkerSummary> {
    if evaluators.is_empty() {
        anyhow::bail!("Worker pool needs at least one evaluator");
    }

    let base_id = get_node_id();
    info!("starting {} worker(s) as {}", evaluators.len(), base_id);

    let handles: Vec<_> = evaluators
        .into_iter()
        .enumerate()
        .map(|(i, evaluator)| {
            let worker = DistributedWorker::new(config.clone(), evaluator).with_node_id(format!("{}-{}", base_id, i));
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    let mut items_completed = 0;
    let mut first_error = None;
    for handle in handles {
        match handle.await.context("Worker task panicked")? {
            Ok(summary) => items_completed += summary.items_completed,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(WorkerSummary {
            node_id: base_id,
            items_completed,
        }),
    }
}

/// Node identifier: hostname plus process id
fn get_node_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}-{}", host, std::process::id())
}
