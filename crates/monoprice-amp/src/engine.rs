//! Transaction engine.
//!
//! The amplifier's serial port is half-duplex and answers one command at a
//! time, echoing each command before replying. A single serializer task owns
//! the transport; callers submit requests over a bounded queue and await a
//! oneshot completion, so at most one exchange is ever on the wire.
//!
//! Each exchange:
//!
//! 1. write `{command}\r`
//! 2. read the echo, which must equal the command
//! 3. read the reply line: empty means resend, `Command Error.` is a
//!    rejection, `>{payload}` is a query's data
//!
//! Every attempt is bounded by the configured timeout. After an abandoned
//! exchange the serializer waits for the line to go quiet and discards what
//! arrives late, so it is never delivered to the next caller. Resending the
//! abandoned command waits out a full timeout of silence first, because its
//! late echo would otherwise be indistinguishable from the new one.

use std::time::Duration;

use monoprice_metrics::{metric_defs, TransactionLabels};
use monoprice_protocol::{
    Argument, Command, Direction, ProtocolError, Request, Response, State, ZoneId,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, debug_span, trace, warn, Instrument};

use crate::config::AmpConfig;
use crate::error::{AmpError, AmpResult};
use crate::transport::{LineTransport, SerialPortIO};

// ============================================================================
// Types
// ============================================================================

/// Value produced by a successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyValue {
    /// Decoded status record from a query.
    State(State),
    /// A set command was accepted.
    Ack,
}

/// Result of a completed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub value: ReplyValue,
    /// Time from the first write to the final line.
    pub elapsed: Duration,
    /// Number of times the command was written.
    pub attempts: u32,
}

impl Reply {
    /// The decoded state, if this was a query reply.
    pub fn state(&self) -> Option<&State> {
        match &self.value {
            ReplyValue::State(state) => Some(state),
            ReplyValue::Ack => None,
        }
    }
}

/// Work sent to the serializer.
enum Job {
    Transaction {
        request: Request,
        reply: oneshot::Sender<AmpResult<Reply>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the serializer task.
///
/// Cheap to clone; all clones feed the same queue.
#[derive(Debug, Clone)]
pub struct Engine {
    tx: mpsc::Sender<Job>,
}

impl Engine {
    /// Spawn the serializer on the current tokio runtime.
    ///
    /// The configuration is expected to be validated already.
    pub fn spawn<T: SerialPortIO + 'static>(io: T, config: &AmpConfig) -> Engine {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let serializer = Serializer {
            link: LineTransport::new(io),
            config: config.clone(),
            seq: 0,
            previous: None,
            abandoned: None,
        };
        tokio::spawn(serializer.run(rx));
        Engine { tx }
    }

    /// Run one transaction.
    ///
    /// Queries only support the full-state record ([`Command::State`]).
    /// Set arguments are validated before the request is queued.
    pub async fn execute(
        &self,
        direction: Direction,
        zone: ZoneId,
        command: Command,
        argument: Argument,
    ) -> AmpResult<Reply> {
        let request = match direction {
            Direction::Query => {
                if command != Command::State || argument != Argument::None {
                    return Err(ProtocolError::InvalidArgument {
                        command: command.mnemonic(),
                        reason: "only the full state record can be queried".to_string(),
                    }
                    .into());
                }
                Request::query(zone)
            }
            Direction::Set => Request::set(zone, command, argument)?,
        };
        self.submit(request).await
    }

    /// Queue an already built request and wait for its result.
    pub async fn submit(&self, request: Request) -> AmpResult<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job::Transaction {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| AmpError::EngineClosed)?;

        let waiting = self.tx.max_capacity() - self.tx.capacity();
        metrics::gauge!(metric_defs::QUEUE_DEPTH.name).set(waiting as f64);

        reply_rx.await.map_err(|_| AmpError::EngineClosed)?
    }

    /// Query the full state of `zone`.
    pub async fn query(&self, zone: ZoneId) -> AmpResult<State> {
        let reply = self.submit(Request::query(zone)).await?;
        match reply.value {
            ReplyValue::State(state) => Ok(state),
            ReplyValue::Ack => Err(AmpError::InvalidResponse {
                expected: "state record".to_string(),
                got: "acknowledgement".to_string(),
            }),
        }
    }

    /// Stop accepting work.
    ///
    /// Requests queued before the call still run; later ones, and every
    /// `execute` afterwards, fail with [`AmpError::EngineClosed`].
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Shutdown { done: done_tx }).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Whether the serializer has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// A command that was put on the wire.
#[derive(Debug, Clone)]
struct Exchange {
    seq: u64,
    command: String,
}

struct Serializer {
    link: LineTransport,
    config: AmpConfig,
    seq: u64,
    /// The most recent exchange, finished or not.
    previous: Option<Exchange>,
    /// Set while input from an abandoned exchange may still arrive.
    abandoned: Option<Exchange>,
}

impl Serializer {
    async fn run(mut self, mut rx: mpsc::Receiver<Job>) {
        while let Some(job) = rx.recv().await {
            match job {
                Job::Transaction { request, reply } => {
                    if reply.is_closed() {
                        debug!(zone = %request.zone, "caller went away, skipping request");
                        continue;
                    }

                    self.seq += 1;
                    let command = request.to_command_string();
                    let span = debug_span!("transaction", seq = self.seq, command = %command);
                    let result = self.transact(&request, &command).instrument(span).await;
                    record_outcome(&request, &result);
                    self.previous = Some(Exchange {
                        seq: self.seq,
                        command,
                    });

                    if reply.send(result).is_err() {
                        trace!(seq = self.seq, "caller went away, result discarded");
                    }
                }
                Job::Shutdown { done } => {
                    rx.close();
                    while let Some(job) = rx.recv().await {
                        match job {
                            Job::Transaction { reply, .. } => {
                                let _ = reply.send(Err(AmpError::EngineClosed));
                            }
                            Job::Shutdown { done } => {
                                let _ = done.send(());
                            }
                        }
                    }
                    debug!("engine shut down");
                    let _ = done.send(());
                    return;
                }
            }
        }
        debug!("all engine handles dropped, stopping");
    }

    /// Run one transaction, resending on empty replies.
    async fn transact(&mut self, request: &Request, command: &str) -> AmpResult<Reply> {
        self.discard_stale(command).await?;

        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            trace!(attempt, "sending");

            let deadline = Instant::now() + self.config.timeout;
            let result = self.attempt(request, command, deadline).await;

            match result {
                Ok(Some(value)) => {
                    return Ok(Reply {
                        value,
                        elapsed: started.elapsed(),
                        attempts: attempt,
                    });
                }
                Ok(None) if attempt >= self.config.retry_limit => {
                    warn!(attempts = attempt, "amplifier keeps answering with empty lines");
                    return Err(AmpError::RetriesExceeded { attempts: attempt });
                }
                Ok(None) => {
                    debug!(attempt, "empty reply, resending");
                    let labels =
                        TransactionLabels::new(request.direction.as_str(), request.zone.get());
                    metrics::counter!(metric_defs::RETRIES.name, &labels.to_labels()).increment(1);
                }
                Err(err) => {
                    if leaves_input_behind(&err) {
                        debug!(error = %err, "abandoning exchange");
                        self.abandoned = Some(Exchange {
                            seq: self.seq,
                            command: command.to_string(),
                        });
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One write/echo/reply cycle. `Ok(None)` asks for a resend.
    async fn attempt(
        &mut self,
        request: &Request,
        command: &str,
        deadline: Instant,
    ) -> AmpResult<Option<ReplyValue>> {
        timeout_at(deadline, self.link.write_command(command))
            .await
            .map_err(|_| AmpError::WriteTimeout)??;

        self.read_echo(command, deadline).await?;

        match request.direction {
            Direction::Query => self.read_data(request, command, deadline).await,
            Direction::Set => self.read_ack(command, deadline).await,
        }
    }

    async fn read_echo(&mut self, command: &str, deadline: Instant) -> AmpResult<()> {
        loop {
            let line = timeout_at(deadline, self.link.read_line())
                .await
                .map_err(|_| AmpError::ReadTimeout)??;

            if line == command {
                if let Some(abandoned) = self.abandoned.take() {
                    trace!(recovered_from = abandoned.seq, "link back in step");
                }
                return Ok(());
            }

            // Until our echo shows up, anything else belongs to the abandoned exchange.
            if let Some(abandoned) = &self.abandoned {
                debug!(from = abandoned.seq, line = %line, "discarding stale line");
                metrics::counter!(metric_defs::STALE_LINES.name).increment(1);
                continue;
            }

            return Err(AmpError::InvalidResponse {
                expected: command.to_string(),
                got: line,
            });
        }
    }

    async fn read_data(
        &mut self,
        request: &Request,
        command: &str,
        deadline: Instant,
    ) -> AmpResult<Option<ReplyValue>> {
        let line = match timeout_at(deadline, self.link.read_line()).await {
            Err(_) => return Err(AmpError::ReadTimeout),
            Ok(Err(AmpError::EndOfStream)) => return Err(AmpError::InvalidZone(request.zone)),
            Ok(result) => result?,
        };

        match Response::parse(&line) {
            Response::Empty => Ok(None),
            Response::CommandError => Err(AmpError::CommandError {
                command: command.to_string(),
            }),
            Response::Data(payload) => {
                let state = State::decode(&payload)?;
                if state.zone != request.zone {
                    return Err(AmpError::InvalidResponse {
                        expected: format!("state of zone {}", request.zone),
                        got: payload,
                    });
                }
                Ok(Some(ReplyValue::State(state)))
            }
            Response::Unknown(text) => {
                debug!(line = %text, "no data reply");
                Err(AmpError::InvalidZone(request.zone))
            }
        }
    }

    /// The echo already confirmed the set; give the amplifier a short window
    /// to reject it or ask for a resend.
    async fn read_ack(
        &mut self,
        command: &str,
        deadline: Instant,
    ) -> AmpResult<Option<ReplyValue>> {
        let window = deadline.min(Instant::now() + self.config.ack_window);

        match timeout_at(window, self.link.read_line()).await {
            Err(_) => Ok(Some(ReplyValue::Ack)),
            Ok(Err(err)) => Err(err),
            Ok(Ok(line)) => match Response::parse(&line) {
                Response::Empty => Ok(None),
                Response::CommandError => Err(AmpError::CommandError {
                    command: command.to_string(),
                }),
                Response::Data(_) | Response::Unknown(_) => Ok(Some(ReplyValue::Ack)),
            },
        }
    }

    /// Throw away input that arrived between transactions.
    async fn discard_stale(&mut self, command: &str) -> AmpResult<()> {
        let stale = match &self.abandoned {
            Some(abandoned) if abandoned.command == command => {
                let quiet = self.config.timeout.max(self.config.drain_quiet);
                self.link.drain_quiet(quiet).await?
            }
            Some(_) => self.link.drain_quiet(self.config.drain_quiet).await?,
            None => self.link.drain_ready().await?,
        };

        for line in stale {
            let from = self.previous.as_ref();
            if Response::parse(&line) == Response::CommandError {
                warn!(
                    from = from.map(|p| p.seq),
                    command = from.map(|p| p.command.as_str()),
                    "amplifier rejected a command after its reply window"
                );
            } else {
                debug!(from = from.map(|p| p.seq), line = %line, "discarding stale line");
            }
            metrics::counter!(metric_defs::STALE_LINES.name).increment(1);
        }
        Ok(())
    }
}

/// Errors after which the amplifier may still send lines for this exchange.
fn leaves_input_behind(err: &AmpError) -> bool {
    matches!(
        err,
        AmpError::ReadTimeout
            | AmpError::WriteTimeout
            | AmpError::InvalidResponse { .. }
            | AmpError::Protocol(ProtocolError::BufferOverflow { .. })
    )
}

fn record_outcome(request: &Request, result: &AmpResult<Reply>) {
    let labels = TransactionLabels::new(request.direction.as_str(), request.zone.get());
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };

    match result {
        Ok(reply) => {
            debug!(
                elapsed_ms = reply.elapsed.as_millis() as u64,
                attempts = reply.attempts,
                "transaction complete"
            );
            metrics::histogram!(metric_defs::ROUND_TRIP.name, &labels.to_labels())
                .record(reply.elapsed.as_secs_f64() * 1000.0);
        }
        Err(err) if err.is_timeout() => {
            warn!(zone = %request.zone, error = %err, "transaction timed out");
            metrics::counter!(metric_defs::TIMEOUTS.name, &labels.to_labels()).increment(1);
        }
        Err(err) => {
            debug!(zone = %request.zone, error = %err, "transaction failed");
        }
    }

    metrics::counter!(
        metric_defs::TRANSACTIONS.name,
        &labels.with_outcome(outcome).to_labels()
    )
    .increment(1);
}
