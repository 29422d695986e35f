//! Per-transfer state machine
//!
//! A [`TransferSession`] performs no I/O on the network and keeps no timers.
//! The driver feeds it [`Event`]s (a packet arrived, the retransmission timer
//! fired) and carries out the returned [`Step`]: the packet to send, if any,
//! and whether the transfer is still running.
//!
//! ```text
//!            start()
//!   Idle ─────────────▶ Active(Sender | Receiver) ──▶ Complete
//!                                │
//!                                └──────────────────▶ Failed
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::error::TransferError;
use super::packet::{BLOCK_SIZE, Packet};
use super::storage::{Sink, Source};

/// Which half of the exchange a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends Data, consumes Ack
    Sender,
    /// Sends Ack, consumes Data
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Active(Role),
    Complete,
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Complete | State::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Active(role) => write!(f, "Active({:?})", role),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Input to the state machine
#[derive(Debug)]
pub enum Event {
    Packet(Packet),
    /// The retransmission timer expired without a reply
    Timeout,
}

/// Result of applying one event
#[derive(Debug)]
pub enum Outcome {
    /// The transfer continues
    Pending,
    Complete,
    Failed(TransferError),
}

/// What the driver must do after an event
#[derive(Debug)]
#[must_use]
pub struct Step {
    /// Packet to transmit to the peer
    pub reply: Option<Packet>,
    pub outcome: Outcome,
}

impl Step {
    fn pending(reply: Option<Packet>) -> Self {
        Self {
            reply,
            outcome: Outcome::Pending,
        }
    }

    fn complete(reply: Option<Packet>) -> Self {
        Self {
            reply,
            outcome: Outcome::Complete,
        }
    }
}

/// Totals of a finished transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes: u64,
    pub blocks: u64,
    pub elapsed: Duration,
}

enum Handle {
    Source(Source),
    Sink(Sink),
}

/// State of one file transfer
pub struct TransferSession {
    role: Role,
    peer: SocketAddr,
    state: State,
    /// Block in flight (sender) or last acknowledged (receiver)
    block_num: u16,
    /// Last Data payload sent, kept until its Ack arrives
    pending: Option<Vec<u8>>,
    is_final: bool,
    /// Send an Ack for block 0 on start (session opened by a WRQ)
    acknowledge_request: bool,
    handle: Option<Handle>,
    max_retries: u32,
    retries_remaining: u32,
    last_activity: Instant,
    started: Instant,
    bytes: u64,
    blocks: u64,
}

impl TransferSession {
    /// Session transmitting the contents of `source` to `peer`
    pub fn sender(peer: SocketAddr, source: Source, retries: u32) -> Self {
        Self::new(Role::Sender, peer, Handle::Source(source), retries, false)
    }

    /// Session writing Data from `peer` into `sink`.
    ///
    /// With `acknowledge_request` the session opens with Ack 0, as a server
    /// answering a write request does.
    pub fn receiver(peer: SocketAddr, sink: Sink, retries: u32, acknowledge_request: bool) -> Self {
        Self::new(
            Role::Receiver,
            peer,
            Handle::Sink(sink),
            retries,
            acknowledge_request,
        )
    }

    fn new(
        role: Role,
        peer: SocketAddr,
        handle: Handle,
        retries: u32,
        acknowledge_request: bool,
    ) -> Self {
        let now = Instant::now();
        Self {
            role,
            peer,
            state: State::Idle,
            block_num: 0,
            pending: None,
            is_final: false,
            acknowledge_request,
            handle: Some(handle),
            max_retries: retries,
            retries_remaining: retries,
            last_activity: now,
            started: now,
            bytes: 0,
            blocks: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn block_num(&self) -> u16 {
        self.block_num
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Payload awaiting acknowledgement
    pub fn pending(&self) -> Option<&[u8]> {
        self.pending.as_deref()
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    /// Time since the last packet from the peer (or since creation)
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            bytes: self.bytes,
            blocks: self.blocks,
            elapsed: self.started.elapsed(),
        }
    }

    /// Leave `Idle` and produce the opening packet
    pub fn start(&mut self) -> Step {
        if self.state != State::Idle {
            return self.settled();
        }
        self.state = State::Active(self.role);
        self.last_activity = Instant::now();

        match self.role {
            Role::Sender => match self.load_next_block(1) {
                Ok(packet) => Step::pending(Some(packet)),
                Err(e) => self.fail(e),
            },
            Role::Receiver if self.acknowledge_request => Step::pending(Some(Packet::Ack(0))),
            Role::Receiver => Step::pending(None),
        }
    }

    /// Apply one event.
    ///
    /// Events before [`start`](Self::start) are ignored; after the session
    /// ends they are ignored and the step repeats the final outcome.
    pub fn handle(&mut self, event: Event) -> Step {
        let role = match self.state {
            State::Active(role) => role,
            State::Idle | State::Complete | State::Failed => return self.settled(),
        };

        if let Event::Packet(_) = event {
            self.last_activity = Instant::now();
        }

        let result = match (role, event) {
            (_, Event::Packet(Packet::Error { code, msg })) => {
                Err(TransferError::from_peer(code, &msg))
            }
            (Role::Sender, Event::Packet(Packet::Ack(block_num))) => self.on_ack(block_num),
            (Role::Sender, Event::Timeout) => self.on_timeout(),
            (Role::Receiver, Event::Packet(Packet::Data { block_num, data })) => {
                self.on_data(block_num, data)
            }
            (Role::Receiver, Event::Timeout) => self.on_receiver_timeout(),
            (Role::Sender, Event::Packet(other)) => Err(TransferError::UnexpectedPacket {
                expected: "ACK",
                received: other.name(),
            }),
            (Role::Receiver, Event::Packet(other)) => Err(TransferError::UnexpectedPacket {
                expected: "DATA",
                received: other.name(),
            }),
        };

        result.unwrap_or_else(|e| self.fail(e))
    }

    /// Fail the session from outside (idle deadline, socket failure, caller abort)
    pub fn abort(&mut self, error: TransferError) -> Step {
        if self.state.is_terminal() {
            return self.settled();
        }
        self.fail(error)
    }

    /// Step that reports the current state and sends nothing
    fn settled(&self) -> Step {
        match self.state {
            State::Complete => Step::complete(None),
            State::Failed => Step {
                reply: None,
                outcome: Outcome::Failed(TransferError::Closed),
            },
            State::Idle | State::Active(_) => Step::pending(None),
        }
    }

    fn on_ack(&mut self, block_num: u16) -> Result<Step, TransferError> {
        if block_num != self.block_num || self.pending.is_none() {
            log::debug!(
                "{}: ignoring ACK {} while block {} is in flight",
                self.peer,
                block_num,
                self.block_num
            );
            return Ok(Step::pending(None));
        }

        if let Some(data) = self.pending.take() {
            self.bytes += data.len() as u64;
            self.blocks += 1;
        }

        if self.is_final {
            self.finish();
            return Ok(Step::complete(None));
        }

        self.retries_remaining = self.max_retries;
        let next = self.block_num.wrapping_add(1);
        self.load_next_block(next).map(|packet| Step::pending(Some(packet)))
    }

    fn on_timeout(&mut self) -> Result<Step, TransferError> {
        let Some(data) = self.pending.as_ref() else {
            return Ok(Step::pending(None));
        };
        if self.retries_remaining == 0 {
            return Err(TransferError::Timeout {
                retries: self.max_retries,
            });
        }
        self.retries_remaining -= 1;
        log::debug!(
            "{}: retransmitting block {} ({} retries left)",
            self.peer,
            self.block_num,
            self.retries_remaining
        );
        Ok(Step::pending(Some(Packet::Data {
            block_num: self.block_num,
            data: data.clone(),
        })))
    }

    /// Receivers are reactive once data flows; only the go-ahead ACK 0 is
    /// retransmitted, since no duplicate DATA can prompt it
    fn on_receiver_timeout(&mut self) -> Result<Step, TransferError> {
        if !self.acknowledge_request || self.blocks > 0 {
            return Ok(Step::pending(None));
        }
        if self.retries_remaining == 0 {
            return Err(TransferError::Timeout {
                retries: self.max_retries,
            });
        }
        self.retries_remaining -= 1;
        Ok(Step::pending(Some(Packet::Ack(0))))
    }

    fn on_data(&mut self, block_num: u16, data: Vec<u8>) -> Result<Step, TransferError> {
        if data.len() > BLOCK_SIZE {
            return Err(TransferError::OversizedData(data.len()));
        }

        let expected = self.block_num.wrapping_add(1);
        if block_num != expected {
            log::debug!(
                "{}: duplicate DATA {}, expected {}; re-sending ACK {}",
                self.peer,
                block_num,
                expected,
                self.block_num
            );
            return Ok(Step::pending(Some(Packet::Ack(self.block_num))));
        }

        let Some(Handle::Sink(sink)) = self.handle.as_mut() else {
            return Err(TransferError::Aborted);
        };
        sink.write_all(&data).map_err(TransferError::Io)?;

        self.block_num = block_num;
        self.bytes += data.len() as u64;
        self.blocks += 1;
        self.is_final = data.len() < BLOCK_SIZE;

        let ack = Packet::Ack(block_num);
        if self.is_final {
            sink.flush().map_err(TransferError::Io)?;
            self.finish();
            return Ok(Step::complete(Some(ack)));
        }
        Ok(Step::pending(Some(ack)))
    }

    /// Read the next block from the source and make it the one in flight
    fn load_next_block(&mut self, block_num: u16) -> Result<Packet, TransferError> {
        let Some(Handle::Source(source)) = self.handle.as_mut() else {
            return Err(TransferError::Aborted);
        };

        let data = read_block(source).map_err(TransferError::Io)?;
        self.block_num = block_num;
        self.is_final = data.len() < BLOCK_SIZE;
        self.pending = Some(data.clone());

        Ok(Packet::Data { block_num, data })
    }

    fn finish(&mut self) {
        self.state = State::Complete;
        self.pending = None;
        self.handle = None;
    }

    fn fail(&mut self, error: TransferError) -> Step {
        log::debug!("{}: transfer failed in {}: {}", self.peer, self.state, error);
        self.state = State::Failed;
        self.pending = None;
        self.handle = None;
        Step {
            reply: error.error_packet(),
            outcome: Outcome::Failed(error),
        }
    }
}

/// Read up to one block, short only at end of stream
fn read_block(source: &mut Source) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(BLOCK_SIZE);
    source.take(BLOCK_SIZE as u64).read_to_end(&mut data)?;
    Ok(data)
}
