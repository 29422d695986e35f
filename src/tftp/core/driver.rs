use std::time::Instant;

use super::error::TransferError;
use super::options::{Options, deadline_after};
use super::packet::Packet;
use super::socket::Socket;
use super::transfer::{Event, Outcome, Role, Step, TransferSession, TransferSummary};

/// Runs a [`TransferSession`] over a [`Socket`] until it completes or fails.
///
/// The driver is the only place that waits: it blocks on the next packet or
/// the retransmission deadline, whichever comes first, and turns the result
/// into an [`Event`]. The deadline is set when a packet goes out; packets
/// that draw no reply do not move it. Receiving sessions that hear nothing
/// for [`Options::idle_timeout`] are dropped here.
pub struct Driver<'a, S: Socket + ?Sized> {
    socket: &'a S,
    options: Options,
}

impl<'a, S: Socket + ?Sized> Driver<'a, S> {
    pub fn new(socket: &'a S, options: Options) -> Self {
        Self { socket, options }
    }

    /// Start `session` and drive it to a terminal state.
    ///
    /// `first` is a packet that already arrived before the session existed
    /// (the client's first Data block of a download).
    pub fn run(
        &self,
        session: &mut TransferSession,
        first: Option<Packet>,
    ) -> Result<TransferSummary, TransferError> {
        let mut deadline = deadline_after(self.options.timeout);
        let mut step = session.start();

        if let Some(packet) = first {
            if let Some(done) = self.apply(session, step, &mut deadline) {
                return done;
            }
            step = session.handle(Event::Packet(packet));
        }

        loop {
            if let Some(done) = self.apply(session, step, &mut deadline) {
                return done;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = if remaining.is_zero() {
                Ok(None)
            } else {
                self.socket.recv(remaining)
            };

            step = match received {
                Ok(Some(packet)) => session.handle(Event::Packet(packet)),
                Ok(None)
                    if session.role() == Role::Receiver
                        && session.idle_for() >= self.options.idle_timeout =>
                {
                    log::warn!(
                        "{}: no data for {:?}, dropping transfer",
                        session.peer(),
                        self.options.idle_timeout
                    );
                    session.abort(TransferError::Idle(self.options.idle_timeout))
                }
                Ok(None) => {
                    deadline = deadline_after(self.options.timeout);
                    session.handle(Event::Timeout)
                }
                Err(e) => session.abort(TransferError::Transport(e)),
            };
        }
    }

    /// Send the step's reply and report the result if the session is over.
    ///
    /// A reply that goes out restarts the retransmission deadline.
    fn apply(
        &self,
        session: &mut TransferSession,
        step: Step,
        deadline: &mut Instant,
    ) -> Option<Result<TransferSummary, TransferError>> {
        if let Some(reply) = step.reply {
            if let Err(e) = self.socket.send(&reply) {
                log::error!("{}: failed to send {}: {}", session.peer(), reply.name(), e);
                return Some(match step.outcome {
                    Outcome::Failed(error) => Err(error),
                    // everything is written; only the final ACK went missing
                    Outcome::Complete => Ok(session.summary()),
                    Outcome::Pending => match session.abort(TransferError::Transport(e)).outcome {
                        Outcome::Failed(error) => Err(error),
                        _ => Err(TransferError::Aborted),
                    },
                });
            }
            *deadline = deadline_after(self.options.timeout);
        }

        match step.outcome {
            Outcome::Pending => None,
            Outcome::Complete => Some(Ok(session.summary())),
            Outcome::Failed(error) => Some(Err(error)),
        }
    }
}
