//! Best-trial selection across independent trials.
//!
//! Every trial submits one error value. A coordinator gathers all of them,
//! picks the smallest and sends the winning rank back, so that exactly one
//! trial goes on to report its eigenpairs. The exchange is expressed through
//! the [`Collective`] trait; [`LocalGroup`] implements it for threads of one
//! process and [`crate::process`] implements it for child processes.

use crate::Real;
use std::{
    io,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};
use thiserror::Error;

/// Default bound on every collective wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Failures of the gather/broadcast exchange. All of them are fatal for the run.
#[derive(Error, Debug)]
pub enum CollectiveError {
    #[error("Timed out after {timeout:?} while waiting for {pending} trial(s).")]
    Timeout { pending: usize, timeout: Duration },
    #[error("Trial {rank} left the collective before it completed.")]
    PeerLost { rank: usize },
    #[error("Trial {rank} exited with {status}.")]
    WorkerFailed {
        rank: usize,
        status: std::process::ExitStatus,
    },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("No trial errors were gathered.")]
    Empty,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// The two-step exchange between trials and the coordinator.
///
/// Both calls are collective: every member of the group must make them, in
/// this order. [`select_winner`] is the only intended caller.
pub trait Collective {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Submits this trial's error. The coordinator receives every error,
    /// indexed by rank; the other members receive `None`.
    fn gather_errors(&mut self, error: Real) -> Result<Option<Vec<Real>>, CollectiveError>;

    /// Distributes the winning rank. The coordinator passes `Some(winner)`,
    /// the other members pass `None`; everyone gets the winner back.
    fn broadcast_winner(&mut self, winner: Option<usize>) -> Result<usize, CollectiveError>;
}

/// The outcome of [`select_winner`] on one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub winner: usize,
    pub is_winner: bool,
    /// All gathered errors, present on the coordinator only.
    pub errors: Option<Vec<Real>>,
}

/// Returns the rank of the smallest error.
///
/// The scan keeps the first strict minimum, so ties go to the lowest rank.
/// NaN loses against any number. Returns `None` for an empty slice.
pub fn argmin_rank(errors: &[Real]) -> Option<usize> {
    let mut best: Option<(usize, Real)> = None;
    for (rank, &error) in errors.iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, current)) => error < current || (current.is_nan() && !error.is_nan()),
        };
        if better {
            best = Some((rank, error));
        }
    }
    best.map(|(rank, _)| rank)
}

/// Runs the gather/argmin/broadcast sequence for one member of the group.
pub fn select_winner<C>(comm: &mut C, error: Real) -> Result<Selection, CollectiveError>
where
    C: Collective + ?Sized,
{
    let errors = comm.gather_errors(error)?;
    let proposal = match &errors {
        Some(errors) => Some(argmin_rank(errors).ok_or(CollectiveError::Empty)?),
        None => None,
    };
    if let (Some(errors), Some(winner)) = (&errors, proposal) {
        log::info!(
            "Selected trial {winner} with error {:e} out of {} trials.",
            errors[winner],
            errors.len()
        );
    }

    let winner = comm.broadcast_winner(proposal)?;
    if winner >= comm.size() {
        return Err(CollectiveError::Protocol(format!(
            "winner {winner} is out of range for a group of {}.",
            comm.size()
        )));
    }

    Ok(Selection {
        winner,
        is_winner: winner == comm.rank(),
        errors,
    })
}

enum Role {
    Coordinator {
        reports: Receiver<(usize, Real)>,
        verdicts: Vec<Sender<usize>>,
    },
    Member {
        reports: Sender<(usize, Real)>,
        verdict: Receiver<usize>,
    },
}

/// One member of a [`LocalGroup`]. Move it into the thread that runs the trial.
pub struct LocalEndpoint {
    rank: usize,
    size: usize,
    timeout: Duration,
    role: Role,
}

/// In-process group of trials connected by channels. Rank 0 coordinates.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates the `size` endpoints of a new group, ordered by rank.
    pub fn new(size: usize, timeout: Duration) -> Vec<LocalEndpoint> {
        if size == 0 {
            return Vec::new();
        }
        let (report_tx, report_rx) = mpsc::channel();
        let (verdict_txs, verdict_rxs): (Vec<_>, Vec<_>) =
            (1..size).map(|_| mpsc::channel()).unzip();

        let mut endpoints = Vec::with_capacity(size);
        endpoints.push(LocalEndpoint {
            rank: 0,
            size,
            timeout,
            role: Role::Coordinator {
                reports: report_rx,
                verdicts: verdict_txs,
            },
        });
        for (offset, verdict) in verdict_rxs.into_iter().enumerate() {
            endpoints.push(LocalEndpoint {
                rank: offset + 1,
                size,
                timeout,
                role: Role::Member {
                    reports: report_tx.clone(),
                    verdict,
                },
            });
        }
        endpoints
    }
}

impl Collective for LocalEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn gather_errors(&mut self, error: Real) -> Result<Option<Vec<Real>>, CollectiveError> {
        match &self.role {
            Role::Member { reports, .. } => {
                reports
                    .send((self.rank, error))
                    .map_err(|_| CollectiveError::PeerLost { rank: 0 })?;
                Ok(None)
            }
            Role::Coordinator { reports, .. } => {
                let mut errors = vec![Real::NAN; self.size];
                let mut received = vec![false; self.size];
                errors[0] = error;
                received[0] = true;

                let deadline = Instant::now() + self.timeout;
                let mut pending = self.size - 1;
                while pending > 0 {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match reports.recv_timeout(remaining) {
                        Ok((rank, value)) => {
                            if rank >= self.size || received[rank] {
                                return Err(CollectiveError::Protocol(format!(
                                    "unexpected report from trial {rank}."
                                )));
                            }
                            log::debug!("Received error {value:e} from trial {rank}.");
                            errors[rank] = value;
                            received[rank] = true;
                            pending -= 1;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(CollectiveError::Timeout {
                                pending,
                                timeout: self.timeout,
                            });
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            let rank = received.iter().position(|&r| !r).unwrap_or(0);
                            return Err(CollectiveError::PeerLost { rank });
                        }
                    }
                }
                Ok(Some(errors))
            }
        }
    }

    fn broadcast_winner(&mut self, winner: Option<usize>) -> Result<usize, CollectiveError> {
        match &self.role {
            Role::Coordinator { verdicts, .. } => {
                let winner = winner.ok_or_else(|| {
                    CollectiveError::Protocol("the coordinator must name a winner.".to_string())
                })?;
                for (offset, verdict) in verdicts.iter().enumerate() {
                    verdict
                        .send(winner)
                        .map_err(|_| CollectiveError::PeerLost { rank: offset + 1 })?;
                }
                Ok(winner)
            }
            Role::Member { verdict, .. } => match verdict.recv_timeout(self.timeout) {
                Ok(winner) => Ok(winner),
                Err(RecvTimeoutError::Timeout) => Err(CollectiveError::Timeout {
                    pending: 1,
                    timeout: self.timeout,
                }),
                Err(RecvTimeoutError::Disconnected) => Err(CollectiveError::PeerLost { rank: 0 }),
            },
        }
    }
}
