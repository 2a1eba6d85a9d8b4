//! Child-process transport for the Trial Selector.
//!
//! The [`Launcher`] spawns `P` copies of an executable with the rank and group
//! size in the [`RANK_ENV_VAR`] and [`SIZE_ENV_VAR`] environment variables.
//! Each worker runs one trial and talks to the launcher over its standard
//! streams, one headerless CSV row per message:
//!
//! 1. the worker writes a [`TrialReport`] row (`rank,error`) on stdout;
//! 2. the launcher, once every report is in, writes a [`Verdict`] row
//!    (`winner`) on every worker's stdin and closes it;
//! 3. the winner prints its result on stdout, which the launcher forwards.
//!
//! The launcher is the coordinator. It bounds every wait with a deadline and
//! kills the whole group as soon as one worker times out, exits early or sends
//! a garbled report. Diagnostics travel on the inherited stderr.

use crate::{
    Real,
    selection::{Collective, CollectiveError, argmin_rank},
};
use serde::{Deserialize, Serialize};
use std::{
    ffi::{OsStr, OsString},
    io::{self, BufRead, BufReader, Read, Write},
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

/// Environment variable carrying the worker's rank. Its presence selects
/// worker mode.
pub const RANK_ENV_VAR: &str = "SIMULTITE_RANK";
/// Environment variable carrying the number of workers.
pub const SIZE_ENV_VAR: &str = "SIMULTITE_SIZE";

/// The message a worker submits to the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub rank: usize,
    pub error: Real,
}

/// The message the launcher sends back to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: usize,
}

/// Parses one headerless CSV row.
pub fn parse_row<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, CollectiveError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    match rdr.deserialize::<T>().next() {
        Some(record) => Ok(record?),
        None => Err(CollectiveError::Protocol(format!("empty message '{line}'."))),
    }
}

/// Writes one headerless CSV row and flushes it.
pub fn write_row<W: Write, T: Serialize>(output: W, row: &T) -> Result<(), CollectiveError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Reads the worker identity `(rank, size)` from the environment.
///
/// Returns `None` when [`RANK_ENV_VAR`] is not set, i.e. when the process was
/// not started by a [`Launcher`].
pub fn worker_identity() -> Result<Option<(usize, usize)>, CollectiveError> {
    let Ok(rank) = std::env::var(RANK_ENV_VAR) else {
        return Ok(None);
    };
    let size = std::env::var(SIZE_ENV_VAR).map_err(|_| {
        CollectiveError::Protocol(format!("{RANK_ENV_VAR} is set but {SIZE_ENV_VAR} is not."))
    })?;
    parse_identity(&rank, &size).map(Some)
}

fn parse_identity(rank: &str, size: &str) -> Result<(usize, usize), CollectiveError> {
    let parse = |name: &str, value: &str| {
        value.trim().parse::<usize>().map_err(|_| {
            CollectiveError::Protocol(format!("invalid value '{value}' in {name}."))
        })
    };
    let rank = parse(RANK_ENV_VAR, rank)?;
    let size = parse(SIZE_ENV_VAR, size)?;
    if rank >= size {
        return Err(CollectiveError::Protocol(format!(
            "rank {rank} is out of range for a group of {size}."
        )));
    }
    Ok((rank, size))
}

/// The worker side of the process transport.
///
/// The worker never coordinates: `gather_errors` always returns `None`. Reads
/// on `input` are not bounded here; the launcher enforces the deadline and
/// kills workers that are left waiting.
pub struct WorkerLink<R, W> {
    rank: usize,
    size: usize,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> WorkerLink<R, W> {
    pub fn new(rank: usize, size: usize, input: R, output: W) -> Self {
        Self {
            rank,
            size,
            input,
            output,
        }
    }
}

impl WorkerLink<io::StdinLock<'static>, io::Stdout> {
    /// Connects to the launcher through this process's stdin and stdout.
    pub fn stdio(rank: usize, size: usize) -> Self {
        Self::new(rank, size, io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Collective for WorkerLink<R, W> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn gather_errors(&mut self, error: Real) -> Result<Option<Vec<Real>>, CollectiveError> {
        let report = TrialReport {
            rank: self.rank,
            error,
        };
        write_row(&mut self.output, &report)?;
        log::debug!("Submitted error {error:e} to the launcher.");
        Ok(None)
    }

    fn broadcast_winner(&mut self, _winner: Option<usize>) -> Result<usize, CollectiveError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CollectiveError::PeerLost { rank: 0 });
        }
        let verdict: Verdict = parse_row(&line)?;
        Ok(verdict.winner)
    }
}

/// What the launcher learned from a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSummary {
    pub winner: usize,
    /// The submitted errors, indexed by rank.
    pub errors: Vec<Real>,
}

enum WorkerEvent {
    /// The first stdout line of a worker, or `None` if stdout closed first.
    Report { rank: usize, line: Option<String> },
    /// Everything the worker printed after its report.
    Output { rank: usize, text: String },
    ReadFailed { rank: usize, error: io::Error },
}

/// Spawns and coordinates a group of worker processes.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<OsString>,
    size: usize,
    timeout: Duration,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>, size: usize, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            size,
            timeout,
        }
    }

    /// Adds arguments passed unchanged to every worker.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Runs the group to completion and copies the winner's output to `forward`.
    pub fn run(&self, forward: &mut impl Write) -> Result<LaunchSummary, CollectiveError> {
        if self.size == 0 {
            return Err(CollectiveError::Empty);
        }
        let mut children: Vec<Child> = Vec::with_capacity(self.size);
        let result = self.coordinate(&mut children, forward);
        if result.is_err() {
            kill_all(&mut children);
        }
        result
    }

    fn coordinate(
        &self,
        children: &mut Vec<Child>,
        forward: &mut impl Write,
    ) -> Result<LaunchSummary, CollectiveError> {
        let deadline = Instant::now() + self.timeout;
        let (tx, rx) = mpsc::channel();
        let mut stdins: Vec<Option<ChildStdin>> = Vec::with_capacity(self.size);

        for rank in 0..self.size {
            let mut child = Command::new(&self.program)
                .args(&self.args)
                .env(RANK_ENV_VAR, rank.to_string())
                .env(SIZE_ENV_VAR, self.size.to_string())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()?;
            log::debug!("Spawned worker {rank} with pid {}.", child.id());

            stdins.push(child.stdin.take());
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| CollectiveError::Protocol("worker stdout is not piped.".into()))?;
            children.push(child);

            let tx = tx.clone();
            thread::spawn(move || read_worker(rank, stdout, &tx));
        }
        drop(tx);

        let mut errors = vec![Real::NAN; self.size];
        let mut reported = vec![false; self.size];
        let mut outputs: Vec<Option<String>> = vec![None; self.size];
        let mut pending = self.size;

        while pending > 0 {
            match recv_before(&rx, deadline, pending, self.timeout)? {
                WorkerEvent::Report { rank, line: None } => {
                    log::error!("Worker {rank} exited before reporting an error.");
                    return Err(CollectiveError::PeerLost { rank });
                }
                WorkerEvent::Report {
                    rank,
                    line: Some(line),
                } => {
                    let report: TrialReport = parse_row(&line)?;
                    if report.rank != rank || reported[rank] {
                        return Err(CollectiveError::Protocol(format!(
                            "worker {rank} reported as rank {}.",
                            report.rank
                        )));
                    }
                    log::debug!("Worker {rank} reported error {:e}.", report.error);
                    errors[rank] = report.error;
                    reported[rank] = true;
                    pending -= 1;
                }
                WorkerEvent::Output { rank, text } => outputs[rank] = Some(text),
                WorkerEvent::ReadFailed { rank, error } => {
                    log::error!("Failed to read from worker {rank}: {error}");
                    return Err(CollectiveError::Io(error));
                }
            }
        }

        let winner = argmin_rank(&errors).ok_or(CollectiveError::Empty)?;
        log::info!(
            "Selected trial {winner} with error {:e} out of {} trials.",
            errors[winner],
            self.size
        );

        for (rank, stdin) in stdins.iter_mut().enumerate() {
            if let Some(mut stdin) = stdin.take() {
                write_row(&mut stdin, &Verdict { winner })
                    .map_err(|_| CollectiveError::PeerLost { rank })?;
            }
        }

        let mut pending = outputs.iter().filter(|o| o.is_none()).count();
        while pending > 0 {
            match recv_before(&rx, deadline, pending, self.timeout)? {
                WorkerEvent::Output { rank, text } => {
                    outputs[rank] = Some(text);
                    pending -= 1;
                }
                WorkerEvent::ReadFailed { rank, error } => {
                    log::error!("Failed to read from worker {rank}: {error}");
                    return Err(CollectiveError::Io(error));
                }
                WorkerEvent::Report { rank, .. } => {
                    return Err(CollectiveError::Protocol(format!(
                        "worker {rank} reported twice."
                    )));
                }
            }
        }

        for (rank, child) in children.iter_mut().enumerate() {
            let status = wait_before(child, deadline, self.timeout)?;
            if !status.success() {
                log::error!("Worker {rank} failed with status: {status}");
                return Err(CollectiveError::WorkerFailed { rank, status });
            }
        }

        if let Some(text) = &outputs[winner] {
            forward.write_all(text.as_bytes())?;
            forward.flush()?;
        }

        Ok(LaunchSummary { winner, errors })
    }
}

fn read_worker(rank: usize, stdout: impl Read, tx: &mpsc::Sender<WorkerEvent>) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => {
            let _ = tx.send(WorkerEvent::Report { rank, line: None });
            return;
        }
        Ok(_) => {
            let _ = tx.send(WorkerEvent::Report {
                rank,
                line: Some(line),
            });
        }
        Err(error) => {
            let _ = tx.send(WorkerEvent::ReadFailed { rank, error });
            return;
        }
    }

    let mut text = String::new();
    let event = match reader.read_to_string(&mut text) {
        Ok(_) => WorkerEvent::Output { rank, text },
        Err(error) => WorkerEvent::ReadFailed { rank, error },
    };
    let _ = tx.send(event);
}

fn recv_before(
    rx: &mpsc::Receiver<WorkerEvent>,
    deadline: Instant,
    pending: usize,
    timeout: Duration,
) -> Result<WorkerEvent, CollectiveError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(event) => Ok(event),
        Err(RecvTimeoutError::Timeout) => {
            log::error!("Timed out waiting for {pending} worker(s).");
            Err(CollectiveError::Timeout { pending, timeout })
        }
        Err(RecvTimeoutError::Disconnected) => Err(CollectiveError::Protocol(
            "all worker streams closed unexpectedly.".to_string(),
        )),
    }
}

fn wait_before(
    child: &mut Child,
    deadline: Instant,
    timeout: Duration,
) -> Result<std::process::ExitStatus, CollectiveError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            return Err(CollectiveError::Timeout { pending: 1, timeout });
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn kill_all(children: &mut [Child]) {
    for child in children.iter_mut() {
        if let Ok(None) = child.try_wait() {
            let _ = child.kill();
        }
        let _ = child.wait();
    }
}
