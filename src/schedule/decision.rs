//! What to do with a station whose acquisition failed in a round.

use crate::error::ErrorKind;
use crate::schedule::error::AcquisitionError;
use crate::types::station::Station;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Drop the station from this and every later run.
    Exclude,
    /// Leave the station in the missing set for the next round.
    Retry,
}

/// Asked once per failed station after every acquisition round.
///
/// Any `Fn(&str, ErrorKind) -> Decision` closure is a decider as well; it receives the
/// station id and the failure class.
#[async_trait]
pub trait FailureDecider: Send + Sync {
    async fn decide(&self, station: &Station, error: &AcquisitionError) -> Decision;
}

#[async_trait]
impl<F> FailureDecider for F
where
    F: Fn(&str, ErrorKind) -> Decision + Send + Sync,
{
    async fn decide(&self, station: &Station, error: &AcquisitionError) -> Decision {
        self(&station.id, error.kind())
    }
}

/// Asks the operator on the terminal.
///
/// A closed stdin counts as an answer to exclude, so an unattended run still ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDecider;

impl ConsoleDecider {
    fn prompt(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> Decision {
        let mut line = String::new();
        loop {
            if let Err(e) = write!(output, "{} [e]xclude / [r]etry: ", question)
                .and_then(|()| output.flush())
            {
                debug!("Could not show prompt: {}", e);
            }
            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => return Decision::Exclude,
                Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                    "e" | "exclude" => return Decision::Exclude,
                    "r" | "retry" => return Decision::Retry,
                    _ => {
                        if let Err(e) = writeln!(output, "Please answer 'e' or 'r'.") {
                            debug!("Could not show prompt: {}", e);
                        }
                    }
                },
                Err(e) => {
                    warn!("Could not read operator input: {}", e);
                    return Decision::Exclude;
                }
            }
        }
    }
}

#[async_trait]
impl FailureDecider for ConsoleDecider {
    async fn decide(&self, station: &Station, error: &AcquisitionError) -> Decision {
        let question = format!(
            "Station {} failed ({:?}): {}.",
            station.label(),
            error.kind(),
            error
        );
        tokio::task::spawn_blocking(move || {
            Self::prompt(&question, &mut io::stdin().lock(), &mut io::stdout())
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Operator prompt failed: {}", e);
            Decision::Exclude
        })
    }
}

/// Never gives up on a station. A station that never succeeds keeps the run going.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRetry;

#[async_trait]
impl FailureDecider for AlwaysRetry {
    async fn decide(&self, _station: &Station, _error: &AcquisitionError) -> Decision {
        Decision::Retry
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysExclude;

#[async_trait]
impl FailureDecider for AlwaysExclude {
    async fn decide(&self, _station: &Station, _error: &AcquisitionError) -> Decision {
        Decision::Exclude
    }
}

/// Retries a station until it has failed in `rounds` rounds, then excludes it.
/// Data faults in the season itself are excluded at once.
#[derive(Debug)]
pub struct ExcludeAfterRounds {
    rounds: usize,
    failures: Mutex<HashMap<String, usize>>,
}

impl ExcludeAfterRounds {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds: rounds.max(1),
            failures: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl FailureDecider for ExcludeAfterRounds {
    async fn decide(&self, station: &Station, error: &AcquisitionError) -> Decision {
        if error.kind().is_data_fault() {
            return Decision::Exclude;
        }
        let mut failures = self.failures.lock().await;
        let count = failures.entry(station.id.clone()).or_insert(0);
        *count += 1;
        if *count >= self.rounds {
            Decision::Exclude
        } else {
            Decision::Retry
        }
    }
}
