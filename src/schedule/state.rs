use crate::error::ErrorKind;
use std::collections::BTreeMap;

/// Where a station stands within one acquisition round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionState {
    Pending,
    InFlight,
    Succeeded,
    Failed { kind: ErrorKind, reason: String },
    /// Failed, and the decider dropped the station.
    Excluded { kind: ErrorKind, reason: String },
}

/// A station job that did not produce its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationFailure {
    pub station: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// The stations of one round and how each of them ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: usize,
    pub states: BTreeMap<String, AcquisitionState>,
}

impl RoundReport {
    pub(crate) fn new<'a>(round: usize, stations: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            round,
            states: stations
                .into_iter()
                .map(|id| (id.to_string(), AcquisitionState::Pending))
                .collect(),
        }
    }

    pub(crate) fn set(&mut self, station: &str, state: AcquisitionState) {
        if let Some(current) = self.states.get_mut(station) {
            *current = state;
        }
    }

    /// Number of stations that entered the round.
    pub fn pending(&self) -> usize {
        self.states.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.with_state(|s| matches!(s, AcquisitionState::Succeeded))
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.with_state(|s| matches!(s, AcquisitionState::Excluded { .. }))
    }

    /// Every job of the round that failed, retried or excluded afterwards.
    pub fn failures(&self) -> Vec<StationFailure> {
        self.states
            .iter()
            .filter_map(|(station, state)| match state {
                AcquisitionState::Failed { kind, reason }
                | AcquisitionState::Excluded { kind, reason } => Some(StationFailure {
                    station: station.clone(),
                    kind: *kind,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn with_state(
        &self,
        predicate: impl Fn(&AcquisitionState) -> bool,
    ) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(move |(_, state)| predicate(state))
            .map(|(station, _)| station.as_str())
    }
}

/// Outcome of driving the catalog to convergence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub rounds: Vec<RoundReport>,
}

impl AcquisitionReport {
    pub fn rounds_run(&self) -> usize {
        self.rounds.len()
    }

    /// Size of the missing set at the start of every round.
    pub fn pending_per_round(&self) -> Vec<usize> {
        self.rounds.iter().map(RoundReport::pending).collect()
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.rounds
            .iter()
            .flat_map(|r| r.succeeded().map(str::to_string))
            .collect()
    }

    pub fn excluded(&self) -> Vec<String> {
        self.rounds
            .iter()
            .flat_map(|r| r.excluded().map(str::to_string))
            .collect()
    }
}

/// Outcome of the resampling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResampleReport {
    pub succeeded: Vec<String>,
    pub failures: Vec<StationFailure>,
}

impl ResampleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
