//! Script replay against a live engine
//!
//! A script names its target collaborators and a list of steps. Each target
//! is served by a [`RecordingHandler`]. Every step prints one report line
//! followed by the events it produced, all as JSON lines.

use anyhow::Context;
use board_runtime::{BoardConfig, BoardOfDirectors};
use board_types::{ActionId, BoardError, Command, ErrorKind, Identity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::recorder::{Dispatch, RecordingHandler};

#[derive(Debug, Deserialize)]
pub struct Script {
    /// Collaborators to stand up, one recording handler each
    #[serde(default)]
    pub targets: Vec<Identity>,

    /// Command names the recording handlers refuse
    #[serde(default)]
    pub fail: Vec<String>,

    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing script {}", path.display()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Propose {
        proposer: Identity,
        target: Identity,
        #[serde(default)]
        description: String,
        command: Command,
    },
    Approve {
        action: ActionId,
        approver: Identity,
    },
    Revoke {
        action: ActionId,
        approver: Identity,
    },
    ReplaceMembers {
        caller: Identity,
        members: Vec<Identity>,
    },
    Query {
        #[serde(default)]
        action: Option<ActionId>,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Propose { .. } => "propose",
            Step::Approve { .. } => "approve",
            Step::Revoke { .. } => "revoke",
            Step::ReplaceMembers { .. } => "replace_members",
            Step::Query { .. } => "query",
        }
    }
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    op: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct BoardState {
    members: Vec<Identity>,
    owners: Vec<Identity>,
    action_count: usize,
    pending: Vec<ActionId>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub steps: usize,
    pub failed_steps: usize,
    pub actions: usize,
    pub executed: usize,
    pub dispatched: Vec<Dispatch>,
}

pub struct Replay {
    board: BoardOfDirectors,
    recorders: Vec<Arc<RecordingHandler>>,
    cursor: usize,
}

impl Replay {
    /// Build the engine and register one recording handler per script target
    pub fn new(config: &BoardConfig, script: &Script) -> anyhow::Result<Self> {
        let mut config = config.clone();
        // Per-step event output reads from the journal
        config.events.journal = true;

        let board = BoardOfDirectors::from_config(&config).context("building engine")?;
        let failing: BTreeSet<String> = script.fail.iter().cloned().collect();

        let mut recorders = Vec::with_capacity(script.targets.len());
        for target in &script.targets {
            let recorder = Arc::new(RecordingHandler::new(target.clone(), failing.clone()));
            board
                .register_handler(target.clone(), recorder.clone())
                .with_context(|| format!("registering target {target}"))?;
            recorders.push(recorder);
        }

        Ok(Self {
            board,
            recorders,
            cursor: 0,
        })
    }

    pub fn board(&self) -> &BoardOfDirectors {
        &self.board
    }

    /// Replay every step, writing reports and events to `out`
    pub fn run<W: Write>(&mut self, steps: &[Step], out: &mut W) -> anyhow::Result<Summary> {
        let mut failed_steps = 0;

        for (index, step) in steps.iter().enumerate() {
            let outcome = self.apply(step);
            let report = match outcome {
                Ok(result) => StepReport {
                    step: index,
                    op: step.op(),
                    status: "ok",
                    kind: None,
                    error: None,
                    result,
                },
                Err(err) => {
                    failed_steps += 1;
                    debug!(step = index, op = step.op(), error = %err, "Step failed");
                    StepReport {
                        step: index,
                        op: step.op(),
                        status: "error",
                        kind: Some(err.kind()),
                        error: Some(err.to_string()),
                        result: None,
                    }
                }
            };
            writeln!(out, "{}", serde_json::to_string(&report)?)?;
            self.flush_events(out)?;
        }

        let summary = self.summary(steps.len(), failed_steps);
        info!(
            steps = summary.steps,
            failed = summary.failed_steps,
            executed = summary.executed,
            "Script finished"
        );
        Ok(summary)
    }

    fn apply(&self, step: &Step) -> Result<Option<serde_json::Value>, BoardError> {
        match step {
            Step::Propose {
                proposer,
                target,
                description,
                command,
            } => {
                let id = self.board.propose(
                    proposer,
                    target.clone(),
                    description.clone(),
                    command.clone(),
                )?;
                Ok(Some(serde_json::json!({ "action_id": id })))
            }
            Step::Approve { action, approver } => {
                self.board.approve(*action, approver)?;
                Ok(Some(serde_json::json!({
                    "approval_count": self.board.approval_count(*action)?,
                    "executed": self.board.is_executed(*action)?,
                })))
            }
            Step::Revoke { action, approver } => {
                self.board.revoke(*action, approver)?;
                Ok(Some(serde_json::json!({
                    "approval_count": self.board.approval_count(*action)?,
                })))
            }
            Step::ReplaceMembers { caller, members } => {
                self.board.replace_members(caller, members.iter().cloned())?;
                Ok(None)
            }
            Step::Query { action: Some(id) } => {
                let action = self.board.action(*id)?;
                Ok(serde_json::to_value(&action).ok())
            }
            Step::Query { action: None } => {
                let state = BoardState {
                    members: self.board.members().iter().cloned().collect(),
                    owners: self.board.owners().iter().cloned().collect(),
                    action_count: self.board.action_count(),
                    pending: self.board.pending_actions(),
                };
                Ok(serde_json::to_value(&state).ok())
            }
        }
    }

    fn flush_events<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let Some(journal) = self.board.journal() else {
            return Ok(());
        };
        let entries = journal.entries();
        for envelope in entries.iter().skip(self.cursor) {
            writeln!(out, "{}", serde_json::to_string(envelope)?)?;
        }
        self.cursor = entries.len();
        Ok(())
    }

    fn summary(&self, steps: usize, failed_steps: usize) -> Summary {
        let actions = self.board.action_count();
        let pending = self.board.pending_actions().len();
        Summary {
            steps,
            failed_steps,
            actions,
            executed: actions - pending,
            dispatched: self
                .recorders
                .iter()
                .flat_map(|r| r.dispatched())
                .collect(),
        }
    }
}
