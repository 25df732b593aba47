//! The staged workflow runner.

use std::fmt;

use crate::pipeline::stages;
use crate::pipeline::Context;

/// One pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Receive,
    Validate,
    Middleware,
    Handle,
    Response,
    After,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Receive,
        Stage::Validate,
        Stage::Middleware,
        Stage::Handle,
        Stage::Response,
        Stage::After,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Receive => "receive",
            Stage::Validate => "validate",
            Stage::Middleware => "middleware",
            Stage::Handle => "handle",
            Stage::Response => "response",
            Stage::After => "after",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage asks the runner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next,
    /// Skip ahead to a later stage. Backward jumps are treated as `Next`.
    Jump(Stage),
}

/// Runs the fixed stage list against a context.
#[derive(Debug, Clone)]
pub struct Workflow {
    stages: Vec<Stage>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            stages: Stage::ALL.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order, honoring forward jumps.
    pub async fn start(&self, ctx: &mut Context) {
        let mut index = 0;
        while let Some(&stage) = self.stages.get(index) {
            ctx.curr.stage = Some(stage);
            let transition = stages::run(stage, ctx).await;
            tracing::trace!(
                request_id = %ctx.request_id,
                stage = %stage,
                transition = ?transition,
                "Stage finished"
            );
            index = match transition {
                Transition::Jump(target) if target > stage => self
                    .stages
                    .iter()
                    .position(|s| *s == target)
                    .unwrap_or(index + 1),
                _ => index + 1,
            };
        }
    }
}
