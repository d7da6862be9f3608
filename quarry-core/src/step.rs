//! The build step model.

use duckdb::Connection;
use std::fmt;

/// A step action rebuilds the step's target from scratch using the
/// provided engine connection. It must write only its own target path,
/// read only from already-published dependency artifacts (or raw
/// sources), and publish through [`crate::publish`]. Failure is
/// signalled by returning an error.
pub type StepAction = Box<dyn Fn(&Connection) -> anyhow::Result<()> + Send + Sync>;

/// A unit of build work producing one artifact.
pub struct Step {
    /// Stable identifier, used as the manifest key. Ids are versioned by
    /// convention (`prices_v2`): changing a step's semantics means
    /// registering a new id so the next run rebuilds it.
    pub id: String,
    /// Logical name of the artifact this step produces.
    pub target: String,
    /// Targets that must exist and be current before this step runs.
    pub depends_on: Vec<String>,
    pub(crate) action: StepAction,
}

impl Step {
    /// Invoke the step's action against an engine connection.
    pub fn run(&self, conn: &Connection) -> anyhow::Result<()> {
        (self.action)(conn)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
