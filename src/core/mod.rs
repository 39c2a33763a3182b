pub mod orchestrator;
pub mod session;

pub use orchestrator::{Orchestrator, Outcome, Settings};
pub use session::{ConflictSet, RepositoryContext, ResolutionMethod, SessionState, StashStatus};
