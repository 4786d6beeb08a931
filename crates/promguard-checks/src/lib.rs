//! Rule checks and the runner that drives them.
//!
//! Input: a batch of discovered entries plus live Prometheus handles.
//! Output: problems, ordered deterministically.

#![forbid(unsafe_code)]

pub mod checks;
mod comments;
mod context;
mod policy;
mod runner;

pub use checks::dependency::{Consumer, DependencyIndex, RuleDependencyCheck};
pub use checks::series::SeriesCheck;
pub use checks::RuleChecker;
pub use comments::is_disabled;
pub use context::CheckContext;
pub use policy::{CheckPolicy, EffectiveConfig, FailOn};
pub use runner::{Runner, ServerHandle};
