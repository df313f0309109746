//! # Story Model
//!
//! The data layer of Threadr - scenes, the choices that connect them, and the
//! stat catalog those choices adjust. This crate holds no I/O and no runtime
//! state; it is the vocabulary shared by the editor core and any front end.
//!
//! ## Core Components
//!
//! - **node**: `StoryNode`, `GameChoice` and `StatAdjustment`
//! - **stats**: the `CustomStat` catalog and stat-name slugs
//! - **validation**: structural diagnostics over a story graph

mod error;
pub mod node;
pub mod stats;
pub mod validation;

pub use error::*;
pub use node::*;
pub use stats::*;
pub use validation::*;
