//! Tool abstractions for Ravel.
//!
//! - `Tool`: RPITIT trait for concrete tool implementations
//! - `BoxTool`: object-safe wrapper for dynamic dispatch
//! - `ToolDiscovery`: external catalogue of tools (listed and called by name)
//! - `ToolRegistry`: the tool set a run executes calls against

pub mod box_tool;
pub mod definition;
pub mod discovery;
pub mod registry;

pub use box_tool::BoxTool;
pub use definition::{Tool, ToolContext};
pub use discovery::{DiscoveredTool, ToolDiscovery};
pub use registry::ToolRegistry;
