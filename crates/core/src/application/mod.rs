// Application Layer - Adapters, tools and dispatch

pub mod adapter;
pub mod dispatcher;
pub mod tools;

// Re-exports
pub use adapter::ToolAdapter;
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use tools::{build_adapters, ToolMeta, ToolProfile, TOOL_MODULES};
