//! Entity module - domain types
//!
//! A single entity for now: the tool entry (`Tool`) and its input shapes.

pub mod tool;

pub use tool::{
    derive_groups, filter_by_group, sort_newest_first, Tool, ToolInput, ToolPatch, GROUP_ALL,
    GROUP_UNGROUPED,
};
