//! Namespace browsing subsystem.
//!
//! # Data Flow
//! ```text
//! root (item path, item name) + max depth
//!     → traversal.rs (explicit stack, visited set, paging via BrowseService)
//!     → TreeEntry stream (depth, label, has children)
//!     → render.rs (indented text)
//! ```
//!
//! # Design Decisions
//! - The list-children call is a trait so the walk can run against any server
//! - Errors carry the node whose expansion failed
//! - No retries here; retry policy belongs to the RPC layer

pub mod render;
pub mod traversal;
pub mod types;

pub use render::{format_entry, write_tree};
pub use traversal::{Traversal, TraversalOptions, TreeEntry};
pub use types::{
    format_opc_errors, BrowseElement, BrowseError, BrowseFilter, BrowsePage, BrowseRequest,
    BrowseService, NodeKey, OpcError,
};
