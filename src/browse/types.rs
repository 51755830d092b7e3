//! Browse data model and the list-children seam.

use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::lifecycle::CancelReason;
use crate::soap::RpcError;

/// Label used when an element carries no identifying text.
pub const UNNAMED: &str = "<unnamed>";

/// Label used for a root with neither path nor name.
pub const ROOT: &str = "<root>";

/// One child entry returned by a browse call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseElement {
    /// Display name, may be empty.
    pub name: String,
    pub item_path: String,
    pub item_name: String,
    pub is_item: bool,
    pub has_children: bool,
}

impl BrowseElement {
    /// Name, then item name, then item path, then a placeholder.
    pub fn label(&self) -> &str {
        [&self.name, &self.item_name, &self.item_path]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or(UNNAMED, String::as_str)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.item_path, &self.item_name)
    }
}

/// Node identity: (item path, item name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub item_path: String,
    pub item_name: String,
}

impl NodeKey {
    pub fn new(item_path: &str, item_name: &str) -> Self {
        Self {
            item_path: item_path.to_string(),
            item_name: item_name.to_string(),
        }
    }

    /// Root label: item name, then item path, then a placeholder.
    pub fn root_label(&self) -> &str {
        [&self.item_name, &self.item_path]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or(ROOT, String::as_str)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item_path={:?} item_name={:?}", self.item_path, self.item_name)
    }
}

/// Error entry reported inside an otherwise successful reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpcError {
    pub id: Option<String>,
    pub text: String,
}

/// Join server errors as "id: text" or "text", separated by "; ".
pub fn format_opc_errors(errors: &[OpcError]) -> String {
    let parts: Vec<String> = errors
        .iter()
        .filter_map(|err| match err.id.as_deref() {
            Some(id) if !id.is_empty() => Some(format!("{id}: {}", err.text)),
            _ if !err.text.is_empty() => Some(err.text.clone()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join("; ")
    }
}

/// Which children a browse call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowseFilter {
    #[default]
    All,
    Branch,
    Item,
}

impl BrowseFilter {
    /// Wire value of the `BrowseFilter` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseFilter::All => "all",
            BrowseFilter::Branch => "branch",
            BrowseFilter::Item => "item",
        }
    }
}

/// Arguments of one browse page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseRequest {
    pub locale: String,
    pub client_handle: String,
    pub item_path: String,
    pub item_name: String,
    /// Empty on the first page.
    pub continuation_point: String,
    pub filter: BrowseFilter,
    pub return_error_text: bool,
}

/// One reply of a paged listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowsePage {
    pub elements: Vec<BrowseElement>,
    pub more_elements: bool,
    pub continuation_point: String,
    pub errors: Vec<OpcError>,
}

/// The list-children RPC the traversal drives.
pub trait BrowseService: Send + Sync {
    fn browse(&self, request: BrowseRequest) -> impl Future<Output = Result<BrowsePage, RpcError>> + Send;
}

/// Why a traversal stopped. Every variant names the node being expanded.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("browse {node}: {source}")]
    Rpc {
        node: NodeKey,
        #[source]
        source: RpcError,
    },

    #[error("browse {node}: {message}")]
    Protocol { node: NodeKey, message: String },

    #[error("browse {node}: {reason}")]
    Cancelled { node: NodeKey, reason: CancelReason },

    #[error("write tree: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowseError {
    /// Node whose expansion failed, when there is one.
    pub fn node(&self) -> Option<&NodeKey> {
        match self {
            BrowseError::Rpc { node, .. }
            | BrowseError::Protocol { node, .. }
            | BrowseError::Cancelled { node, .. } => Some(node),
            BrowseError::Io(_) => None,
        }
    }
}
