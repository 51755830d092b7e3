//! Depth-first namespace traversal.
//!
//! # Responsibilities
//! - Expand nodes level by level up to a maximum depth
//! - Merge paged listings until the server reports no more elements
//! - Order siblings by label and expand each identity at most once
//!
//! # Design Decisions
//! - Lazy: entries are produced one by one from an explicit work stack
//! - The visited set belongs to one traversal and only grows
//! - The first failure ends the traversal; there is no partial recovery
//! - Cancellation is checked before every page and raced against each call

use std::collections::HashSet;

use crate::browse::types::{
    format_opc_errors, BrowseElement, BrowseError, BrowseFilter, BrowseRequest, BrowseService,
    NodeKey,
};
use crate::lifecycle::CancelToken;

/// One line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub depth: usize,
    pub label: String,
    pub has_children: bool,
}

/// Request fields repeated on every page.
#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    pub locale: String,
    pub client_handle: String,
    /// Levels below the root to expand. Zero or less lists only the root.
    pub max_depth: i64,
}

enum Frame {
    /// Children of `node` still have to be fetched.
    Expand { node: NodeKey, depth: usize },
    /// Sorted children of an expanded node, not yet emitted.
    Listing {
        depth: usize,
        elements: std::vec::IntoIter<BrowseElement>,
    },
}

/// Lazy walk over the namespace below one root.
pub struct Traversal<'a, B> {
    service: &'a B,
    options: TraversalOptions,
    cancel: CancelToken,
    root: Option<NodeKey>,
    visited: HashSet<NodeKey>,
    stack: Vec<Frame>,
    finished: bool,
}

impl<'a, B: BrowseService> Traversal<'a, B> {
    pub fn new(
        service: &'a B,
        root: NodeKey,
        options: TraversalOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            service,
            options,
            cancel,
            root: Some(root),
            visited: HashSet::new(),
            stack: Vec::new(),
            finished: false,
        }
    }

    /// Next entry in depth-first, sorted order.
    ///
    /// Returns `None` when the walk is complete. After an error the
    /// traversal is finished and keeps returning `None`.
    pub async fn next(&mut self) -> Option<Result<TreeEntry, BrowseError>> {
        if self.finished {
            return None;
        }
        if let Some(root) = self.root.take() {
            return Some(Ok(self.start(root)));
        }

        loop {
            match self.stack.pop()? {
                Frame::Expand { node, depth } => match self.list_all(&node).await {
                    Ok(mut elements) => {
                        elements.sort_by(|a, b| a.label().cmp(b.label()));
                        self.stack.push(Frame::Listing {
                            depth,
                            elements: elements.into_iter(),
                        });
                    }
                    Err(err) => {
                        self.finished = true;
                        self.stack.clear();
                        return Some(Err(err));
                    }
                },
                Frame::Listing {
                    depth,
                    mut elements,
                } => {
                    let Some(element) = elements.next() else {
                        continue;
                    };
                    self.stack.push(Frame::Listing { depth, elements });

                    // Listed every time; expanded only the first time its key is seen.
                    if element.has_children
                        && (depth as i64) < self.options.max_depth
                        && self.visited.insert(element.key())
                    {
                        self.stack.push(Frame::Expand {
                            node: element.key(),
                            depth: depth + 1,
                        });
                    }
                    return Some(Ok(TreeEntry {
                        depth,
                        label: element.label().to_string(),
                        has_children: element.has_children,
                    }));
                }
            }
        }
    }

    /// Drain the traversal into a vector, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<TreeEntry>, BrowseError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn start(&mut self, root: NodeKey) -> TreeEntry {
        let entry = TreeEntry {
            depth: 0,
            label: root.root_label().to_string(),
            has_children: false,
        };
        if self.options.max_depth <= 0 {
            self.finished = true;
        } else {
            self.visited.insert(root.clone());
            self.stack.push(Frame::Expand {
                node: root,
                depth: 1,
            });
        }
        entry
    }

    /// Every child of `node`, across all pages.
    async fn list_all(&self, node: &NodeKey) -> Result<Vec<BrowseElement>, BrowseError> {
        let mut all = Vec::new();
        let mut continuation = String::new();

        loop {
            self.cancel
                .check()
                .map_err(|reason| BrowseError::Cancelled {
                    node: node.clone(),
                    reason,
                })?;

            tracing::debug!(
                item_path = %node.item_path,
                item_name = %node.item_name,
                continuation = %continuation,
                "browse page request"
            );
            let request = BrowseRequest {
                locale: self.options.locale.clone(),
                client_handle: self.options.client_handle.clone(),
                item_path: node.item_path.clone(),
                item_name: node.item_name.clone(),
                continuation_point: continuation,
                filter: BrowseFilter::All,
                return_error_text: true,
            };

            let page = tokio::select! {
                result = self.service.browse(request) => result.map_err(|source| BrowseError::Rpc {
                    node: node.clone(),
                    source,
                })?,
                reason = self.cancel.cancelled() => {
                    return Err(BrowseError::Cancelled { node: node.clone(), reason });
                }
            };

            if !page.errors.is_empty() {
                return Err(BrowseError::Protocol {
                    node: node.clone(),
                    message: format_opc_errors(&page.errors),
                });
            }
            tracing::debug!(
                elements = page.elements.len(),
                more_elements = page.more_elements,
                "browse page response"
            );
            all.extend(page.elements);

            if !page.more_elements || page.continuation_point.is_empty() {
                return Ok(all);
            }
            continuation = page.continuation_point;
        }
    }
}
