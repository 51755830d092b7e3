//! Text rendering of a traversal.

use std::io::Write;

use crate::browse::traversal::{Traversal, TreeEntry};
use crate::browse::types::{BrowseError, BrowseService};

/// Two spaces per level, `/` after nodes with children. The root has no suffix.
pub fn format_entry(entry: &TreeEntry) -> String {
    let suffix = if entry.depth > 0 && entry.has_children { "/" } else { "" };
    format!("{}{}{}", "  ".repeat(entry.depth), entry.label, suffix)
}

/// Stream the traversal to `out` as it is produced. Returns the line count.
///
/// Lines already written stay written when the traversal fails.
pub async fn write_tree<B, W>(mut traversal: Traversal<'_, B>, out: &mut W) -> Result<usize, BrowseError>
where
    B: BrowseService,
    W: Write,
{
    let mut lines = 0;
    while let Some(entry) = traversal.next().await {
        writeln!(out, "{}", format_entry(&entry?))?;
        lines += 1;
    }
    out.flush()?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(depth: usize, label: &str, has_children: bool) -> TreeEntry {
        TreeEntry {
            depth,
            label: label.into(),
            has_children,
        }
    }

    #[test]
    fn entries_are_indented_and_marked() {
        assert_eq!(format_entry(&entry(0, "<root>", false)), "<root>");
        assert_eq!(format_entry(&entry(1, "Line1", true)), "  Line1/");
        assert_eq!(format_entry(&entry(3, "Speed", false)), "      Speed");
    }

    #[test]
    fn root_never_gets_suffix() {
        assert_eq!(format_entry(&entry(0, "Plant", true)), "Plant");
    }
}
