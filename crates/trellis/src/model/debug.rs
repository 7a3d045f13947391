//! Textual visualisation of data-source trees.
//!
//! ```ignore
//! use trellis::model::DataSourceTreeDebug;
//!
//! let debug = DataSourceTreeDebug::new();
//! println!("{}", debug.format_tree(&tree, root)?);
//! ```
//!
//! With the default options in the ASCII style, a segmented
//! composite with two children renders as:
//!
//! ```text
//! Tabs (segmented) [loaded] 1 section
//! +-- * Recent (leaf) [loaded] 1 section
//! `-- Favorites (leaf) [initial] 0 sections
//! ```

use std::fmt::Write as FmtWrite;

use trellis_core::{Result, TreeFormatOptions, TreeStyle};

use super::tree::{DataSourceId, DataSourceTree};

/// Renders the structure, loading states and section counts of a tree.
#[derive(Debug, Clone, Default)]
pub struct DataSourceTreeDebug {
    options: TreeFormatOptions,
}

impl DataSourceTreeDebug {
    /// Creates a visualiser with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a visualiser with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Formats every root in the tree.
    pub fn format_all<T: 'static>(&self, tree: &DataSourceTree<T>) -> Result<String> {
        let roots = tree.roots();
        let mut output = String::new();
        let _ = writeln!(output, "Data sources ({} total):", tree.len());
        if roots.is_empty() {
            output.push_str("  (empty)\n");
        }
        for root in roots {
            self.format_into(tree, root, 0, true, &mut output)?;
        }
        Ok(output)
    }

    /// Formats the subtree rooted at `root`.
    pub fn format_tree<T: 'static>(&self, tree: &DataSourceTree<T>, root: DataSourceId) -> Result<String> {
        let mut output = String::new();
        self.format_into(tree, root, 0, true, &mut output)?;
        Ok(output)
    }

    fn format_into<T: 'static>(
        &self,
        tree: &DataSourceTree<T>,
        id: DataSourceId,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) -> Result<()> {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        output.push_str(&self.options.prefix(depth, is_last));

        let parent = tree.parent(id)?;
        let selected = match parent {
            Some(parent) => tree
                .selected_data_source(parent)
                .is_ok_and(|selected| selected == Some(id)),
            None => false,
        };
        if selected {
            output.push_str("* ");
        }

        let title = tree.title(id)?;
        output.push_str(if title.is_empty() { "(untitled)" } else { title });
        let _ = write!(output, " ({})", tree.kind(id)?);

        if self.options.show_ids {
            let _ = write!(output, " {id:?}");
        }
        if self.options.show_states {
            let _ = write!(output, " [{}]", tree.loading_state(id)?);
        }
        if self.options.show_counts {
            let sections = tree.number_of_sections(id)?;
            let _ = write!(
                output,
                " {sections} {}",
                if sections == 1 { "section" } else { "sections" }
            );
        }
        if self.options.style == TreeStyle::Compact {
            output.push_str("; ");
        } else {
            output.push('\n');
        }

        let children = tree.children(id)?;
        for (index, &child) in children.iter().enumerate() {
            self.format_into(tree, child, depth + 1, index + 1 == children.len(), output)?;
        }
        Ok(())
    }
}
