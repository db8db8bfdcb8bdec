//! Adapter for turning parsed run tables into engine groups
//!
//! Handles group naming: explicit names first, then `File N` for single runs
//! and `Avg. (i-j)` for averaging groups, with N counting every requested
//! source across all groups.

use crate::schema::table::RunTable;
use crate::types::Group;

/// Adapter for converting run tables to groups
pub struct RunTableAdapter;

impl RunTableAdapter {
    /// Names for groups of the given sizes.
    ///
    /// Sizes count requested sources, including any that later fail to load,
    /// so numbering stays stable when a file is unreadable.
    pub fn group_names(sizes: &[usize], explicit: &[String]) -> Vec<String> {
        let mut first = 1;
        sizes
            .iter()
            .enumerate()
            .map(|(g, &size)| {
                let name = match explicit.get(g) {
                    Some(name) => name.clone(),
                    None if size > 1 => format!("Avg. ({}-{})", first, first + size - 1),
                    None => format!("File {first}"),
                };
                first += size;
                name
            })
            .collect()
    }

    /// Build a group from the tables that loaded, using one configured column
    pub fn to_group(name: &str, tables: &[(String, RunTable)], column: usize) -> Group {
        let runs = tables
            .iter()
            .filter_map(|(label, table)| table.run(column, label.as_str()))
            .collect();
        Group::new(name, runs)
    }
}
