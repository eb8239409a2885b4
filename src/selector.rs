use std::collections::BTreeSet;
use anyhow::Result;
use crate::frame::Frame;

pub const CLIENT_COL: &str = "CLIENT";
pub const TABLE_COL: &str = "TABLE_NAME";

pub fn clients(merged: &Frame) -> Result<Vec<String>> { merged.distinct_sorted(CLIENT_COL) }

pub fn filter_client(merged: &Frame, client: &str) -> Result<Frame> { merged.filter_eq(CLIENT_COL, client) }

pub fn tables(client_rows: &Frame) -> Result<Vec<String>> { client_rows.distinct_sorted(TABLE_COL) }

/// Session-owned set of chosen table names.
///
/// Names are not scoped to a client: switching clients keeps any selected name that also
/// exists for the new client, unless "select all" resets the set to the new listing.
/// Turning "select all" off never clears anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    selected: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self { Self::default() }

    /// Replaces the set with exactly the given listing.
    pub fn select_all(&mut self, tables: &[String]) {
        self.selected = tables.iter().cloned().collect();
    }

    /// Checkbox change; only tables in the current listing can be turned on.
    pub fn set(&mut self, table: &str, on: bool, tables: &[String]) -> bool {
        if on {
            if !tables.iter().any(|t| t == table) { return false; }
            self.selected.insert(table.to_string());
            true
        } else {
            self.selected.remove(table)
        }
    }

    pub fn toggle(&mut self, table: &str, tables: &[String]) -> bool {
        let on = !self.is_selected(table);
        self.set(table, on, tables) && on
    }

    /// One render pass: a set select-all box resets to the listing, otherwise checkboxes keep their state.
    pub fn reconcile(&mut self, tables: &[String], select_all: bool) {
        if select_all { self.select_all(tables); }
    }

    pub fn is_selected(&self, table: &str) -> bool { self.selected.contains(table) }

    /// Selected names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.selected.iter().map(|s| s.as_str()) }

    pub fn len(&self) -> usize { self.selected.len() }

    pub fn is_empty(&self) -> bool { self.selected.is_empty() }

    pub fn clear(&mut self) { self.selected.clear(); }
}
