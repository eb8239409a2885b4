use std::path::PathBuf;
use anyhow::Result;
use crate::frame::Frame;
use crate::html::{self, Escaping};
use crate::join;
use crate::loader::{LoadCache, Source};
use crate::normalize::Normalizer;
use crate::selector::{self, Selection, TABLE_COL};

pub const DISPLAY_COLUMNS: [&str; 4] = ["TABLE_SCHEMA", "TABLE_NAME", "column_name", "notes"];
pub const MISSING_INPUT_MSG: &str = "Please upload data dictionary and client table files";
pub const NO_DATA_MSG: &str = "No available data for the selected client";

pub fn export_filename(client: &str) -> String { format!("{}_DaaS_Data_Dictionary.html", client) }

#[derive(Debug)]
pub struct Export {
    pub client: String,
    pub clients: Vec<String>,
    /// Every table of the client, i.e. the checkbox listing.
    pub tables: Vec<String>,
    pub filename: String,
    pub html: String,
    /// Selected tables of this client in sorted order with their display columns.
    pub previews: Vec<(String, Frame)>,
}

#[derive(Debug)]
pub enum Render {
    MissingInput,
    NoData { client: Option<String>, clients: Vec<String> },
    Ready(Export),
}

/// State of one interactive session; every call to [`Session::render`] re-runs the whole flow.
pub struct Session {
    pub dictionary: Option<PathBuf>,
    pub inventory: Option<PathBuf>,
    pub client: Option<String>,
    pub escaping: Escaping,
    pub selection: Selection,
    normalizer: Normalizer,
    cache: LoadCache,
    pending_select_all: bool,
}

struct Joined {
    clients: Vec<String>,
    client: Option<String>,
    rows: Frame,
}

impl Session {
    pub fn new(normalizer: Normalizer, escaping: Escaping) -> Self {
        Self { dictionary: None, inventory: None, client: None, escaping, selection: Selection::new(), normalizer, cache: LoadCache::new(), pending_select_all: false }
    }

    pub fn upload(&mut self, source: Source, path: Option<PathBuf>) {
        match source { Source::Dictionary => self.dictionary = path, Source::Inventory => self.inventory = path }
    }

    pub fn choose_client(&mut self, client: &str) { self.client = Some(client.to_string()); }

    /// Select-all is edge triggered: it resets the selection to the listing on the next render and is then spent.
    pub fn request_select_all(&mut self) { self.pending_select_all = true; }

    /// Checkbox for one table of the current client; returns whether the selection accepted it.
    pub fn set_table(&mut self, table: &str, on: bool) -> Result<bool> {
        let tables = self.current_tables()?;
        Ok(self.selection.set(table, on, &tables))
    }

    pub fn toggle_table(&mut self, table: &str) -> Result<bool> {
        let tables = self.current_tables()?;
        Ok(self.selection.toggle(table, &tables))
    }

    pub fn current_tables(&mut self) -> Result<Vec<String>> {
        match self.joined()? {
            Some(Joined { client: Some(_), rows, .. }) if !rows.is_empty() => selector::tables(&rows),
            _ => Ok(vec![]),
        }
    }

    pub fn clients(&mut self) -> Result<Vec<String>> {
        Ok(self.joined()?.map(|j| j.clients).unwrap_or_default())
    }

    /// Drops cached uploads and the selection, as the "close and clear data" action does.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.selection.clear();
        self.pending_select_all = false;
    }

    fn joined(&mut self) -> Result<Option<Joined>> {
        let (Some(d), Some(i)) = (self.dictionary.clone(), self.inventory.clone()) else { return Ok(None) };
        let dictionary = self.cache.load(Source::Dictionary, Some(&d))?;
        let inventory = self.cache.load(Source::Inventory, Some(&i))?;
        log::debug!("uploads ready ({} cached parses reused so far)", self.cache.hits());
        let merged = join::inner_join(&inventory, &dictionary, &self.normalizer)?;
        let clients = selector::clients(&merged)?;
        let client = self.client.clone().or_else(|| clients.first().cloned());
        let rows = match client.as_deref() { Some(c) => selector::filter_client(&merged, c)?, None => Frame::default() };
        Ok(Some(Joined { clients, client, rows }))
    }

    pub fn render(&mut self) -> Result<Render> {
        let Some(Joined { clients, client, rows }) = self.joined()? else {
            log::debug!("render: waiting for uploads");
            return Ok(Render::MissingInput);
        };
        if rows.is_empty() {
            log::info!("No merged rows for client {:?}", client);
            return Ok(Render::NoData { client, clients });
        }
        let Some(client) = client else { return Ok(Render::NoData { client: None, clients }) };
        if self.client.is_none() { self.client = Some(client.clone()); }
        let tables = selector::tables(&rows)?;
        self.selection.reconcile(&tables, self.pending_select_all);
        self.pending_select_all = false;
        let display = rows.select(&DISPLAY_COLUMNS)?;
        let mut previews = Vec::new();
        for name in self.selection.iter() {
            if !tables.iter().any(|t| t == name) {
                log::debug!("render: selected table {} not offered for {}", name, client);
                continue;
            }
            previews.push((name.to_string(), display.filter_eq(TABLE_COL, name)?));
        }
        let html = html::render_document(&client, previews.iter().map(|(n, f)| (n.as_str(), f)), self.escaping);
        log::info!("Rendered {} of {} tables for {}", previews.len(), tables.len(), client);
        Ok(Render::Ready(Export { filename: export_filename(&client), client, clients, tables, html, previews }))
    }
}
