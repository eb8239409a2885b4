use std::collections::HashMap;
use anyhow::Result;
use crate::frame::Frame;
use crate::normalize::Normalizer;

pub const INVENTORY_KEY: &str = "TABLE_NAME";
pub const DICTIONARY_KEY: &str = "table_name";

/// Inner join of inventory rows against dictionary rows on the normalized table name.
///
/// Output keeps inventory row order; each inventory row expands to every matching dictionary
/// row in dictionary order. Column names shared by both sides get `_x` / `_y` suffixes.
pub fn inner_join(inventory: &Frame, dictionary: &Frame, norm: &Normalizer) -> Result<Frame> {
    let li = inventory.column_index(INVENTORY_KEY)?;
    let ri = dictionary.column_index(DICTIONARY_KEY)?;
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, r) in dictionary.rows.iter().enumerate() {
        index.entry(norm.normalize(&r[ri])).or_default().push(i);
    }
    let columns = merged_columns(&inventory.columns, &dictionary.columns);
    let mut rows = Vec::new();
    for l in &inventory.rows {
        let Some(matches) = index.get(&norm.normalize(&l[li])) else { continue };
        for &m in matches {
            let mut row = l.clone();
            row.extend(dictionary.rows[m].iter().cloned());
            rows.push(row);
        }
    }
    log::debug!("join: {} inventory x {} dictionary rows -> {} merged", inventory.len(), dictionary.len(), rows.len());
    Ok(Frame { columns, rows })
}

fn merged_columns(left: &[String], right: &[String]) -> Vec<String> {
    let mut out: Vec<String> = left.iter().map(|c| if right.contains(c) { format!("{}_x", c) } else { c.clone() }).collect();
    out.extend(right.iter().map(|c| if left.contains(c) { format!("{}_y", c) } else { c.clone() }));
    out
}
