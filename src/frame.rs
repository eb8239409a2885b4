use anyhow::{bail, Result};

/// Column-named table of string cells, the in-memory shape of both uploads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows.into_iter().map(|mut r| { r.resize(width, String::new()); r }).collect();
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => Ok(i),
            None => bail!("missing column '{}'", name),
        }
    }

    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |r| r[idx].as_str()))
    }

    /// Rows whose `column` cell equals `value`, same column layout.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Frame> {
        let idx = self.column_index(column)?;
        let rows = self.rows.iter().filter(|r| r[idx] == value).cloned().collect();
        Ok(Frame { columns: self.columns.clone(), rows })
    }

    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let idxs = names.iter().map(|n| self.column_index(n)).collect::<Result<Vec<_>>>()?;
        let rows = self.rows.iter().map(|r| idxs.iter().map(|&i| r[i].clone()).collect()).collect();
        Ok(Frame { columns: names.iter().map(|n| n.to_string()).collect(), rows })
    }

    /// Distinct values of a column in lexicographic order.
    pub fn distinct_sorted(&self, name: &str) -> Result<Vec<String>> {
        let mut out: Vec<String> = self.column_values(name)?.map(|s| s.to_string()).collect();
        out.sort();
        out.dedup();
        Ok(out)
    }
}
