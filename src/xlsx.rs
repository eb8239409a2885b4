//! Minimal `.xlsx` reader: first worksheet of a workbook into a [`Frame`].
//!
//! Handles shared strings, inline strings, booleans and plain numbers. Number formats
//! (dates included) are not applied; the stored value is emitted as text.
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use anyhow::{anyhow, Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use crate::frame::Frame;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET: &str = "xl/worksheets/sheet1.xml";
/// Column count of an Excel sheet, `A` through `XFD`.
const MAX_COLS: usize = 16_384;

pub fn read_first_sheet(bytes: &[u8]) -> Result<Frame> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).context("not an xlsx archive")?;
    let sheet_path = first_sheet_path(&mut zip)?;
    let shared = match entry_text(&mut zip, SHARED_STRINGS)? { Some(x) => parse_shared_strings(&x)?, None => vec![] };
    let xml = entry_text(&mut zip, &sheet_path)?.ok_or_else(|| anyhow!("worksheet {} missing from archive", sheet_path))?;
    let cells = parse_sheet(&xml, &shared)?;
    log::debug!("xlsx: read {} non-empty rows from {}", cells.len(), sheet_path);
    Ok(to_frame(cells))
}

/// Entry lookup ignores case and accepts backslash separators, as some writers emit them.
fn entry_text(zip: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let wanted = name.replace('\\', "/");
    let found = zip.file_names().find(|n| n.replace('\\', "/").eq_ignore_ascii_case(&wanted)).map(|n| n.to_string());
    let Some(found) = found else { return Ok(None) };
    let mut f = zip.by_name(&found).with_context(|| format!("open {}", found))?;
    let mut s = String::new();
    f.read_to_string(&mut s).with_context(|| format!("read {}", found))?;
    Ok(Some(s))
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn first_sheet_path(zip: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let Some(wb) = entry_text(zip, WORKBOOK)? else { return Ok(FALLBACK_SHEET.to_string()) };
    let mut rid: Option<String> = None;
    let mut rd = Reader::from_str(&wb);
    loop {
        match rd.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                rid = attr(&e, "r:id")?;
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let Some(rid) = rid else { return Ok(FALLBACK_SHEET.to_string()) };
    let Some(rels) = entry_text(zip, WORKBOOK_RELS)? else { return Ok(FALLBACK_SHEET.to_string()) };
    let mut targets: HashMap<String, String> = HashMap::new();
    let mut rd = Reader::from_str(&rels);
    loop {
        match rd.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, "Id")?, attr(&e, "Target")?) { targets.insert(id, target); }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(match targets.get(&rid) {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{}", t),
        None => FALLBACK_SHEET.to_string(),
    })
}

/// Text of each `<si>`, rich-text runs concatenated, phonetic hints skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut rd = Reader::from_str(xml);
    let mut cur = String::new();
    let (mut in_t, mut in_rph) = (false, false);
    loop {
        match rd.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => cur.clear(),
                b"t" => in_t = true,
                b"rPh" => in_rph = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.push(std::mem::take(&mut cur)),
                b"t" => in_t = false,
                b"rPh" => in_rph = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(t) if in_t && !in_rph => cur.push_str(&t.unescape()?),
            Event::CData(t) if in_t && !in_rph => cur.push_str(&String::from_utf8_lossy(&t)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Clone, Copy, PartialEq)]
enum Kind { Number, Shared, Inline, Bool, Other }

fn parse_sheet(xml: &str, shared: &[String]) -> Result<BTreeMap<usize, BTreeMap<usize, String>>> {
    let mut cells: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
    let mut rd = Reader::from_str(xml);
    let (mut row, mut col) = (0usize, 0usize);
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut kind = Kind::Number;
    let mut value = String::new();
    let mut in_value = false;
    loop {
        match rd.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                row = match attr(&e, "r")? { Some(r) => r.parse::<usize>().map(|n| n.saturating_sub(1)).unwrap_or(next_row), None => next_row };
                next_row = row + 1;
                next_col = 0;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                col = cell_col(&e)?.unwrap_or(next_col);
                next_col = col + 1;
                kind = match attr(&e, "t")?.as_deref() {
                    Some("s") => Kind::Shared,
                    Some("inlineStr") => Kind::Inline,
                    Some("b") => Kind::Bool,
                    Some("str") | Some("e") | Some("d") => Kind::Other,
                    _ => Kind::Number,
                };
                value.clear();
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                col = cell_col(&e)?.unwrap_or(next_col);
                next_col = col + 1;
            }
            Event::Start(e) if matches!(e.local_name().as_ref(), b"v" | b"t") => in_value = true,
            Event::End(e) if matches!(e.local_name().as_ref(), b"v" | b"t") => in_value = false,
            Event::Text(t) if in_value => value.push_str(&t.unescape()?),
            Event::CData(t) if in_value => value.push_str(&String::from_utf8_lossy(&t)),
            Event::End(e) if e.local_name().as_ref() == b"c" => {
                let text = if value.is_empty() { String::new() } else { match kind {
                    Kind::Shared => {
                        let idx: usize = value.trim().parse().with_context(|| format!("bad shared string index '{}'", value))?;
                        shared.get(idx).cloned().ok_or_else(|| anyhow!("shared string {} out of range", idx))?
                    }
                    Kind::Bool => if value.trim() == "1" { "True".to_string() } else { "False".to_string() },
                    Kind::Number => number_text(&value),
                    Kind::Inline | Kind::Other => std::mem::take(&mut value),
                } };
                if !text.is_empty() { cells.entry(row).or_default().insert(col, text); }
                value.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}

fn number_text(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Ok(v) if v.is_finite() => format!("{}", v),
        _ => raw.to_string(),
    }
}

/// Column of a `<c>` element from its `r` attribute; a reference that is present but unusable is an error.
fn cell_col(e: &BytesStart) -> Result<Option<usize>> {
    let Some(r) = attr(e, "r")? else { return Ok(None) };
    let (_, col) = cell_ref(&r).ok_or_else(|| anyhow!("bad cell reference '{}'", r))?;
    Ok(Some(col))
}

/// `"AB12"` -> `(11, 27)`, both zero-based. Columns past `XFD` are rejected.
fn cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() { return None; }
    let mut col = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() { return None; }
        col = col.checked_mul(26)?.checked_add(ch.to_ascii_uppercase() as usize - 'A' as usize + 1)?;
        if col > MAX_COLS { return None; }
    }
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// First populated row becomes the header; blank header cells are named `Unnamed: {i}`.
fn to_frame(cells: BTreeMap<usize, BTreeMap<usize, String>>) -> Frame {
    let width = cells.values().filter_map(|r| r.keys().next_back()).max().map(|c| c + 1).unwrap_or(0);
    let mut it = cells.into_values();
    let Some(header) = it.next() else { return Frame::default() };
    let columns = (0..width).map(|i| header.get(&i).cloned().unwrap_or_else(|| format!("Unnamed: {}", i))).collect();
    let rows = it.map(|r| (0..width).map(|i| r.get(&i).cloned().unwrap_or_default()).collect()).collect();
    Frame::new(columns, rows)
}
