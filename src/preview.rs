use comfy_table::{ContentArrangement, Table};
use crate::frame::Frame;

pub fn frame_table(frame: &Frame) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(frame.columns.clone());
    for r in &frame.rows { table.add_row(r.clone()); }
    table
}

/// Subheading per table followed by its rows; a blank line separates tables.
pub fn render_previews<'a, I>(tables: I, paint: impl Fn(&str) -> String) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Frame)>,
{
    let mut s = String::new();
    for (name, frame) in tables {
        s.push_str(&paint(name));
        s.push('\n');
        s.push_str(&frame_table(frame).to_string());
        s.push_str("\n\n");
    }
    s
}
