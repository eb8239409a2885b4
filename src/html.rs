use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use crate::frame::Frame;

/// Whether cell values and names are escaped before interpolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Escaping {
    #[default]
    Escape,
    /// Verbatim interpolation; markup in a cell is rendered as markup.
    Raw,
}

impl Escaping {
    fn apply(self, s: &str) -> String {
        match self { Escaping::Escape => html_escape(s), Escaping::Raw => s.to_string() }
    }
}

const STYLE: &str = "body{font-family:Arial,sans-serif;margin:0;padding:20px} h1{color:#333} h2{color:#666;margin-top:30px} table{width:100%;border-collapse:collapse;margin-bottom:20px} th,td{border:1px solid #ddd;padding:8px;text-align:left} th{background-color:#f2f2f2} .toc{background-color:#f9f9f9;padding:20px;margin-bottom:30px} .toc ul{list-style-type:none;padding-left:20px}";

pub fn render_table(frame: &Frame, esc: Escaping) -> String {
    let mut s = String::new();
    s.push_str("<table style='width:100%; border-collapse: collapse; margin-bottom: 20px;'>");
    s.push_str("<tr style='background-color: #f2f2f2;'>");
    for c in &frame.columns { s.push_str(&format!("<th style='border: 1px solid #ddd; padding: 8px; text-align: left;'>{}</th>", esc.apply(c))); }
    s.push_str("</tr>");
    for r in &frame.rows {
        s.push_str("<tr>");
        for v in r { s.push_str(&format!("<td style='border: 1px solid #ddd; padding: 8px;'>{}</td>", esc.apply(v))); }
        s.push_str("</tr>");
    }
    s.push_str("</table>");
    s
}

/// Whole page: title, table of contents, then one anchored section per table in iteration order.
pub fn render_document<'a, I>(client: &str, tables: I, esc: Escaping) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Frame)>,
{
    let tables: Vec<(&str, &Frame)> = tables.into_iter().collect();
    let title = format!("{} DaaS Data Dictionary", esc.apply(client));
    let mut s = String::new();
    s.push_str("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">");
    s.push_str(&format!("<title>{}</title><style>{}</style></head><body>\n", title, STYLE));
    s.push_str(&format!("<h1>{}</h1>\n", title));
    s.push_str("<div class=\"toc\"><h2>Contents</h2><ul>");
    for (name, _) in &tables {
        let n = esc.apply(name);
        s.push_str(&format!("<li><a href=\"#{}\">{}</a></li>", n, n));
    }
    s.push_str("</ul></div>\n");
    for (name, frame) in &tables {
        let n = esc.apply(name);
        s.push_str(&format!("<h2 id=\"{}\">{}</h2>", n, n));
        s.push_str(&render_table(frame, esc));
        s.push('\n');
    }
    s.push_str("</body></html>\n");
    s
}

/// Anchor carrying the document as a base64 data URI so a browser saves it under `filename`.
pub fn download_link(html: &str, filename: &str) -> String {
    let b64 = B64.encode(html.as_bytes());
    format!("<a href=\"data:text/html;base64,{}\" download=\"{}\"><button style=\"padding: 10px 20px; background-color: #4CAF50; color: white; border: none; border-radius: 5px; cursor: pointer;\">Download HTML Data Dictionary</button></a>", b64, html_escape(filename))
}

pub fn download_page(html: &str, filename: &str) -> String {
    format!("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{}</title></head><body style=\"font-family:Arial,sans-serif;padding:20px\">{}</body></html>\n", html_escape(filename), download_link(html, filename))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn orders() -> Frame {
        Frame::new(
            vec!["TABLE_SCHEMA".into(), "TABLE_NAME".into(), "column_name".into(), "notes".into()],
            vec![vec!["S".into(), "PREFIX_ORDERS".into(), "id".into(), "pk".into()], vec!["S".into(), "PREFIX_ORDERS".into(), "amount".into(), "".into()]],
        )
    }

    fn capture(re: &str, doc: &str) -> Vec<String> {
        Regex::new(re).unwrap().captures_iter(doc).map(|c| c[1].to_string()).collect()
    }

    #[test]
    fn toc_anchors_match_headings() {
        let a = orders();
        let b = orders();
        let doc = render_document("Acme", [("B_TABLE", &a), ("A_TABLE", &b)], Escaping::Escape);
        let links = capture(r##"<a href="#([^"]*)""##, &doc);
        let ids = capture(r#"<h2 id="([^"]*)""#, &doc);
        assert_eq!(links, vec!["B_TABLE", "A_TABLE"]);
        assert_eq!(links, ids);
        assert!(doc.contains("<title>Acme DaaS Data Dictionary</title>"));
    }

    #[test]
    fn zero_tables_still_valid_shell() {
        let doc = render_document("Acme", std::iter::empty(), Escaping::Escape);
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<ul></ul>"));
        assert!(doc.trim_end().ends_with("</html>"));
        assert!(!doc.contains("<table"));
    }

    #[test]
    fn table_has_header_and_rows() {
        let t = render_table(&orders(), Escaping::Escape);
        assert_eq!(t.matches("<th ").count(), 4);
        assert_eq!(t.matches("<tr>").count(), 2);
        assert!(t.contains(">amount</td>"));
    }

    #[test]
    fn cells_escaped_by_default() {
        let f = Frame::new(vec!["notes".into()], vec![vec!["<script>alert(1)</script> & \"q\"".into()]]);
        let t = render_table(&f, Escaping::Escape);
        assert!(!t.contains("<script>"));
        assert!(t.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; &quot;q&quot;"));
    }

    #[test]
    fn raw_mode_interpolates_verbatim() {
        let f = Frame::new(vec!["notes".into()], vec![vec!["<b>bold</b>".into()]]);
        assert!(render_table(&f, Escaping::Raw).contains("<td style='border: 1px solid #ddd; padding: 8px;'><b>bold</b></td>"));
    }

    #[test]
    fn download_link_round_trips() {
        let doc = "<html>hi</html>";
        let link = download_link(doc, "Acme_DaaS_Data_Dictionary.html");
        assert!(link.contains("download=\"Acme_DaaS_Data_Dictionary.html\""));
        let enc = capture(r"base64,([A-Za-z0-9+/=]+)", &link);
        assert_eq!(B64.decode(&enc[0]).unwrap(), doc.as_bytes());
        assert!(download_page(doc, "x.html").contains("Download HTML Data Dictionary"));
    }
}
