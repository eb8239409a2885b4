use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::OnceLock;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod config;
mod frame;
mod html;
mod join;
mod loader;
mod normalize;
mod preview;
mod selector;
mod session;
mod xlsx;

use crate::html::Escaping;
use crate::loader::Source;
use crate::normalize::{Normalizer, DEFAULT_PREFIX};
use crate::session::{Export, Render, Session, MISSING_INPUT_MSG, NO_DATA_MSG};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat { Text, Json }

#[derive(Parser, Debug, Default)]
#[command(
    name = "ddgen",
    about = "Client data dictionary generator",
    long_about = "Joins a master data dictionary workbook with a client table inventory on a normalized table name, then exports the chosen client's tables as a self-contained HTML data dictionary.",
    after_long_help = "Examples:\n  ddgen -d dictionary.xlsx -t client_tables.csv --list\n  ddgen -d dictionary.xlsx -t client_tables.csv -c Acme --all --html acme.html\n  ddgen -d dictionary.xlsx -t client_tables.csv -c Acme --tables KENVUE_ORDERS,KENVUE_ITEMS\n  ddgen -i -d dictionary.xlsx -t client_tables.csv",
    color = ColorChoice::Auto
)]
struct Args {
    /// Data dictionary workbook (.xlsx)
    #[arg(long, short = 'd')]
    dictionary: Option<String>,
    /// Client table inventory (.csv)
    #[arg(long, short = 't')]
    inventory: Option<String>,
    /// Client to export (defaults to the first client in sorted order)
    #[arg(long, short = 'c')]
    client: Option<String>,
    #[arg(long, num_args = 0.., value_delimiter = ',')]
    tables: Vec<String>,
    /// Select every table of the client
    #[arg(long, short = 'a', default_value_t = false)]
    all: bool,
    #[arg(long)]
    html: Option<String>,
    #[arg(long)]
    out_dir: Option<String>,
    /// Also write a page holding a base64 download button for the document
    #[arg(long)]
    download_page: Option<String>,
    /// Organization token removed from table names before joining
    #[arg(long)]
    strip_prefix: Option<String>,
    /// Interpolate cell values without HTML escaping
    #[arg(long, default_value_t = false)]
    raw_html: bool,
    #[arg(long, short = 'i', default_value_t = false)]
    interactive: bool,
    #[arg(long, default_value_t = false)]
    no_preview: bool,
    /// Print clients and the chosen client's tables, then exit
    #[arg(long, default_value_t = false)]
    list: bool,
    #[arg(long, default_value_t = false)]
    no_open: bool,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long)]
    config: Option<String>,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "ddgen", &mut f); } else { clap_complete::generate(sh, &mut cmd, "ddgen", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "ddgen", &mut std::io::stdout());
        }
        return;
    }
    let cfg_err = match config::load_config(args.config.as_deref()) {
        Ok(Some(cfg)) => { apply_config(&mut args, cfg); None }
        Ok(None) => None,
        Err(e) => Some(e),
    };
    init_logging(&args);
    if let Some(e) = cfg_err { log::error!("{:#}", e); std::process::exit(1); }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let _ = ENABLE_COLOR.set(color_default && !args.no_color);
    let res = build_session(&args).and_then(|mut session| {
        if args.interactive {
            let stdin = std::io::stdin();
            run_interactive(&mut session, &args, stdin.lock(), &mut std::io::stdout())
        } else {
            run_batch(&mut session, &args, &mut std::io::stdout())
        }
    });
    if let Err(e) = res {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    let ts = chrono::Local::now().to_rfc3339();
                    let obj = serde_json::json!({
                        "ts": ts,
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
        }
    }
    builder.init();
}

/// Config fills only what the command line left unset.
fn apply_config(args: &mut Args, cfg: config::AppConfig) {
    if args.dictionary.is_none() && let Some(v) = cfg.dictionary { args.dictionary = Some(v); }
    if args.inventory.is_none() && let Some(v) = cfg.inventory { args.inventory = Some(v); }
    if args.client.is_none() && let Some(v) = cfg.client { args.client = Some(v); }
    if args.tables.is_empty() && let Some(v) = cfg.tables { args.tables = v; }
    if !args.all && let Some(v) = cfg.all { args.all = v; }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.out_dir.is_none() && let Some(v) = cfg.out_dir { args.out_dir = Some(v); }
    if args.download_page.is_none() && let Some(v) = cfg.download_page { args.download_page = Some(v); }
    if args.strip_prefix.is_none() && let Some(v) = cfg.strip_prefix { args.strip_prefix = Some(v); }
    if !args.raw_html && let Some(v) = cfg.raw_html { args.raw_html = v; }
    if !args.no_preview && let Some(v) = cfg.no_preview { args.no_preview = v; }
    if !args.no_open && let Some(v) = cfg.no_open { args.no_open = v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

fn build_session(args: &Args) -> Result<Session> {
    let normalizer = Normalizer::new(args.strip_prefix.as_deref().unwrap_or(DEFAULT_PREFIX))?;
    log::debug!("Joining on table names with '{}' and underscores removed", normalizer.prefix());
    let escaping = if args.raw_html { Escaping::Raw } else { Escaping::Escape };
    let mut session = Session::new(normalizer, escaping);
    session.upload(Source::Dictionary, args.dictionary.as_ref().map(PathBuf::from));
    session.upload(Source::Inventory, args.inventory.as_ref().map(PathBuf::from));
    if let Some(c) = args.client.as_ref() { session.choose_client(c); }
    Ok(session)
}

fn run_batch<W: Write>(session: &mut Session, args: &Args, out: &mut W) -> Result<()> {
    if args.list {
        let clients = session.clients()?;
        writeln!(out, "{}", paint(&format!("Clients ({}):", clients.len()), "1"))?;
        for c in &clients { writeln!(out, "  {}", c)?; }
        let tables = session.current_tables()?;
        if let Some(c) = session.client.clone().or_else(|| clients.first().cloned()) {
            writeln!(out, "{}", paint(&format!("Table List for {}: (total {} tables)", c, tables.len()), "1"))?;
            for t in &tables { writeln!(out, "  {}", t)?; }
        }
        return Ok(());
    }
    if args.all { session.request_select_all(); }
    for t in &args.tables {
        if !session.set_table(t, true)? { log::warn!("Table {} is not offered for the selected client", t); }
    }
    let render = session.render()?;
    if let Render::Ready(ex) = &render {
        if ex.previews.is_empty() { log::warn!("No tables selected for {}; use --tables or --all", ex.client); }
        let path = export_path(args, ex);
        write_export(ex, &path, args.download_page.as_deref(), args.quiet, out)?;
        if !args.no_open { open_file_default(path); }
    }
    print_render(&render, !args.no_preview, out)?;
    Ok(())
}

fn export_path(args: &Args, ex: &Export) -> PathBuf {
    match (args.html.as_ref(), args.out_dir.as_ref()) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(dir)) => PathBuf::from(dir).join(&ex.filename),
        (None, None) => PathBuf::from(&ex.filename),
    }
}

fn write_export<W: Write>(ex: &Export, path: &std::path::Path, download_page: Option<&str>, quiet: bool, out: &mut W) -> Result<()> {
    if let Some(parent) = path.parent() && !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &ex.html).with_context(|| format!("HTML write failed for {}", path.display()))?;
    if !quiet { writeln!(out, "{}", paint(&format!("HTML generated: {}", path.display()), "1;36"))?; }
    if let Some(p) = download_page {
        std::fs::write(p, html::download_page(&ex.html, &ex.filename)).with_context(|| format!("Download page write failed for {}", p))?;
        if !quiet { writeln!(out, "{}", paint(&format!("Download page written: {}", p), "1;36"))?; }
    }
    Ok(())
}

fn print_render<W: Write>(render: &Render, with_preview: bool, out: &mut W) -> Result<()> {
    match render {
        Render::MissingInput => writeln!(out, "{}", MISSING_INPUT_MSG)?,
        Render::NoData { client, clients } => {
            writeln!(out, "{}", NO_DATA_MSG)?;
            if let Some(c) = client { writeln!(out, "Client {} has no tables in the data dictionary", c)?; }
            writeln!(out, "{}", paint(&format!("Clients ({}):", clients.len()), "1"))?;
            for c in clients { writeln!(out, "  {}", c)?; }
        }
        Render::Ready(ex) => {
            writeln!(out, "{}", paint(&format!("{} DaaS Data Dictionary", ex.client), "1;36"))?;
            writeln!(out, "Clients: {}", ex.clients.join(", "))?;
            writeln!(out, "{} of {} tables selected", ex.previews.len(), ex.tables.len())?;
            if with_preview {
                let text = preview::render_previews(ex.previews.iter().map(|(n, f)| (n.as_str(), f)), |s| paint(s, "1"));
                write!(out, "{}", text)?;
            }
        }
    }
    Ok(())
}

const SESSION_HELP: &str = "Commands:
  dict <path>        upload the data dictionary (.xlsx); no path clears it
  inventory <path>   upload the client table inventory (.csv); no path clears it
  clients            list clients
  client <name>      choose a client
  tables             list the client's tables with their selection marks
  all                select all tables of the client
  on <table>         select a table
  off <table>        deselect a table
  toggle <table>     flip a table
  show               preview the selected tables
  export [path]      write the HTML document
  clear              drop cached uploads and the selection
  help               this text
  quit               leave the session";

/// Line-oriented session; each command re-runs the whole flow against the current state.
fn run_interactive<R: BufRead, W: Write>(session: &mut Session, args: &Args, input: R, out: &mut W) -> Result<()> {
    writeln!(out, "{}", paint("Client Data Dictionary Generator", "1;36"))?;
    writeln!(out, "Type 'help' for commands.")?;
    for line in input.lines() {
        let line = line?;
        match handle_command(session, args, line.trim(), out) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                log::error!("{:#}", e);
                writeln!(out, "{}", paint(&format!("error: {:#}", e), "31"))?;
            }
        }
    }
    Ok(())
}

fn handle_command<W: Write>(session: &mut Session, args: &Args, line: &str, out: &mut W) -> Result<bool> {
    let (cmd, arg) = match line.split_once(char::is_whitespace) { Some((c, a)) => (c, a.trim()), None => (line, "") };
    let opt_path = |a: &str| if a.is_empty() { None } else { Some(PathBuf::from(a)) };
    match cmd {
        "" => return Ok(true),
        "quit" | "exit" => return Ok(false),
        "help" => { writeln!(out, "{}", SESSION_HELP)?; return Ok(true); }
        "dict" => session.upload(Source::Dictionary, opt_path(arg)),
        "inventory" => session.upload(Source::Inventory, opt_path(arg)),
        "client" => session.choose_client(arg),
        "all" => session.request_select_all(),
        "on" | "off" => {
            if !session.set_table(arg, cmd == "on")? { writeln!(out, "Table {} is not selectable here", arg)?; }
        }
        "toggle" => {
            let on = session.toggle_table(arg)?;
            writeln!(out, "{} {}", arg, if on { "selected" } else { "deselected" })?;
        }
        "clear" => { session.clear(); writeln!(out, "Cache and selection cleared")?; }
        "clients" => {
            for c in session.clients()? { writeln!(out, "  {}", c)?; }
            return Ok(true);
        }
        "tables" => {
            let tables = session.current_tables()?;
            writeln!(out, "Table List: (total {} tables)", tables.len())?;
            for t in &tables { writeln!(out, "  [{}] {}", if session.selection.is_selected(t) { "x" } else { " " }, t)?; }
            return Ok(true);
        }
        "show" => {
            let render = session.render()?;
            print_render(&render, true, out)?;
            return Ok(true);
        }
        "export" => {
            let render = session.render()?;
            if let Render::Ready(ex) = &render {
                let path = if arg.is_empty() { export_path(args, ex) } else { PathBuf::from(arg) };
                write_export(ex, &path, args.download_page.as_deref(), false, out)?;
            } else {
                print_render(&render, false, out)?;
            }
            return Ok(true);
        }
        other => { writeln!(out, "Unknown command '{}'; type 'help'", other)?; return Ok(true); }
    }
    let render = session.render()?;
    print_render(&render, false, out)?;
    Ok(true)
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&false) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(target_os = "windows")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("cmd").args(["/C", "start", "", &s]).spawn()
        .map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(target_os = "macos")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("xdg-open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args { no_open: true, strip_prefix: Some("PREFIX".to_string()), ..Default::default() }
    }

    fn fixtures(tag: &str) -> (String, String) {
        let dir = std::env::temp_dir();
        let d = dir.join(format!("ddgen_main_{}.xlsx", tag));
        let i = dir.join(format!("ddgen_main_{}.csv", tag));
        std::fs::write(&d, crate::xlsx::tests::build_xlsx(&[&["table_name", "column_name", "notes"], &["ORDERS", "id", "primary key"], &["ORDERS", "amount", ""], &["ITEMS", "sku", ""]])).unwrap();
        std::fs::write(&i, "CLIENT,TABLE_SCHEMA,TABLE_NAME\nAcme,SALES,PREFIX_ORDERS\nAcme,SALES,ITEMS\n").unwrap();
        (d.to_string_lossy().into_owned(), i.to_string_lossy().into_owned())
    }

    fn text(buf: Vec<u8>) -> String { String::from_utf8(buf).unwrap() }

    #[test]
    fn batch_without_uploads_prompts() {
        let args = base_args();
        let mut s = build_session(&args).unwrap();
        let mut out = Vec::new();
        run_batch(&mut s, &args, &mut out).unwrap();
        assert_eq!(text(out).trim(), MISSING_INPUT_MSG);
    }

    #[test]
    fn batch_writes_document_and_preview() {
        let (d, i) = fixtures("batch");
        let html_path = std::env::temp_dir().join("ddgen_main_batch.html");
        let args = Args { dictionary: Some(d.clone()), inventory: Some(i.clone()), client: Some("Acme".into()), tables: vec!["PREFIX_ORDERS".into()], html: Some(html_path.to_string_lossy().into_owned()), ..base_args() };
        let mut s = build_session(&args).unwrap();
        let mut out = Vec::new();
        run_batch(&mut s, &args, &mut out).unwrap();
        let out = text(out);
        assert!(out.contains("HTML generated"));
        assert!(out.contains("1 of 2 tables selected"));
        assert!(out.contains("primary key"));
        let doc = std::fs::read_to_string(&html_path).unwrap();
        assert_eq!(doc.matches("<h2 id=").count(), 1);
        for p in [d, i] { let _ = std::fs::remove_file(p); }
        let _ = std::fs::remove_file(&html_path);
    }

    #[test]
    fn batch_list_prints_clients_and_tables() {
        let (d, i) = fixtures("list");
        let args = Args { dictionary: Some(d.clone()), inventory: Some(i.clone()), list: true, ..base_args() };
        let mut s = build_session(&args).unwrap();
        let mut out = Vec::new();
        run_batch(&mut s, &args, &mut out).unwrap();
        let out = text(out);
        assert!(out.contains("Clients (1):"));
        assert!(out.contains("total 2 tables"));
        for p in [d, i] { let _ = std::fs::remove_file(p); }
    }

    #[test]
    fn session_commands_drive_selection() {
        let (d, i) = fixtures("repl");
        let export = std::env::temp_dir().join("ddgen_main_repl.html");
        let args = base_args();
        let mut s = build_session(&args).unwrap();
        let script = format!("show\ndict {}\ninventory {}\nclient Acme\nall\noff ITEMS\ntables\nexport {}\nbogus\nquit\nshow\n", d, i, export.to_string_lossy());
        let mut out = Vec::new();
        run_interactive(&mut s, &args, script.as_bytes(), &mut out).unwrap();
        let out = text(out);
        assert!(out.contains(MISSING_INPUT_MSG));
        assert!(out.contains("2 of 2 tables selected"));
        assert!(out.contains("[ ] ITEMS"));
        assert!(out.contains("[x] PREFIX_ORDERS"));
        assert!(out.contains("Unknown command 'bogus'"));
        assert_eq!(out.matches("tables selected").count(), 4);
        let doc = std::fs::read_to_string(&export).unwrap();
        assert!(doc.contains("id=\"PREFIX_ORDERS\""));
        assert!(!doc.contains("id=\"ITEMS\""));
        for p in [d, i] { let _ = std::fs::remove_file(p); }
        let _ = std::fs::remove_file(&export);
    }

    #[test]
    fn no_data_lists_available_clients() {
        let render = Render::NoData { client: Some("Ghost".into()), clients: vec!["Acme".into(), "Beta".into()] };
        let mut out = Vec::new();
        print_render(&render, true, &mut out).unwrap();
        let out = text(out);
        assert!(out.starts_with(NO_DATA_MSG));
        assert!(out.contains("Client Ghost has no tables"));
        assert!(out.contains("Clients (2):\n  Acme\n  Beta\n"));
    }

    #[test]
    fn config_fills_only_unset_fields() {
        let mut a = Args { client: Some("Cli".into()), ..base_args() };
        let cfg = config::AppConfig { client: Some("Cfg".into()), inventory: Some("inv.csv".into()), all: Some(true), ..Default::default() };
        apply_config(&mut a, cfg);
        assert_eq!(a.client.as_deref(), Some("Cli"));
        assert_eq!(a.inventory.as_deref(), Some("inv.csv"));
        assert!(a.all);
    }

    #[test]
    fn export_path_prefers_html_then_out_dir() {
        let ex = Export { client: "Acme".into(), clients: vec![], tables: vec![], filename: "Acme_DaaS_Data_Dictionary.html".into(), html: String::new(), previews: vec![] };
        let a = Args { out_dir: Some("out".into()), ..base_args() };
        assert_eq!(export_path(&a, &ex), PathBuf::from("out").join("Acme_DaaS_Data_Dictionary.html"));
        let a = Args { html: Some("x.html".into()), ..a };
        assert_eq!(export_path(&a, &ex), PathBuf::from("x.html"));
    }
}
