use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "ddgen.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    pub dictionary: Option<String>,
    pub inventory: Option<String>,
    pub client: Option<String>,
    pub tables: Option<Vec<String>>,
    pub all: Option<bool>,
    pub html: Option<String>,
    pub out_dir: Option<String>,
    pub download_page: Option<String>,
    pub strip_prefix: Option<String>,
    pub raw_html: Option<bool>, // keep cell markup unescaped
    pub no_preview: Option<bool>,
    pub no_open: Option<bool>,
    pub log_format: Option<crate::LogFormat>,
    pub log_path: Option<String>,
}

/// Explicit path must parse; the implicit `ddgen.toml` is optional and silently skipped when absent.
pub fn load_config(path_opt: Option<&str>) -> anyhow::Result<Option<AppConfig>> {
    let (path, explicit) = match path_opt { Some(p) => (p.to_string(), true), None => (DEFAULT_CONFIG.to_string(), false) };
    let p = std::path::PathBuf::from(&path);
    let data = match std::fs::read_to_string(&p) {
        Ok(d) => d,
        Err(e) if explicit => return Err(anyhow::anyhow!("Failed to read config {}: {}", p.to_string_lossy(), e)),
        Err(_) => return Ok(None),
    };
    let cfg: AppConfig = toml::from_str(&data).map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", p.to_string_lossy(), e))?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let p = std::env::temp_dir().join("ddgen_cfg_full.toml");
        std::fs::write(&p, "dictionary = \"d.xlsx\"\ninventory = \"c.csv\"\nclient = \"Acme\"\ntables = [\"A\", \"B\"]\nstrip_prefix = \"PREFIX\"\nraw_html = true\nlog_format = \"json\"\n").unwrap();
        let cfg = load_config(Some(&p.to_string_lossy())).unwrap().unwrap();
        assert_eq!(cfg.client.as_deref(), Some("Acme"));
        assert_eq!(cfg.tables.unwrap(), vec!["A", "B"]);
        assert_eq!(cfg.raw_html, Some(true));
        assert!(matches!(cfg.log_format, Some(crate::LogFormat::Json)));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        assert!(load_config(Some("/nonexistent/ddgen.toml")).is_err());
    }

    #[test]
    fn unknown_keys_are_ignored_but_bad_types_fail() {
        let p = std::env::temp_dir().join("ddgen_cfg_bad.toml");
        std::fs::write(&p, "all = \"yes\"\n").unwrap();
        assert!(load_config(Some(&p.to_string_lossy())).is_err());
        std::fs::write(&p, "colour = 3\n").unwrap();
        assert!(load_config(Some(&p.to_string_lossy())).unwrap().is_some());
        let _ = std::fs::remove_file(&p);
    }
}
