use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_PREFIX: &str = "KENVUE";

/// Builds the join key for a table name by dropping the organization prefix token and underscores.
#[derive(Clone, Debug)]
pub struct Normalizer {
    prefix: String,
    re: Regex,
}

impl Normalizer {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = if prefix.is_empty() { "_".to_string() } else { format!("{}|_", regex::escape(prefix)) };
        let re = Regex::new(&pattern).with_context(|| format!("invalid strip prefix '{}'", prefix))?;
        Ok(Self { prefix: prefix.to_string(), re })
    }

    pub fn prefix(&self) -> &str { &self.prefix }

    /// Strips until a fixpoint so that removals which splice a new token together are also caught.
    pub fn normalize(&self, name: &str) -> String {
        let mut cur = name.to_string();
        loop {
            let next = self.re.replace_all(&cur, "").into_owned();
            if next == cur { return cur; }
            cur = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_underscores() {
        let n = Normalizer::new(DEFAULT_PREFIX).unwrap();
        assert_eq!(n.normalize("KENVUE_SALES_ORDERS"), "SALESORDERS");
        assert_eq!(n.normalize("SALES_ORDERS"), "SALESORDERS");
        assert_eq!(n.normalize("Kenvue_orders"), "Kenvueorders");
    }

    #[test]
    fn idempotent_on_spliced_tokens() {
        let n = Normalizer::new(DEFAULT_PREFIX).unwrap();
        let once = n.normalize("KEN_VUE_X");
        assert_eq!(once, "X");
        for s in ["", "___", "KENVUEKENVUE", "a_KENKENVUEVUE_b", "日本_語"] {
            let x = n.normalize(s);
            assert_eq!(n.normalize(&x), x);
        }
    }

    #[test]
    fn prefix_is_literal() {
        let n = Normalizer::new("A.B").unwrap();
        assert_eq!(n.normalize("A.B_T"), "T");
        assert_eq!(n.normalize("AxB_T"), "AxBT");
    }

    #[test]
    fn empty_prefix_only_strips_underscores() {
        let n = Normalizer::new("").unwrap();
        assert_eq!(n.normalize("PREFIX_ORDERS"), "PREFIXORDERS");
        assert_eq!(n.prefix(), "");
    }

    #[test]
    fn spellings_join_to_same_key() {
        let n = Normalizer::new("PREFIX").unwrap();
        assert_eq!(n.normalize("PREFIX_ORDERS"), n.normalize("ORDERS"));
        assert_eq!(n.normalize("OR_DERS"), n.normalize("ORDERS"));
    }
}
