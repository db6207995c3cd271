//! Asset catalog entries and code-list parsing.

use std::collections::HashSet;

/// A catalogued asset. `code` is the external symbol, `id` the join key for prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: i64,
    pub code: String,
    pub name: Option<String>,
}

/// An asset definition before it has been assigned an id by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSpec {
    pub code: String,
    pub name: Option<String>,
}

impl AssetSpec {
    pub fn new(code: &str, name: Option<&str>) -> Self {
        Self {
            code: normalize_code(code),
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodeListError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Parse a comma-separated list of asset codes, preserving order.
pub fn parse_codes(input: &str) -> Result<Vec<String>, CodeListError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(CodeListError::EmptyToken);
        }
        let code = normalize_code(trimmed);
        if !seen.insert(code.clone()) {
            return Err(CodeListError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes_basic() {
        let result = parse_codes("BTCUSD,ETHUSD,SOLUSD").unwrap();
        assert_eq!(result, vec!["BTCUSD", "ETHUSD", "SOLUSD"]);
    }

    #[test]
    fn parse_codes_trims_and_uppercases() {
        let result = parse_codes("  btcusd , EthUsd ").unwrap();
        assert_eq!(result, vec!["BTCUSD", "ETHUSD"]);
    }

    #[test]
    fn parse_codes_empty_token() {
        assert!(matches!(
            parse_codes("BTCUSD,,ETHUSD"),
            Err(CodeListError::EmptyToken)
        ));
    }

    #[test]
    fn parse_codes_duplicate() {
        let result = parse_codes("BTCUSD,ethusd,btcusd");
        assert!(matches!(result, Err(CodeListError::DuplicateCode(s)) if s == "BTCUSD"));
    }

    #[test]
    fn asset_spec_drops_blank_names() {
        let spec = AssetSpec::new(" xrpusd ", Some("   "));
        assert_eq!(spec.code, "XRPUSD");
        assert_eq!(spec.name, None);

        let spec = AssetSpec::new("ADAUSD", Some(" Cardano "));
        assert_eq!(spec.name.as_deref(), Some("Cardano"));
    }
}
