//! Pip-value rules keyed by instrument class. A pip is the smallest quoted
//! increment conventionally used for the instrument, not necessarily one
//! tick of the feed.

const INDEX_SYMBOLS: [&str; 8] = [
    "NAS100", "US30", "US500", "GER40", "UK100", "SPX500", "FRA40", "JPN225",
];

const METAL_PREFIXES: [&str; 2] = ["XAU", "XAG"];

/// Decimal size of one pip for the given symbol.
///
/// JPY-quoted pairs quote two decimals, so a pip is 0.01. Major indices are
/// quoted in whole points. Metals move in cents. Everything else is treated
/// as a standard 4-decimal forex pair.
pub fn pip_size(symbol: &str) -> f64 {
    let upper = symbol.trim().to_ascii_uppercase();

    if INDEX_SYMBOLS.contains(&upper.as_str()) {
        return 1.0;
    }
    if METAL_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
    {
        return 0.01;
    }
    if upper.ends_with("JPY") {
        return 0.01;
    }

    0.0001
}

/// Signed price difference expressed in pips for the symbol.
pub fn price_to_pips(symbol: &str, price_delta: f64) -> f64 {
    price_delta / pip_size(symbol)
}

/// Pip distance converted back to a price offset.
pub fn pips_to_price(symbol: &str, pips: f64) -> f64 {
    pips * pip_size(symbol)
}
