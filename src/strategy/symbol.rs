/// Quote assets recognised when splitting concatenated tickers like `BTCUSDT`
pub const DEFAULT_QUOTE_ASSETS: &[&str] = &[
    "USDT", "USDC", "BUSD", "FDUSD", "TUSD", "DAI", "BTC", "ETH", "BNB", "EUR", "USD",
];

const SEPARATORS: &[char] = &['/', '-', '_', ':'];

/// Turns exchange tickers into `BASE/QUOTE` symbols
///
/// Normalization is total: a ticker that already has a separator, or whose
/// suffix is not a known quote asset, passes through unchanged. Callers must
/// check [`is_routable`] before sending anything to an exchange.
#[derive(Debug, Clone)]
pub struct SymbolNormalizer {
    // longest first, so USDT wins over USD
    quote_assets: Vec<String>,
}

impl SymbolNormalizer {
    pub fn new<I, S>(quote_assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut quote_assets: Vec<String> = quote_assets
            .into_iter()
            .map(|q| q.as_ref().trim().to_ascii_uppercase())
            .filter(|q| !q.is_empty())
            .collect();
        quote_assets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        quote_assets.dedup();

        Self { quote_assets }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.contains(SEPARATORS) {
            return trimmed.to_string();
        }

        let upper = trimmed.to_ascii_uppercase();
        for quote in &self.quote_assets {
            if upper.len() <= quote.len() || !upper.ends_with(quote.as_str()) {
                continue;
            }

            let base = &upper[..upper.len() - quote.len()];
            if base.chars().all(|c| c.is_ascii_alphanumeric()) {
                return format!("{}/{}", base, quote);
            }
        }

        trimmed.to_string()
    }
}

impl Default for SymbolNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_ASSETS)
    }
}

/// True for `BASE/QUOTE` with two non-empty alphanumeric legs
pub fn is_routable(symbol: &str) -> bool {
    match symbol.split_once('/') {
        Some((base, quote)) => {
            let leg_ok =
                |leg: &str| !leg.is_empty() && leg.chars().all(|c| c.is_ascii_alphanumeric());
            leg_ok(base) && leg_ok(quote)
        }
        None => false,
    }
}
