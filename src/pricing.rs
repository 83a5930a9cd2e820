//! Quantity-break price tables.
//!
//! A product page lists price tiers as (quantity label, price) pairs such as
//! ("1,000+", "$0.0050"). They are normalized into one line sorted by
//! quantity threshold: `10+: $0.0080, 100+: $0.0060, 1,000+: $0.0050`.

use regex::Regex;
use std::fmt::Display;
use thiserror::Error;

/// Value written when no usable tier table exists
pub const NOT_AVAILABLE: &str = "N/A";

const TIER_SEPARATOR: &str = ", ";
const LABEL_SEPARATOR: &str = ": ";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PricingError {
    #[error("No bulk price blocks found")]
    NoBlocks,

    #[error("Invalid quantity label '{0}'")]
    InvalidQuantity(String),
}

/// One quantity/price pair as read from the page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTier {
    pub quantity: String,
    pub price: String,
}

impl RawTier {
    pub fn new(quantity: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            quantity: quantity.into(),
            price: price.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceTier {
    /// Quantity the price starts at
    pub threshold: u64,
    /// Quantity label as displayed
    pub label: String,
    pub price: String,
}

/// Tiers with unique thresholds in ascending order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceTiers(Vec<PriceTier>);

impl PriceTiers {
    pub fn tiers(&self) -> &[PriceTier] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for PriceTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, tier) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(TIER_SEPARATOR)?;
            }
            write!(f, "{}{}{}", tier.label, LABEL_SEPARATOR, tier.price)?;
        }
        Ok(())
    }
}

/// Parses a quantity label into its threshold: the digits left after
/// dropping "+" and thousands separators
///
/// # Examples
/// "1,000+" is 1000, "50" is 50; "≥50", "+" and "" are errors
pub fn quantity_threshold(label: &str) -> Result<u64, PricingError> {
    let pattern = Regex::new(r"^[0-9,+]+$").expect("Hardcode regex pattern");
    let label = label.trim();
    if !pattern.is_match(label) {
        return Err(PricingError::InvalidQuantity(label.to_owned()));
    }
    label
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<u64>()
        .map_err(|_| PricingError::InvalidQuantity(label.to_owned()))
}

/// Orders raw tiers by threshold; a later tier with the same threshold
/// replaces the earlier one
///
/// # Arguments
/// * `raw` - Tiers in page order
///
/// # Returns
/// The normalized tiers, or an error if there are none or any quantity label
/// does not parse
pub fn normalize(raw: &[RawTier]) -> Result<PriceTiers, PricingError> {
    if raw.is_empty() {
        return Err(PricingError::NoBlocks);
    }

    let mut tiers: Vec<PriceTier> = Vec::with_capacity(raw.len());
    for tier in raw {
        let threshold = quantity_threshold(&tier.quantity)?;
        let entry = PriceTier {
            threshold,
            label: tier.quantity.trim().to_owned(),
            price: tier.price.trim().to_owned(),
        };
        match tiers.iter_mut().find(|existing| existing.threshold == threshold) {
            Some(existing) => *existing = entry,
            None => tiers.push(entry),
        }
    }
    tiers.sort_by_key(|tier| tier.threshold);
    Ok(PriceTiers(tiers))
}

/// Renders tiers as `"label: price"` joined by `", "`
pub fn render(tiers: &PriceTiers) -> String {
    tiers.to_string()
}

/// Normalizes and renders; any failure collapses to "N/A"
pub fn normalize_to_display(raw: &[RawTier]) -> String {
    match normalize(raw) {
        Ok(tiers) => render(&tiers),
        Err(_) => NOT_AVAILABLE.to_owned(),
    }
}

/// Splits a rendered tier line back into raw tiers. "N/A" and empty text
/// have none; pieces without a label separator are skipped.
pub fn parse_rendered(rendered: &str) -> Vec<RawTier> {
    let rendered = rendered.trim();
    if rendered.is_empty() || rendered == NOT_AVAILABLE {
        return Vec::new();
    }
    rendered
        .split(TIER_SEPARATOR)
        .filter_map(|piece| piece.split_once(LABEL_SEPARATOR))
        .map(|(quantity, price)| RawTier::new(quantity, price))
        .collect()
}
