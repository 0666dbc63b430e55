use std::path::Path;

use tracing::error;

use crate::store::load_dataset;
use crate::{Lot, Result, DISCOUNT_ATTRIBUTE};

/// Lots carrying the discount attribute with exactly `percentage` as its value name.
///
/// The match is verbatim: `"30%"` and `"30"` are different values.
pub fn filter_by_discount(lots: Vec<Lot>, percentage: &str) -> Vec<Lot> {
    filter_by_attribute(lots, DISCOUNT_ATTRIBUTE, percentage)
}

pub fn filter_by_attribute(lots: Vec<Lot>, full_name: &str, value_name: &str) -> Vec<Lot> {
    lots.into_iter()
        .filter(|lot| {
            lot.attributes().any(|attr| {
                attr.full_name == Some(full_name) && attr.value_name == Some(value_name)
            })
        })
        .collect()
}

/// Loads the dataset at `path` and filters it by discount.
pub fn try_load_and_filter(path: &Path, percentage: &str) -> Result<Vec<Lot>> {
    Ok(filter_by_discount(load_dataset(path)?, percentage))
}

/// Like [`try_load_and_filter`], but a missing or broken file is reported and yields nothing.
pub fn load_and_filter(path: &Path, percentage: &str) -> Vec<Lot> {
    try_load_and_filter(path, percentage).unwrap_or_else(|e| {
        error!(path = %path.display(), error = %e, "couldn't load the lots file");
        Vec::new()
    })
}
