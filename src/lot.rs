use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One lot card as the API returns it.
///
/// The whole JSON object is kept, so fields the crate never reads survive a
/// fetch-and-persist round trip untouched. Only `id`, `lotName`, `biddEndTime`
/// and `attributes` have accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lot(Map<String, Value>);

impl Lot {
    /// The lot identifier. Numeric ids are rendered as their decimal string.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("lotName").and_then(Value::as_str)
    }

    pub fn bidd_end_time(&self) -> Option<&str> {
        self.0.get("biddEndTime").and_then(Value::as_str)
    }

    /// Attributes in their original order. Entries that aren't objects are skipped.
    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'_>> {
        self.0
            .get("attributes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Attribute::from_value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for Lot {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Lot(map)),
            _ => Err(Error::LotNotObject),
        }
    }
}

/// Borrowed view of one entry of a lot's `attributes` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub full_name: Option<&'a str>,
    /// Human readable name of the attribute's value object.
    pub value_name: Option<&'a str>,
}

impl<'a> Attribute<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Attribute {
            full_name: obj.get("fullName").and_then(Value::as_str),
            value_name: obj
                .get("value")
                .and_then(|v| v.get("name"))
                .and_then(Value::as_str),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    New,
    Old,
    Unknown,
}

impl Freshness {
    pub fn classify(bidd_end_time: &str) -> Self {
        Self::classify_at(bidd_end_time, Utc::now())
    }

    /// Bidding that ends strictly after `now` is `New`.
    pub fn classify_at(bidd_end_time: &str, now: DateTime<Utc>) -> Self {
        match parse_end_time(bidd_end_time) {
            Some(end) if end.with_timezone(&Utc) > now => Freshness::New,
            Some(_) => Freshness::Old,
            None => Freshness::Unknown,
        }
    }
}

/// `2025-03-01T12:00:00.123+03:00`. The fractional seconds are mandatory, the offset
/// may be written with or without a colon.
fn parse_end_time(s: &str) -> Option<DateTime<FixedOffset>> {
    let (_, time) = s.split_once('T')?;
    if !time.contains('.') {
        return None;
    }
    DateTime::parse_from_str(s, END_TIME_FORMAT).ok()
}

const END_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Freshness::New => "New",
            Freshness::Old => "Old",
            Freshness::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

pub fn lot_link(host: &str, id: &str) -> String {
    format!("https://{host}/new/public/lots/lot/{id}?fromRec=false")
}

/// What a result table shows for one lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotRow {
    pub name: String,
    pub freshness: Freshness,
    pub link: String,
}

impl LotRow {
    pub fn from_lot(lot: &Lot, host: &str) -> Self {
        let freshness = lot
            .bidd_end_time()
            .map(Freshness::classify)
            .unwrap_or(Freshness::Unknown);
        let id = lot.id().unwrap_or_else(|| "N/A".into());

        LotRow {
            name: lot.name().unwrap_or("N/A").to_string(),
            freshness,
            link: lot_link(host, &id),
        }
    }
}

impl fmt::Display for LotRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<60} | {:<7} | {}",
            self.name.trim(),
            self.freshness,
            self.link
        )
    }
}
