use super::normalizer::{normalize_cell, parse_flag, parse_price, parse_score};
use super::DiscoveryImportError;
use crate::workflows::deal_flow::domain::{DealQuality, ListingType, PropertyFlags, PropertyRecord};
use serde::{Deserialize, Deserializer};
use std::io::Read;

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<PropertyRecord>, DiscoveryImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<DiscoveryRow>().enumerate() {
        let row = row?;
        if let Some(record) = row.into_record(index + 1)? {
            records.push(record);
        }
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct DiscoveryRow {
    #[serde(rename = "Property ID", default, deserialize_with = "empty_string_as_none")]
    property_id: Option<String>,
    #[serde(rename = "Address", default, deserialize_with = "empty_string_as_none")]
    address: Option<String>,
    #[serde(rename = "List Price", default, deserialize_with = "empty_string_as_none")]
    list_price: Option<String>,
    #[serde(rename = "Score", default, deserialize_with = "empty_string_as_none")]
    score: Option<String>,
    #[serde(rename = "Deal Quality", default, deserialize_with = "empty_string_as_none")]
    deal_quality: Option<String>,
    #[serde(rename = "Listing Type", default, deserialize_with = "empty_string_as_none")]
    listing_type: Option<String>,
    #[serde(rename = "Owner Financing", default, deserialize_with = "empty_string_as_none")]
    owner_financing: Option<String>,
    #[serde(rename = "Lease To Own", default, deserialize_with = "empty_string_as_none")]
    lease_to_own: Option<String>,
    #[serde(rename = "First Time Buyer", default, deserialize_with = "empty_string_as_none")]
    first_time_buyer: Option<String>,
}

impl DiscoveryRow {
    /// `row` is 1-based over data rows. Rows without a property id yield `None`.
    fn into_record(self, row: usize) -> Result<Option<PropertyRecord>, DiscoveryImportError> {
        let Some(id) = self.property_id else {
            return Ok(None);
        };

        let invalid = |column: &'static str, value: &str| DiscoveryImportError::InvalidField {
            row,
            column,
            value: value.to_string(),
        };

        let list_price = self
            .list_price
            .as_deref()
            .map(|value| parse_price(value).ok_or_else(|| invalid("List Price", value)))
            .transpose()?;
        let score = self
            .score
            .as_deref()
            .map(|value| parse_score(value).ok_or_else(|| invalid("Score", value)))
            .transpose()?;
        let deal_quality = self
            .deal_quality
            .as_deref()
            .map(|value| {
                DealQuality::from_label(&normalize_cell(value))
                    .ok_or_else(|| invalid("Deal Quality", value))
            })
            .transpose()?;
        let listing_type = self
            .listing_type
            .as_deref()
            .map(|value| ListingType::from_label(value).ok_or_else(|| invalid("Listing Type", value)))
            .transpose()?
            .unwrap_or_default();

        let flag = |column: &'static str, value: Option<&str>| -> Result<bool, DiscoveryImportError> {
            match value {
                None => Ok(false),
                Some(value) => parse_flag(value).ok_or_else(|| invalid(column, value)),
            }
        };
        let flags = PropertyFlags {
            owner_financing: flag("Owner Financing", self.owner_financing.as_deref())?,
            lease_to_own: flag("Lease To Own", self.lease_to_own.as_deref())?,
            first_time_buyer_eligible: flag("First Time Buyer", self.first_time_buyer.as_deref())?,
        };

        Ok(Some(PropertyRecord {
            address: self.address.unwrap_or_default(),
            list_price,
            score,
            deal_quality,
            listing_type,
            flags,
            ..PropertyRecord::new(id)
        }))
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
