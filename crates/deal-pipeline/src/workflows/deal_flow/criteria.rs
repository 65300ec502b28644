//! Stage entry checks. Pure and total: a record missing a field simply fails
//! any predicate that needs it.

use super::catalog::StageCriteria;
use super::domain::{FeatureTag, PropertyFlags, PropertyRecord};

/// Maps a feature tag to the record flag that evidences it.
const FEATURE_FLAGS: [(FeatureTag, fn(&PropertyFlags) -> bool); 3] = [
    (FeatureTag::OwnerFinancing, owner_financing),
    (FeatureTag::LeaseToOwn, lease_to_own),
    (FeatureTag::FirstTimeBuyerEligible, first_time_buyer_eligible),
];

fn owner_financing(flags: &PropertyFlags) -> bool {
    flags.owner_financing
}

fn lease_to_own(flags: &PropertyFlags) -> bool {
    flags.lease_to_own
}

fn first_time_buyer_eligible(flags: &PropertyFlags) -> bool {
    flags.first_time_buyer_eligible
}

pub fn has_feature(record: &PropertyRecord, tag: FeatureTag) -> bool {
    FEATURE_FLAGS
        .iter()
        .find(|(candidate, _)| *candidate == tag)
        .map(|(_, flag)| flag(&record.flags))
        .unwrap_or(false)
}

pub fn evaluate(record: &PropertyRecord, criteria: &StageCriteria) -> bool {
    if let Some(min_score) = criteria.min_score {
        match record.score {
            Some(score) if score >= min_score => {}
            _ => return false,
        }
    }

    if let Some(max_price) = criteria.max_price {
        match record.list_price {
            Some(price) if price <= max_price => {}
            _ => return false,
        }
    }

    if !criteria
        .required_features
        .iter()
        .all(|tag| has_feature(record, *tag))
    {
        return false;
    }

    if !criteria.deal_quality.is_empty() {
        match record.deal_quality {
            Some(quality) if criteria.deal_quality.contains(&quality) => {}
            _ => return false,
        }
    }

    true
}
