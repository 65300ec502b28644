use super::criteria::has_feature;
use super::domain::{FeatureTag, ListingType, PropertyRecord};

const BASE: f32 = 50.0;
const SCORE_WEIGHT: f32 = 0.3;
const FORECLOSURE_BONUS: f32 = 5.0;

const fn feature_bonus(tag: FeatureTag) -> f32 {
    match tag {
        FeatureTag::OwnerFinancing => 15.0,
        FeatureTag::LeaseToOwn => 10.0,
        FeatureTag::FirstTimeBuyerEligible => 10.0,
    }
}

/// Priority assigned once at flow creation, clamped to 0..=100.
pub fn priority_score(record: &PropertyRecord) -> u8 {
    let mut priority = BASE + SCORE_WEIGHT * f32::from(record.score.unwrap_or(0));

    for tag in FeatureTag::ordered() {
        if has_feature(record, tag) {
            priority += feature_bonus(tag);
        }
    }

    if record.listing_type == ListingType::Foreclosure {
        priority += FORECLOSURE_BONUS;
    }

    priority.round().clamp(0.0, 100.0) as u8
}
