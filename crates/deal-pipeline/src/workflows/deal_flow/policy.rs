use super::catalog::{DISCOVERY, EVALUATION, HOT_LEAD, QUALIFICATION};
use super::domain::{DealFlow, DealQuality, PropertyRecord, StageId};

/// Decides where a flow should move next when auto-advancement runs.
///
/// `record` already reflects the flow's latest analysis.
pub trait AdvancementPolicy: Send + Sync {
    fn choose_next_stage(&self, flow: &DealFlow, record: &PropertyRecord) -> Option<StageId>;
}

/// discovery -> qualification -> evaluation -> hot_lead; later stages are manual.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdvancementPolicy;

impl DefaultAdvancementPolicy {
    const EVALUATION_MIN_SCORE: u8 = 60;
    const HOT_LEAD_MIN_SCORE: u8 = 80;
}

impl AdvancementPolicy for DefaultAdvancementPolicy {
    fn choose_next_stage(&self, flow: &DealFlow, record: &PropertyRecord) -> Option<StageId> {
        let score = record.score.unwrap_or(0);

        match flow.current_stage.as_str() {
            DISCOVERY => Some(StageId::from(QUALIFICATION)),
            QUALIFICATION if score >= Self::EVALUATION_MIN_SCORE => Some(StageId::from(EVALUATION)),
            EVALUATION
                if score >= Self::HOT_LEAD_MIN_SCORE
                    && record.deal_quality == Some(DealQuality::Excellent) =>
            {
                Some(StageId::from(HOT_LEAD))
            }
            _ => None,
        }
    }
}
