pub mod deal_flow;
pub mod discovery;
