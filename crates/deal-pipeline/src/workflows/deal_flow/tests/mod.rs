pub(super) mod common;
mod pipeline;
