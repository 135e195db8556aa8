pub mod refinement_ctx;
pub mod refinement_flow;

pub use refinement_ctx::RefinementCtx;
pub use refinement_flow::{RefinementOrchestrator, RefinementRequest, RefinementResult};
