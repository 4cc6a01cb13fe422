pub mod generation_flow;
pub mod review;

pub use generation_flow::{CancelHandle, FlowDeps, GenerationFlow, ProcessingFlag, ProcessingGuard};
