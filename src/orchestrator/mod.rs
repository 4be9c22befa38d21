// Pipeline orchestration: polling loop and inbound signals
pub mod continuous;
pub mod listener;
pub mod payload;
pub mod pipeline;

pub use continuous::run_continuous;
pub use listener::run_listener;
pub use payload::{parse_payload, DEFAULT_TIMEFRAME};
pub use pipeline::{bar_signal_id, Pipeline, PipelineReport};
