//! Render graph: a small WebAudio-shaped node graph driven by a sample
//! clock. Sources (oscillators, buffers) feed filters and gains, which feed
//! the buses and finally the destination.

pub mod context;
pub mod node;
pub mod param;

pub use context::{AudioContext, ContextState};
pub use node::{NodeId, ParamKind};
pub use param::AudioParam;
