//! The audio engine: registry, loader, bus graph, instances and lifecycle
//! behind one handle.
//!
//! The bus, registry and bookkeeping types always build. The handle itself,
//! with its sample loader and async runtime, needs the `engine` feature.

#[cfg(feature = "engine")]
pub mod backend;
pub mod bus;
#[cfg(feature = "engine")]
mod handle;
#[cfg(feature = "engine")]
pub mod inner;
pub mod instance;
pub mod lifecycle;
#[cfg(feature = "engine")]
pub mod loader;
pub mod pending;
pub mod registry;
pub mod scheduler;

#[cfg(feature = "engine")]
pub use self::handle::{AudioEngine, LOOP_FADE};

pub use self::bus::BusId;
pub use self::instance::PlayOptions;
pub use self::lifecycle::EngineState;
pub use self::registry::{SampleRef, SoundDescriptor, SoundTable};
