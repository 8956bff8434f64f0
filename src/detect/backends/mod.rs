pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{output_tensor, Anchor, ScriptedBackend};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
