mod backend;
pub mod backends;
mod result;
mod slot;

pub use backend::InferenceBackend;
pub use backends::{output_tensor, Anchor, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{Detection, Position};
pub use slot::{ModelSlot, SlotRun};
