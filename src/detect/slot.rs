use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use anyhow::Result;
use ndarray::{ArrayD, ArrayView4};

use super::backend::InferenceBackend;

/// Outcome of attempting inference through a [`ModelSlot`].
#[derive(Debug)]
pub enum SlotRun {
    /// No backend is loaded.
    Unavailable,
    /// Another caller holds the model; this call was not run.
    Busy,
    /// The backend ran.
    Ran(Result<ArrayD<f32>>),
}

/// Holder for the single loaded model.
///
/// The backend lives behind a `Mutex` because `InferenceBackend::run` takes
/// `&mut self`. Inference goes through `try_run`, which never waits on the
/// lock: a caller arriving while another inference is in flight gets
/// `SlotRun::Busy` instead of re-entering the model.
pub struct ModelSlot {
    backend: Mutex<Option<Box<dyn InferenceBackend>>>,
    loaded: AtomicBool,
}

impl ModelSlot {
    pub fn empty() -> Self {
        Self {
            backend: Mutex::new(None),
            loaded: AtomicBool::new(false),
        }
    }

    /// Warm up and install a backend, replacing any previous one.
    ///
    /// Waits for an in-flight inference on the previous backend to finish.
    pub fn load<B: InferenceBackend + 'static>(&self, mut backend: B) -> Result<()> {
        backend.warm_up()?;
        let name = backend.name();
        let mut guard = self.lock();
        *guard = Some(Box::new(backend));
        self.loaded.store(true, Ordering::SeqCst);
        log::info!("model slot: loaded backend {}", name);
        Ok(())
    }

    /// Remove the current backend, if any.
    pub fn unload(&self) {
        let mut guard = self.lock();
        if let Some(backend) = guard.take() {
            log::info!("model slot: unloaded backend {}", backend.name());
        }
        self.loaded.store(false, Ordering::SeqCst);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Name of the loaded backend. Waits for any in-flight inference.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.lock().as_ref().map(|backend| backend.name())
    }

    /// Run inference unless the model is absent or already in use.
    pub fn try_run(&self, input: ArrayView4<'_, f32>) -> SlotRun {
        if !self.is_loaded() {
            return SlotRun::Unavailable;
        }
        let mut guard = match self.backend.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return SlotRun::Busy,
            Err(TryLockError::Poisoned(poisoned)) => {
                log::warn!("model slot: recovering from poisoned lock");
                poisoned.into_inner()
            }
        };
        match guard.as_mut() {
            Some(backend) => SlotRun::Ran(backend.run(input)),
            None => SlotRun::Unavailable,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn InferenceBackend>>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::empty()
    }
}
