//! Small logging helpers shared by the pipeline binaries.

use std::time::Instant;

/// RAII stage timer: logs "<name>: <elapsed>" at INFO level on drop.
///
/// # Example
/// ```ignore
/// let _t = Stage::new("growth");
/// // ... run the stage ...
/// ```
pub struct Stage {
    name: &'static str,
    start: Instant,
}

impl Stage {
    pub fn new(name: &'static str) -> Self {
        log::debug!("{name}...");
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        log::info!("{}: {:.3?}", self.name, self.start.elapsed());
    }
}
