use tracing::{debug, warn};

pub struct RuntimeConfig;

impl RuntimeConfig {
    /// Number of cores the OS lets this process run on.
    pub fn core_count() -> usize {
        core_affinity::get_core_ids().map_or(0, |ids| ids.len())
    }

    /// Pin the current thread to the `index`-th available core, so a
    /// benchmark run is not migrated mid-measurement.
    pub fn pin_thread(index: usize) -> bool {
        let Some(ids) = core_affinity::get_core_ids() else {
            warn!("core list unavailable, running unpinned");
            return false;
        };

        match ids.get(index) {
            Some(&core) => {
                let pinned = core_affinity::set_for_current(core);
                debug!(core = core.id, pinned, "pin benchmark thread");
                pinned
            }
            None => {
                warn!(index, available = ids.len(), "core index out of range, running unpinned");
                false
            }
        }
    }
}
