pub mod abm;
pub mod emulated;

use serde::Serialize;
use tracing::warn;

pub type BitCountFunc = unsafe fn(u64) -> u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionPath {
    Hardware,
    Emulated,
}

/// The bit-counting operations timed by the benchmarker.
pub trait BitCounter {
    fn path(&self) -> ExecutionPath;
    fn popcount(&self, v: u64) -> u64;
    fn leading_zeros(&self, v: u64) -> u64;

    /// Number of differing bits, i.e. the population count of `a ^ b`.
    fn hamming_distance(&self, a: u64, b: u64) -> u64 {
        self.popcount(a ^ b)
    }
}

/// Function table for one execution path.
#[derive(Debug, Clone, Copy)]
pub struct BitOps {
    path: ExecutionPath,
    popcount: BitCountFunc,
    leading_zeros: BitCountFunc,
}

impl BitOps {
    pub fn emulated() -> Self {
        Self {
            path: ExecutionPath::Emulated,
            popcount: emulated::popcount,
            leading_zeros: emulated::leading_zeros,
        }
    }

    /// Hardware table, or `None` if the running processor lacks POPCNT
    /// (or LZCNT, when `leading_zeros` is requested).
    pub fn hardware(leading_zeros: bool) -> Option<Self> {
        let popcount = get_hardware_popcount()?;
        let lzcnt: BitCountFunc = if leading_zeros {
            get_hardware_leading_zeros()?
        } else {
            emulated::leading_zeros
        };
        Some(Self {
            path: ExecutionPath::Hardware,
            popcount,
            leading_zeros: lzcnt,
        })
    }

    /// Resolve `path`, falling back to emulation when the hardware
    /// instructions are not usable here.
    pub fn select(path: ExecutionPath, leading_zeros: bool) -> Self {
        match path {
            ExecutionPath::Emulated => Self::emulated(),
            ExecutionPath::Hardware => Self::hardware(leading_zeros).unwrap_or_else(|| {
                warn!("hardware bit counting requested but not available, using emulation");
                Self::emulated()
            }),
        }
    }
}

impl BitCounter for BitOps {
    fn path(&self) -> ExecutionPath {
        self.path
    }

    #[inline]
    fn popcount(&self, v: u64) -> u64 {
        // Hardware entries are only installed after runtime detection.
        unsafe { (self.popcount)(v) }
    }

    #[inline]
    fn leading_zeros(&self, v: u64) -> u64 {
        unsafe { (self.leading_zeros)(v) }
    }
}

fn get_hardware_popcount() -> Option<BitCountFunc> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("popcnt") {
            return Some(abm::popcount_popcnt);
        }
    }
    None
}

fn get_hardware_leading_zeros() -> Option<BitCountFunc> {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("lzcnt") {
            return Some(abm::leading_zeros_lzcnt);
        }
    }
    None
}
