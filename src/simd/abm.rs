#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{_lzcnt_u64, _popcnt64};

/// POPCNT instruction.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "popcnt")]
pub unsafe fn popcount_popcnt(v: u64) -> u64 {
    _popcnt64(v as i64) as u64
}

/// LZCNT instruction. On processors without ABM the same encoding runs as
/// BSR and returns a different result, so callers must check first.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "lzcnt")]
pub unsafe fn leading_zeros_lzcnt(v: u64) -> u64 {
    _lzcnt_u64(v)
}
