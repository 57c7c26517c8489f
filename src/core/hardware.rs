//! Hardware Detection Module
//! Queries CPUID at runtime and decodes the feature bits into a `CapabilitySet`.

use crate::core::features::{CapabilitySet, Feature};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("CPUID leaf {leaf:#010x} cannot be queried on this processor")]
    UnsupportedQuery { leaf: u32 },
}

/// Raw result of one CPUID query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax,
    Ebx,
    Ecx,
    Edx,
}

impl Registers {
    pub fn get(&self, register: Register) -> u32 {
        match register {
            Register::Eax => self.eax,
            Register::Ebx => self.ebx,
            Register::Ecx => self.ecx,
            Register::Edx => self.edx,
        }
    }
}

/// Anything that can answer CPUID queries.
/// `None` means the leaf does not exist on this processor.
pub trait CpuidSource {
    fn query(&self, leaf: u32, sub_leaf: u32) -> Option<Registers>;
}

/// The three leaves the prober decodes, in query order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    Basic,
    Extended,
    Vendor,
}

impl Leaf {
    pub const ALL: [Leaf; 3] = [Leaf::Basic, Leaf::Extended, Leaf::Vendor];

    pub const fn index(self) -> u32 {
        match self {
            Leaf::Basic => 0x0000_0001,
            Leaf::Extended => 0x0000_0007,
            Leaf::Vendor => 0x8000_0001,
        }
    }

    pub const fn sub_leaf(self) -> u32 {
        0
    }
}

/// One (leaf, register, bit) position and the feature it reports.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBit {
    pub leaf: Leaf,
    pub register: Register,
    pub bit: u8,
    pub feature: Feature,
}

const fn bit(leaf: Leaf, register: Register, bit: u8, feature: Feature) -> FeatureBit {
    FeatureBit { leaf, register, bit, feature }
}

use Feature as F;
use Leaf::{Basic, Extended, Vendor};
use Register::{Ebx, Ecx, Edx};

/// Fixed decode table. CLMUL is the same bit as PCMULQDQ; FXSR is reported
/// by both the basic and vendor leaves.
pub const FEATURE_BITS: &[FeatureBit] = &[
    // Leaf 0x1
    bit(Basic, Ecx, 0, F::Sse3),
    bit(Basic, Ecx, 1, F::Pcmulqdq),
    bit(Basic, Ecx, 1, F::Clmul),
    bit(Basic, Ecx, 6, F::Smx),
    bit(Basic, Ecx, 9, F::Ssse3),
    bit(Basic, Ecx, 12, F::Fma3),
    bit(Basic, Ecx, 13, F::Cx16),
    bit(Basic, Ecx, 19, F::Sse41),
    bit(Basic, Ecx, 20, F::Sse42),
    bit(Basic, Ecx, 22, F::Movbe),
    bit(Basic, Ecx, 23, F::Popcnt),
    bit(Basic, Ecx, 25, F::Aes),
    bit(Basic, Ecx, 26, F::Xsave),
    bit(Basic, Ecx, 28, F::Avx),
    bit(Basic, Ecx, 29, F::F16),
    bit(Basic, Ecx, 30, F::Rdrand),
    bit(Basic, Edx, 0, F::Fpu),
    bit(Basic, Edx, 8, F::Cx8),
    bit(Basic, Edx, 15, F::Fcmov),
    bit(Basic, Edx, 23, F::Mmx),
    bit(Basic, Edx, 24, F::Fxsr),
    bit(Basic, Edx, 25, F::Sse),
    bit(Basic, Edx, 26, F::Sse2),
    bit(Basic, Edx, 28, F::HyperThreading),
    // Leaf 0x7, sub-leaf 0
    bit(Extended, Ebx, 2, F::Sgx),
    bit(Extended, Ebx, 3, F::Bmi1),
    bit(Extended, Ebx, 4, F::Tsx),
    bit(Extended, Ebx, 5, F::Avx2),
    bit(Extended, Ebx, 8, F::Bmi2),
    bit(Extended, Ebx, 9, F::Erms),
    bit(Extended, Ebx, 10, F::Invpcid),
    bit(Extended, Ebx, 14, F::IntelMpx),
    bit(Extended, Ebx, 16, F::Avx512F),
    bit(Extended, Ebx, 17, F::Avx512Dq),
    bit(Extended, Ebx, 18, F::Rdseed),
    bit(Extended, Ebx, 19, F::IntelAdx),
    bit(Extended, Ebx, 21, F::Avx512Ifma),
    bit(Extended, Ebx, 22, F::Pcommit),
    bit(Extended, Ebx, 23, F::Clflushopt),
    bit(Extended, Ebx, 24, F::Clwb),
    bit(Extended, Ebx, 26, F::Avx512Pf),
    bit(Extended, Ebx, 27, F::Avx512Er),
    bit(Extended, Ebx, 28, F::Avx512Cd),
    bit(Extended, Ebx, 29, F::Sha),
    bit(Extended, Ebx, 30, F::Avx512Bw),
    bit(Extended, Ebx, 31, F::Avx512Vl),
    bit(Extended, Ecx, 0, F::Prefetchwt1),
    bit(Extended, Ecx, 1, F::Avx512Vbmi),
    bit(Extended, Ecx, 6, F::Avx512Vbmi2),
    bit(Extended, Ecx, 8, F::Gfni),
    bit(Extended, Ecx, 9, F::Vaes),
    bit(Extended, Ecx, 10, F::Vpclmulqdq),
    bit(Extended, Ecx, 11, F::Avx512Vnni),
    bit(Extended, Ecx, 12, F::Avx512Bitalg),
    bit(Extended, Ecx, 14, F::Avx512Vpopcntdq),
    bit(Extended, Edx, 2, F::Avx5124Vnniw),
    bit(Extended, Edx, 3, F::Avx5124Fmaps),
    bit(Extended, Edx, 4, F::Fsrm),
    // Leaf 0x80000001
    bit(Vendor, Ecx, 5, F::Abm),
    bit(Vendor, Ecx, 6, F::Sse4a),
    bit(Vendor, Ecx, 11, F::Xop),
    bit(Vendor, Ecx, 12, F::Skinit),
    bit(Vendor, Ecx, 16, F::Fma4),
    bit(Vendor, Ecx, 21, F::Tbm),
    bit(Vendor, Edx, 11, F::Syscall),
    bit(Vendor, Edx, 15, F::Cmov),
    bit(Vendor, Edx, 22, F::Amd3dnow),
    bit(Vendor, Edx, 24, F::Fxsr),
    bit(Vendor, Edx, 27, F::Rdtscp),
    bit(Vendor, Edx, 29, F::X64),
];

/// CPUID executed on the current processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCpuid;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl CpuidSource for NativeCpuid {
    fn query(&self, leaf: u32, sub_leaf: u32) -> Option<Registers> {
        #[cfg(target_arch = "x86")]
        use std::arch::x86::{__cpuid_count, __get_cpuid_max, has_cpuid};
        #[cfg(target_arch = "x86_64")]
        use std::arch::x86_64::{__cpuid_count, __get_cpuid_max};

        // Every x86_64 processor has CPUID; early 32-bit parts may not.
        #[cfg(target_arch = "x86")]
        if !has_cpuid() {
            return None;
        }

        // Basic and extended ranges report their own maximum.
        let (max_leaf, _) = unsafe { __get_cpuid_max(leaf & 0x8000_0000) };
        if leaf > max_leaf {
            return None;
        }

        let r = unsafe { __cpuid_count(leaf, sub_leaf) };
        Some(Registers {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        })
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
impl CpuidSource for NativeCpuid {
    fn query(&self, _leaf: u32, _sub_leaf: u32) -> Option<Registers> {
        None
    }
}

/// Probe the running processor.
pub fn probe() -> Result<CapabilitySet, ProbeError> {
    probe_with(&NativeCpuid)
}

/// Decode the feature leaves reported by `source`.
///
/// The basic leaf must exist. Missing extended or vendor leaves leave their
/// flags false.
pub fn probe_with<S: CpuidSource + ?Sized>(source: &S) -> Result<CapabilitySet, ProbeError> {
    let mut caps = CapabilitySet::default();

    for leaf in Leaf::ALL {
        let regs = match source.query(leaf.index(), leaf.sub_leaf()) {
            Some(regs) => regs,
            None if leaf == Leaf::Basic => {
                return Err(ProbeError::UnsupportedQuery { leaf: leaf.index() });
            }
            None => {
                debug!(
                    leaf = format_args!("{:#010x}", leaf.index()),
                    "leaf unavailable, flags left unset"
                );
                continue;
            }
        };

        debug!(
            leaf = format_args!("{:#010x}", leaf.index()),
            ebx = format_args!("{:#010x}", regs.ebx),
            ecx = format_args!("{:#010x}", regs.ecx),
            edx = format_args!("{:#010x}", regs.edx),
            "decoding"
        );

        for entry in FEATURE_BITS.iter().filter(|e| e.leaf == leaf) {
            if regs.get(entry.register) & (1u32 << entry.bit) != 0 {
                caps.set(entry.feature, true);
            }
        }
    }

    Ok(caps)
}

/// Vendor and brand strings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CpuIdentity {
    pub vendor: String,
    pub brand: Option<String>,
}

/// Read the vendor (leaf 0) and brand (leaves 0x80000002..=0x80000004) strings.
pub fn identify_with<S: CpuidSource + ?Sized>(source: &S) -> Result<CpuIdentity, ProbeError> {
    let leaf0 = source
        .query(0, 0)
        .ok_or(ProbeError::UnsupportedQuery { leaf: 0 })?;

    let mut vendor = Vec::with_capacity(12);
    for word in [leaf0.ebx, leaf0.edx, leaf0.ecx] {
        vendor.extend_from_slice(&word.to_le_bytes());
    }

    let mut brand = Vec::with_capacity(48);
    for leaf in 0x8000_0002..=0x8000_0004u32 {
        match source.query(leaf, 0) {
            Some(r) => {
                for word in [r.eax, r.ebx, r.ecx, r.edx] {
                    brand.extend_from_slice(&word.to_le_bytes());
                }
            }
            None => {
                brand.clear();
                break;
            }
        }
    }

    let brand = ascii_field(&brand);
    Ok(CpuIdentity {
        vendor: ascii_field(&vendor),
        brand: (!brand.is_empty()).then_some(brand),
    })
}

pub fn identify() -> Result<CpuIdentity, ProbeError> {
    identify_with(&NativeCpuid)
}

fn ascii_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Table-driven CPUID for tests.
    #[derive(Default)]
    struct FakeCpuid {
        leaves: HashMap<u32, Registers>,
    }

    impl FakeCpuid {
        fn with(mut self, leaf: u32, regs: Registers) -> Self {
            self.leaves.insert(leaf, regs);
            self
        }
    }

    impl CpuidSource for FakeCpuid {
        fn query(&self, leaf: u32, _sub_leaf: u32) -> Option<Registers> {
            self.leaves.get(&leaf).copied()
        }
    }

    fn ecx(value: u32) -> Registers {
        Registers { ecx: value, ..Default::default() }
    }

    #[test]
    fn test_missing_basic_leaf_is_an_error() {
        let source = FakeCpuid::default().with(0x7, Registers::default());
        assert_eq!(
            probe_with(&source),
            Err(ProbeError::UnsupportedQuery { leaf: 0x1 })
        );
    }

    #[test]
    fn test_popcnt_follows_leaf1_ecx_bit23() {
        let set = FakeCpuid::default().with(0x1, ecx(1 << 23));
        let caps = probe_with(&set).unwrap();
        assert!(caps.has(Feature::Popcnt));
        assert_eq!(caps.supported().count(), 1);

        let unset = FakeCpuid::default().with(0x1, ecx(!(1 << 23)));
        let caps = probe_with(&unset).unwrap();
        assert!(!caps.has(Feature::Popcnt));
    }

    #[test]
    fn test_missing_extended_leaves_leave_flags_false() {
        let source = FakeCpuid::default().with(
            0x1,
            Registers { eax: 0, ebx: 0, ecx: u32::MAX, edx: u32::MAX },
        );
        let caps = probe_with(&source).unwrap();

        assert!(caps.has(Feature::Sse2));
        assert!(caps.has(Feature::Popcnt));
        for f in [Feature::Avx2, Feature::Avx512F, Feature::Abm, Feature::X64, Feature::Fsrm] {
            assert!(!caps.has(f), "{f} should be unset");
        }
    }

    #[test]
    fn test_every_table_entry_decodes_its_own_bit() {
        for entry in FEATURE_BITS {
            let mut regs = Registers::default();
            let mask = 1u32 << entry.bit;
            match entry.register {
                Register::Eax => regs.eax = mask,
                Register::Ebx => regs.ebx = mask,
                Register::Ecx => regs.ecx = mask,
                Register::Edx => regs.edx = mask,
            }

            let mut source = FakeCpuid::default().with(0x1, Registers::default());
            source.leaves.insert(entry.leaf.index(), regs);
            let caps = probe_with(&source).unwrap();
            assert!(caps.has(entry.feature), "{} not decoded", entry.feature);
        }
    }

    #[test]
    fn test_no_unintended_bit_aliasing() {
        let mut seen: HashMap<(u32, u8, u8), Feature> = HashMap::new();
        for entry in FEATURE_BITS {
            let key = (entry.leaf.index(), entry.register as u8, entry.bit);
            if let Some(prev) = seen.insert(key, entry.feature) {
                let pair = (prev, entry.feature);
                assert_eq!(pair, (Feature::Pcmulqdq, Feature::Clmul), "aliased bit {key:?}");
            }
        }
    }

    #[test]
    fn test_avx512_4vnniw_4fmaps_fsrm_positions() {
        let position = |f: Feature| {
            FEATURE_BITS
                .iter()
                .find(|e| e.feature == f)
                .map(|e| (e.leaf, e.register, e.bit))
                .unwrap()
        };
        assert_eq!(position(Feature::Avx5124Vnniw), (Leaf::Extended, Register::Edx, 2));
        assert_eq!(position(Feature::Avx5124Fmaps), (Leaf::Extended, Register::Edx, 3));
        assert_eq!(position(Feature::Fsrm), (Leaf::Extended, Register::Edx, 4));

        let source = FakeCpuid::default()
            .with(0x1, Registers::default())
            .with(0x7, Registers { edx: 1 << 4, ..Default::default() });
        let caps = probe_with(&source).unwrap();
        assert!(caps.has(Feature::Fsrm));
        assert!(!caps.has(Feature::Avx5124Vnniw));
        assert!(!caps.has(Feature::Avx5124Fmaps));
    }

    #[test]
    fn test_fxsr_from_either_leaf() {
        let basic_only = FakeCpuid::default()
            .with(0x1, Registers { edx: 1 << 24, ..Default::default() })
            .with(0x8000_0001, Registers::default());
        assert!(probe_with(&basic_only).unwrap().has(Feature::Fxsr));

        let vendor_only = FakeCpuid::default()
            .with(0x1, Registers::default())
            .with(0x8000_0001, Registers { edx: 1 << 24, ..Default::default() });
        assert!(probe_with(&vendor_only).unwrap().has(Feature::Fxsr));
    }

    #[test]
    fn test_identity_strings() {
        // "GenuineIntel" is split across EBX, EDX, ECX.
        let word = |s: &[u8; 4]| u32::from_le_bytes(*s);
        let source = FakeCpuid::default().with(
            0x0,
            Registers { eax: 0x16, ebx: word(b"Genu"), edx: word(b"ineI"), ecx: word(b"ntel") },
        );
        let id = identify_with(&source).unwrap();
        assert_eq!(id.vendor, "GenuineIntel");
        assert_eq!(id.brand, None);
    }

    /// Split a NUL-padded 48-byte brand string across the three brand leaves.
    fn with_brand(mut source: FakeCpuid, brand: &str) -> FakeCpuid {
        let mut bytes = brand.as_bytes().to_vec();
        bytes.resize(48, 0);
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        for (i, regs) in words.chunks_exact(4).enumerate() {
            source.leaves.insert(
                0x8000_0002 + i as u32,
                Registers { eax: regs[0], ebx: regs[1], ecx: regs[2], edx: regs[3] },
            );
        }
        source
    }

    #[test]
    fn test_brand_string_is_trimmed() {
        let word = |s: &[u8; 4]| u32::from_le_bytes(*s);
        let vendor = Registers {
            eax: 0x10,
            ebx: word(b"Auth"),
            edx: word(b"enti"),
            ecx: word(b"cAMD"),
        };
        let source = with_brand(
            FakeCpuid::default().with(0x0, vendor),
            "   AMD Ryzen 7 5800X 8-Core Processor ",
        );

        let id = identify_with(&source).unwrap();
        assert_eq!(id.vendor, "AuthenticAMD");
        assert_eq!(id.brand.as_deref(), Some("AMD Ryzen 7 5800X 8-Core Processor"));
    }

    #[test]
    fn test_brand_needs_all_three_leaves() {
        let mut source = with_brand(
            FakeCpuid::default().with(0x0, Registers::default()),
            "Intel(R) Core(TM) i7-8700 CPU @ 3.20GHz",
        );
        source.leaves.remove(&0x8000_0003);

        let id = identify_with(&source).unwrap();
        assert_eq!(id.brand, None);
    }

    #[test]
    fn test_missing_vendor_leaf_is_an_error() {
        assert_eq!(
            identify_with(&FakeCpuid::default()),
            Err(ProbeError::UnsupportedQuery { leaf: 0 })
        );
    }

    #[test]
    fn test_native_probe_is_idempotent() {
        match (probe(), probe()) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a, b),
            _ => panic!("probe results differ between calls"),
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_native_probe_agrees_with_std_detection() {
        let caps = probe().unwrap();
        assert!(caps.has(Feature::Sse2));
        assert_eq!(caps.has(Feature::Popcnt), is_x86_feature_detected!("popcnt"));
    }
}
