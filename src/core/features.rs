//! Feature Catalogue
//! The closed set of instruction-set extensions the prober knows about,
//! plus a dense map keyed by them.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;

macro_rules! features {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Feature {
            $($variant,)*
        }

        impl Feature {
            /// Every feature, in declaration order.
            pub const ALL: &'static [Feature] = &[$(Feature::$variant,)*];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Feature::$variant => $name,)*
                }
            }
        }
    };
}

features! {
    HyperThreading => "HYP_THR",
    X64 => "X64",
    Fpu => "FPU",
    Pcmulqdq => "PCMULQDQ",
    Cx8 => "CX8",
    Cx16 => "CX16",
    Movbe => "MOVBE",
    Popcnt => "POPCNT",
    Fcmov => "FCMOV",
    Erms => "ERMS",
    Invpcid => "INVPCID",
    Rdseed => "RDSEED",
    Pcommit => "PCOMMIT",
    Clflushopt => "CLFLUSHOPT",
    Clwb => "CLWB",
    Syscall => "SYSCALL",
    Skinit => "SKINIT",
    Cmov => "CMOV",
    Smx => "SMX",
    Fma3 => "FMA3",
    Fma4 => "FMA4",
    Aes => "AES",
    Xsave => "XSAVE",
    F16 => "F16",
    Rdrand => "RDRAND",
    Fxsr => "FXSR",
    Abm => "ABM",
    Bmi1 => "BMI1",
    Bmi2 => "BMI2",
    Clmul => "CLMUL",
    Mmx => "MMX",
    Avx => "AVX",
    Avx2 => "AVX2",
    Avx512F => "AVX512F",
    Avx512Vl => "AVX512VL",
    Avx512Bw => "AVX512BW",
    Avx512Cd => "AVX512CD",
    Avx512Dq => "AVX512DQ",
    Avx512Er => "AVX512ER",
    Avx512Pf => "AVX512PF",
    Avx512Vnni => "AVX512VNNI",
    Avx512Vbmi => "AVX512VBMI",
    Avx512Ifma => "AVX512IFMA",
    Avx512Vbmi2 => "AVX512VBMI2",
    Avx5124Fmaps => "AVX5124FMAPS",
    Avx512Bitalg => "AVX512BITALG",
    Avx5124Vnniw => "AVX5124VNNIW",
    Avx512Vpopcntdq => "AVX512VPOPCNTDQ",
    Sse => "SSE",
    Sse2 => "SSE2",
    Sse3 => "SSE3",
    Ssse3 => "SSSE3",
    Sse41 => "SSE41",
    Sse42 => "SSE42",
    Sse4a => "SSE4a",
    Sgx => "SGX",
    Tsx => "TSX",
    IntelAdx => "INTEL_ADX",
    IntelMpx => "INTEL_MPX",
    Sha => "SHA",
    Prefetchwt1 => "PREFETCHWT1",
    Gfni => "GFNI",
    Vaes => "VAES",
    Vpclmulqdq => "VPCLMULQDQ",
    Fsrm => "FSRM",
    Xop => "XOP",
    Tbm => "TBM",
    Amd3dnow => "AMD_3DNOW",
    Rdtscp => "RDTSCP",
}

/// The short list printed by the feature lister when `--all` is not given.
pub const LISTED_FEATURES: [Feature; 8] = [
    Feature::Popcnt,
    Feature::HyperThreading,
    Feature::X64,
    Feature::Fpu,
    Feature::Pcmulqdq,
    Feature::Cx8,
    Feature::Cx16,
    Feature::Avx512Vpopcntdq,
];

impl Feature {
    pub const COUNT: usize = Feature::ALL.len();

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Dense `Feature -> T` map. Every feature always has a value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap<T> {
    values: [T; Feature::COUNT],
}

/// Decoded capability flags of the running processor.
pub type CapabilitySet = FeatureMap<bool>;

/// Measured durations in microseconds; zero for anything not benchmarked.
pub type ExecutionTimes = FeatureMap<f64>;

impl<T: Default> Default for FeatureMap<T> {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| T::default()),
        }
    }
}

impl<T> FeatureMap<T> {
    pub fn get(&self, feature: Feature) -> &T {
        &self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: T) {
        self.values[feature.index()] = value;
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, &T)> + '_ {
        Feature::ALL.iter().copied().zip(self.values.iter())
    }
}

impl FeatureMap<bool> {
    pub fn has(&self, feature: Feature) -> bool {
        self.values[feature.index()]
    }

    pub fn supported(&self) -> impl Iterator<Item = Feature> + '_ {
        self.iter().filter(|&(_, &on)| on).map(|(f, _)| f)
    }
}

impl FeatureMap<f64> {
    pub fn record(&mut self, feature: Feature, micros: f64) {
        self.set(feature, micros);
    }

    /// Features that have a non-zero measurement.
    pub fn measured(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.iter().filter(|&(_, &t)| t != 0.0).map(|(f, &t)| (f, t))
    }
}

impl<T> Index<Feature> for FeatureMap<T> {
    type Output = T;

    fn index(&self, feature: Feature) -> &T {
        self.get(feature)
    }
}

impl<T> IndexMut<Feature> for FeatureMap<T> {
    fn index_mut(&mut self, feature: Feature) -> &mut T {
        &mut self.values[feature.index()]
    }
}

impl<T: Serialize> Serialize for FeatureMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), Feature::COUNT);
        assert_eq!(Feature::COUNT, 69);
    }

    #[test]
    fn test_index_matches_declaration_order() {
        for (i, f) in Feature::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("popcnt".parse::<Feature>(), Ok(Feature::Popcnt));
        assert_eq!("SSE4A".parse::<Feature>(), Ok(Feature::Sse4a));
        assert_eq!("hyp_thr".parse::<Feature>(), Ok(Feature::HyperThreading));
        assert!("NEON".parse::<Feature>().is_err());
    }

    #[test]
    fn test_capability_set_defaults_to_absent() {
        let caps = CapabilitySet::default();
        assert_eq!(caps.supported().count(), 0);

        let mut caps = caps;
        caps.set(Feature::Abm, true);
        caps[Feature::Sse2] = true;
        let on: Vec<Feature> = caps.supported().collect();
        assert_eq!(on, vec![Feature::Abm, Feature::Sse2]);
    }

    #[test]
    fn test_execution_times_serialize_by_name() {
        let mut times = ExecutionTimes::default();
        times.record(Feature::Abm, 12.5);

        let json = serde_json::to_value(&times).unwrap();
        assert_eq!(json["ABM"], 12.5);
        assert_eq!(json["POPCNT"], 0.0);
        assert_eq!(json.as_object().unwrap().len(), Feature::COUNT);

        let measured: Vec<_> = times.measured().collect();
        assert_eq!(measured, vec![(Feature::Abm, 12.5)]);
    }
}
