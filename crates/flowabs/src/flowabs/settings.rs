use crate::params::{ParamDef, ParamValue};

/// Iteration count and kernel widths of the oriented bilateral filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    pub n: u32,
    pub sigma_d: f32,
    pub sigma_r: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Dog,
    Fdog,
}

/// Edge detector controls. `sigma_m` is only read by the flow-based variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    pub n: u32,
    pub sigma_e: f32,
    pub sigma_r: f32,
    pub sigma_m: f32,
    pub tau: f32,
    pub phi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeFilter {
    None,
    Blur3,
    Blur5,
}

impl QuantizeFilter {
    pub fn from_index(i: i32) -> Self {
        match i {
            i32::MIN..=0 => QuantizeFilter::None,
            1 => QuantizeFilter::Blur3,
            _ => QuantizeFilter::Blur5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeParams {
    pub filter: QuantizeFilter,
    pub num_bins: i32,
    pub phi_q: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothKind {
    None,
    Blur3,
    Blur5,
    FlowLic,
}

impl SmoothKind {
    pub fn from_index(i: i32) -> Self {
        match i {
            i32::MIN..=0 => SmoothKind::None,
            1 => SmoothKind::Blur3,
            2 => SmoothKind::Blur5,
            _ => SmoothKind::FlowLic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothParams {
    pub kind: SmoothKind,
    pub sigma: f32,
}

/// Identity of every engine tunable. Effects bind parameter indices to
/// these instead of capturing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    TfmSigma,
    BfNe,
    BfNa,
    BfSigmaD,
    BfSigmaR,
    EdgeType,
    FdogN,
    FdogSigmaE,
    FdogSigmaR,
    FdogSigmaM,
    FdogTau,
    FdogPhi,
    CqFilter,
    CqNumBins,
    CqPhiQ,
    FsType,
    FsSigma,
}

impl Setting {
    pub const ALL: [Setting; 17] = [
        Setting::TfmSigma,
        Setting::BfNe,
        Setting::BfNa,
        Setting::BfSigmaD,
        Setting::BfSigmaR,
        Setting::EdgeType,
        Setting::FdogN,
        Setting::FdogSigmaE,
        Setting::FdogSigmaR,
        Setting::FdogSigmaM,
        Setting::FdogTau,
        Setting::FdogPhi,
        Setting::CqFilter,
        Setting::CqNumBins,
        Setting::CqPhiQ,
        Setting::FsType,
        Setting::FsSigma,
    ];

    pub fn def(self) -> ParamDef {
        match self {
            Setting::TfmSigma => ParamDef::float("tfm_sigma", 2.28, 0.0, 10.0),
            Setting::BfNe => ParamDef::int("bf_ne", 1, 0, 10),
            Setting::BfNa => ParamDef::int("bf_na", 4, 0, 10),
            Setting::BfSigmaD => ParamDef::float("bf_sigma_d", 3.0, 0.0, 10.0),
            Setting::BfSigmaR => ParamDef::float("bf_sigma_r", 4.25, 0.0, 100.0),
            Setting::EdgeType => ParamDef::int("edge_type", 1, 0, 1),
            Setting::FdogN => ParamDef::int("fdog_n", 1, 0, 10),
            Setting::FdogSigmaE => ParamDef::float("fdog_sigma_e", 1.0, 0.0, 10.0),
            Setting::FdogSigmaR => ParamDef::float("fdog_sigma_r", 1.6, 0.0, 10.0),
            Setting::FdogSigmaM => ParamDef::float("fdog_sigma_m", 3.0, 0.0, 20.0),
            Setting::FdogTau => ParamDef::float("fdog_tau", 0.99, 0.0, 1.0),
            Setting::FdogPhi => ParamDef::float("fdog_phi", 2.0, 0.0, 10.0),
            Setting::CqFilter => ParamDef::int("cq_filter", 1, 0, 2),
            Setting::CqNumBins => ParamDef::int("cq_nbins", 8, 0, 16),
            Setting::CqPhiQ => ParamDef::float("cq_phi_q", 3.4, 0.0, 10.0),
            Setting::FsType => ParamDef::int("fs_type", 3, 0, 3),
            Setting::FsSigma => ParamDef::float("fs_sigma", 1.0, 0.0, 10.0),
        }
    }
}

/// Every tunable of the composite pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAbsSettings {
    pub tfm_sigma: f32,
    pub bf_ne: u32,
    pub bf_na: u32,
    pub bf_sigma_d: f32,
    pub bf_sigma_r: f32,
    pub edge_type: EdgeKind,
    pub edges: EdgeParams,
    pub quantize: QuantizeParams,
    pub smooth: SmoothParams,
    pub edge_color: [f32; 3],
}

impl Default for FlowAbsSettings {
    fn default() -> Self {
        let mut settings = Self {
            tfm_sigma: 0.0,
            bf_ne: 0,
            bf_na: 0,
            bf_sigma_d: 0.0,
            bf_sigma_r: 0.0,
            edge_type: EdgeKind::Fdog,
            edges: EdgeParams {
                n: 0,
                sigma_e: 0.0,
                sigma_r: 0.0,
                sigma_m: 0.0,
                tau: 0.0,
                phi: 0.0,
            },
            quantize: QuantizeParams {
                filter: QuantizeFilter::None,
                num_bins: 0,
                phi_q: 0.0,
            },
            smooth: SmoothParams {
                kind: SmoothKind::None,
                sigma: 0.0,
            },
            edge_color: [0.0, 0.0, 0.0],
        };
        for setting in Setting::ALL {
            settings.apply(setting, setting.def().default_value());
        }
        settings
    }
}

impl FlowAbsSettings {
    /// Store a (range-checked) parameter value.
    pub fn apply(&mut self, setting: Setting, value: ParamValue) {
        let count = || value.as_i32().max(0) as u32;
        match setting {
            Setting::TfmSigma => self.tfm_sigma = value.as_f32(),
            Setting::BfNe => self.bf_ne = count(),
            Setting::BfNa => self.bf_na = count(),
            Setting::BfSigmaD => self.bf_sigma_d = value.as_f32(),
            Setting::BfSigmaR => self.bf_sigma_r = value.as_f32(),
            Setting::EdgeType => {
                self.edge_type = if value.as_i32() <= 0 {
                    EdgeKind::Dog
                } else {
                    EdgeKind::Fdog
                }
            }
            Setting::FdogN => self.edges.n = count(),
            Setting::FdogSigmaE => self.edges.sigma_e = value.as_f32(),
            Setting::FdogSigmaR => self.edges.sigma_r = value.as_f32(),
            Setting::FdogSigmaM => self.edges.sigma_m = value.as_f32(),
            Setting::FdogTau => self.edges.tau = value.as_f32(),
            Setting::FdogPhi => self.edges.phi = value.as_f32(),
            Setting::CqFilter => self.quantize.filter = QuantizeFilter::from_index(value.as_i32()),
            Setting::CqNumBins => self.quantize.num_bins = value.as_i32(),
            Setting::CqPhiQ => self.quantize.phi_q = value.as_f32(),
            Setting::FsType => self.smooth.kind = SmoothKind::from_index(value.as_i32()),
            Setting::FsSigma => self.smooth.sigma = value.as_f32(),
        }
    }

    /// Bilateral pass run before edge detection.
    pub fn bilateral_e(&self) -> BilateralParams {
        BilateralParams {
            n: self.bf_ne,
            sigma_d: self.bf_sigma_d,
            sigma_r: self.bf_sigma_r,
        }
    }

    /// Bilateral pass run before color quantization.
    pub fn bilateral_a(&self) -> BilateralParams {
        BilateralParams {
            n: self.bf_na,
            sigma_d: self.bf_sigma_d,
            sigma_r: self.bf_sigma_r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_param_defs() {
        let s = FlowAbsSettings::default();
        assert_eq!(s.tfm_sigma, 2.28);
        assert_eq!((s.bf_ne, s.bf_na), (1, 4));
        assert_eq!(s.edge_type, EdgeKind::Fdog);
        assert_eq!(s.edges.n, 1);
        assert_eq!(s.edges.sigma_r, 1.6);
        assert_eq!(s.edges.tau, 0.99);
        assert_eq!(s.quantize.filter, QuantizeFilter::Blur3);
        assert_eq!(s.quantize.num_bins, 8);
        assert_eq!(s.smooth.kind, SmoothKind::FlowLic);
        assert_eq!(s.edge_color, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn setting_names_are_unique() {
        let mut names: Vec<String> = Setting::ALL.iter().map(|s| s.def().name().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Setting::ALL.len());
    }

    #[test]
    fn a_pass_uses_its_own_count() {
        let mut s = FlowAbsSettings::default();
        s.apply(Setting::BfNe, ParamValue::Int(2));
        s.apply(Setting::BfNa, ParamValue::Int(5));
        assert_eq!(s.bilateral_e().n, 2);
        assert_eq!(s.bilateral_a().n, 5);
    }

    #[test]
    fn enum_settings_map_indices() {
        assert_eq!(SmoothKind::from_index(0), SmoothKind::None);
        assert_eq!(SmoothKind::from_index(2), SmoothKind::Blur5);
        assert_eq!(QuantizeFilter::from_index(7), QuantizeFilter::Blur5);
        let mut s = FlowAbsSettings::default();
        s.apply(Setting::EdgeType, ParamValue::Int(0));
        assert_eq!(s.edge_type, EdgeKind::Dog);
    }
}
