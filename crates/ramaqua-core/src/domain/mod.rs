pub mod errors;

pub use errors::{CoreError, CoreResult, SolverFailure};

use serde::{Deserialize, Serialize};

pub const MIN_ROI_PAIRS: usize = 2;
pub const MAX_ROI_PAIRS: usize = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumShapeError {
    #[error("column length mismatch: shift={shift}, intensity={intensity}")]
    LengthMismatch { shift: usize, intensity: usize },
    #[error("a spectrum needs at least 2 points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error(
        "shift axis must be strictly monotonic, index {index} has {current} after {previous}"
    )]
    NonMonotonicShift {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("{column} value must be finite at index {index}, got {value}")]
    NonFiniteValue {
        column: &'static str,
        index: usize,
        value: f64,
    },
}

/// One Raman spectrum: a strictly increasing shift axis (cm^-1) with its
/// intensity column. Files recorded high-to-low are reversed on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    shift: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    pub fn from_columns(
        mut shift: Vec<f64>,
        mut intensity: Vec<f64>,
    ) -> Result<Self, SpectrumShapeError> {
        if shift.len() != intensity.len() {
            return Err(SpectrumShapeError::LengthMismatch {
                shift: shift.len(),
                intensity: intensity.len(),
            });
        }
        if shift.len() < 2 {
            return Err(SpectrumShapeError::InsufficientPoints {
                actual: shift.len(),
            });
        }

        for (index, value) in shift.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(SpectrumShapeError::NonFiniteValue {
                    column: "shift",
                    index,
                    value,
                });
            }
        }
        for (index, value) in intensity.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(SpectrumShapeError::NonFiniteValue {
                    column: "intensity",
                    index,
                    value,
                });
            }
        }

        if shift[0] > shift[shift.len() - 1] {
            shift.reverse();
            intensity.reverse();
        }

        for index in 1..shift.len() {
            let previous = shift[index - 1];
            let current = shift[index];
            if current <= previous {
                return Err(SpectrumShapeError::NonMonotonicShift {
                    index,
                    previous,
                    current,
                });
            }
        }

        Ok(Self { shift, intensity })
    }

    pub fn shift(&self) -> &[f64] {
        &self.shift
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.shift.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shift.is_empty()
    }
}

/// One baseline anchor interval on the shift axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub low: f64,
    pub high: f64,
}

impl Roi {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, shift: f64) -> bool {
        shift >= self.low && shift <= self.high
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoiError {
    #[error("ROI pair count must be between {MIN_ROI_PAIRS} and {MAX_ROI_PAIRS}, got {actual}")]
    CountOutOfRange { actual: usize },
    #[error("ROI pair {index} has inverted bounds: low {low} >= high {high}")]
    InvertedBounds { index: usize, low: f64, high: f64 },
    #[error("ROI bound must be finite in pair {index}")]
    NonFiniteBound { index: usize },
    #[error("ROI pair {index} overlaps the previous pair")]
    OverlappingPairs { index: usize },
}

/// Ordered, validated baseline anchor intervals for one sample. The pair
/// count is explicit rather than inferred from table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSet {
    pairs: Vec<Roi>,
}

impl RoiSet {
    pub fn new(pairs: Vec<Roi>) -> Result<Self, RoiError> {
        if !(MIN_ROI_PAIRS..=MAX_ROI_PAIRS).contains(&pairs.len()) {
            return Err(RoiError::CountOutOfRange {
                actual: pairs.len(),
            });
        }

        for (index, pair) in pairs.iter().enumerate() {
            if !pair.low.is_finite() || !pair.high.is_finite() {
                return Err(RoiError::NonFiniteBound { index });
            }
            if pair.low >= pair.high {
                return Err(RoiError::InvertedBounds {
                    index,
                    low: pair.low,
                    high: pair.high,
                });
            }
            if index > 0 && pair.low < pairs[index - 1].high {
                return Err(RoiError::OverlappingPairs { index });
            }
        }

        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[Roi] {
        &self.pairs
    }

    pub fn contains(&self, shift: f64) -> bool {
        self.pairs.iter().any(|pair| pair.contains(shift))
    }
}

/// Reference spectrum entry used only by the external-calibration path.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub file: String,
    pub water_wt: f64,
}

/// One row of the working or calibration table; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub name: String,
    pub water_wt: f64,
    pub feo_wt: f64,
    pub rois: RoiSet,
    pub reference: Option<ReferenceEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    records: Vec<SampleRecord>,
}

impl SampleTable {
    pub fn new(records: Vec<SampleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn water_column(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.water_wt).collect()
    }

    pub fn feo_column(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.feo_wt).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaselineMethod {
    Spline,
    Polynomial,
}

impl BaselineMethod {
    pub const EXPECTED_LABELS: &'static str = "'spline', 'polynomial'";

    pub fn from_label(label: &str) -> CoreResult<Self> {
        match label {
            "spline" => Ok(Self::Spline),
            "polynomial" | "poly" => Ok(Self::Polynomial),
            other => Err(CoreError::UnsupportedMethod {
                label: other.to_string(),
                expected: Self::EXPECTED_LABELS,
            }),
        }
    }

    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Spline => "spline",
            Self::Polynomial => "polynomial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationMethod {
    Saturation,
    FeoLinear,
}

impl CalibrationMethod {
    pub const EXPECTED_LABELS: &'static str = "'saturation', 'feo-linear'";

    pub fn from_label(label: &str) -> CoreResult<Self> {
        match label {
            "saturation" => Ok(Self::Saturation),
            "feo-linear" => Ok(Self::FeoLinear),
            other => Err(CoreError::UnsupportedMethod {
                label: other.to_string(),
                expected: Self::EXPECTED_LABELS,
            }),
        }
    }

    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Saturation => "saturation",
            Self::FeoLinear => "feo-linear",
        }
    }

    pub const fn parameter_count(self) -> usize {
        match self {
            Self::Saturation => 1,
            Self::FeoLinear => 2,
        }
    }
}

/// Spectrum file column separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
}

impl Delimiter {
    pub const EXPECTED_LABELS: &'static str = "'tab', 'comma'";

    pub fn from_label(label: &str) -> CoreResult<Self> {
        match label {
            "tab" | "\t" => Ok(Self::Tab),
            "comma" | "," => Ok(Self::Comma),
            other => Err(CoreError::UnsupportedMethod {
                label: other.to_string(),
                expected: Self::EXPECTED_LABELS,
            }),
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }
}

/// Per-sample reductions are independent; order of outputs follows table row
/// order in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// A strategy parameter applied batch-wide or supplied per sample row.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSeq<T: Copy> {
    Uniform(T),
    PerSample(Vec<T>),
}

impl<T: Copy> ParamSeq<T> {
    pub fn value_for(&self, index: usize) -> T {
        match self {
            Self::Uniform(value) => *value,
            Self::PerSample(values) => values[index],
        }
    }

    /// Length the sample table must have for this sequence, if constrained.
    pub fn expected_len(&self) -> Option<usize> {
        match self {
            Self::Uniform(_) => None,
            Self::PerSample(values) => Some(values.len()),
        }
    }
}
