//! Raw output tensor layouts and their decoders.

pub mod detect_head;
pub mod raw_grid;
pub mod single_tensor;

pub use raw_grid::AnchorGrid;

use super::detection::Candidate;
use super::geometry::{GainMode, GeometryTransform};
use crate::backend::OutputInfo;
use crate::error::{DetectorError, Result};
use ndarray::ArrayD;
use std::fmt;
use std::str::FromStr;

/// Everything a decoder needs besides the tensors themselves.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub geometry: &'a GeometryTransform,
    /// Class channels past this count are ignored.
    pub num_labels: usize,
    pub objectness_confidence: f32,
    pub class_confidence: f32,
    pub anchors: &'a AnchorGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    /// `[1, N, 5+C]`, decoded boxes with objectness.
    DetectHead,
    /// One pre-activation tensor per stride, `anchors x g x g x (5+C)`.
    RawGrid,
    /// `[1, 4+C, M]`, transposed, no objectness.
    SingleTensor,
}

impl DecoderKind {
    /// Infer the layout from the model's declared outputs.
    ///
    /// For a rank-3 `[1, a, b]` head the channel axis is the one that can hold
    /// `num_labels` classes: `b >= 5 + labels` for DetectHead,
    /// `a >= 4 + labels` for SingleTensor. When both or neither fit, the
    /// shorter axis is taken as channels.
    pub fn select(outputs: &[OutputInfo], num_labels: usize) -> Result<Self> {
        let first = outputs
            .first()
            .ok_or_else(|| DetectorError::UnsupportedLayout("model declares no outputs".into()))?;

        if is_multi_scale(outputs) {
            return Ok(Self::RawGrid);
        }

        let [_, a, b] = first.shape[..] else {
            return Err(DetectorError::UnsupportedLayout(format!(
                "output {} has shape {:?}",
                first.name, first.shape
            )));
        };
        let labels = num_labels as i64;
        let fits_single_tensor = a >= 4 + labels;
        let fits_detect_head = b >= 5 + labels;

        if outputs.iter().any(|output| output.name == "score") {
            // Only a score tensor that is itself `[1, 4+C, M]` is decodable;
            // split box/score heads are not.
            if outputs.len() == 1 && fits_single_tensor && a < b {
                return Ok(Self::SingleTensor);
            }
            return Err(DetectorError::UnsupportedLayout(format!(
                "decoupled score head with outputs {:?}",
                outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>()
            )));
        }

        Ok(match (fits_detect_head, fits_single_tensor) {
            (true, false) => Self::DetectHead,
            (false, true) => Self::SingleTensor,
            _ if a > 0 && b > 0 && a < b => Self::SingleTensor,
            _ => Self::DetectHead,
        })
    }

    pub fn gain_mode(self) -> GainMode {
        match self {
            Self::DetectHead | Self::RawGrid => GainMode::Isotropic,
            Self::SingleTensor => GainMode::Anisotropic,
        }
    }

    /// Width of the per-box channel axis, checked against the label count.
    pub fn output_dimension(self, outputs: &[OutputInfo]) -> Result<usize> {
        let first = outputs
            .first()
            .ok_or_else(|| DetectorError::UnsupportedLayout("model declares no outputs".into()))?;

        let axis = match self {
            Self::DetectHead => Some(2),
            Self::SingleTensor => Some(1),
            Self::RawGrid => first.shape.len().checked_sub(1),
        };

        match axis.and_then(|axis| first.shape.get(axis)).copied() {
            Some(dim) if dim > 0 => Ok(dim as usize),
            Some(_) => Err(DetectorError::DynamicDimension {
                output: first.name.clone(),
                shape: first.shape.clone(),
            }),
            None => Err(DetectorError::UnsupportedLayout(format!(
                "{} cannot read output {} with shape {:?}",
                self, first.name, first.shape
            ))),
        }
    }

    pub fn decode(self, outputs: &[ArrayD<f32>], ctx: &DecodeContext) -> Result<Vec<Candidate>> {
        let _s = common::span_debug!("decode");

        let candidates = match self {
            Self::DetectHead => detect_head::decode(first_output(outputs)?, ctx)?,
            Self::RawGrid => raw_grid::decode(outputs, ctx)?,
            Self::SingleTensor => single_tensor::decode(first_output(outputs)?, ctx)?,
        };

        tracing::debug!(decoder = %self, candidates = candidates.len(), "Decoded outputs");
        Ok(candidates)
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DetectHead => "detect-head",
            Self::RawGrid => "raw-grid",
            Self::SingleTensor => "single-tensor",
        })
    }
}

impl FromStr for DecoderKind {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "detect-head" => Ok(Self::DetectHead),
            "raw-grid" => Ok(Self::RawGrid),
            "single-tensor" => Ok(Self::SingleTensor),
            _ => Err(DetectorError::UnknownDecoder(s.to_string())),
        }
    }
}

/// Several outputs of one rank whose shapes differ outside the channel axis.
fn is_multi_scale(outputs: &[OutputInfo]) -> bool {
    let Some(first) = outputs.first() else {
        return false;
    };
    let rank = first.shape.len();
    if outputs.len() < 2 || rank < 2 || outputs.iter().any(|o| o.shape.len() != rank) {
        return false;
    }

    let spatial = |output: &OutputInfo| output.shape[1..rank - 1].to_vec();
    outputs.iter().any(|output| spatial(output) != spatial(first))
}

fn first_output(outputs: &[ArrayD<f32>]) -> Result<&ArrayD<f32>> {
    outputs.first().ok_or_else(|| DetectorError::TensorShape {
        index: 0,
        shape: Vec::new(),
        expected: "at least one output tensor".into(),
    })
}

pub(crate) fn shape_error(
    index: usize,
    tensor: &ArrayD<f32>,
    expected: impl Into<String>,
) -> DetectorError {
    DetectorError::TensorShape {
        index,
        shape: tensor.shape().to_vec(),
        expected: expected.into(),
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(name: &str, shape: &[i64]) -> OutputInfo {
        OutputInfo {
            name: name.to_string(),
            shape: shape.to_vec(),
        }
    }

    /// Test sigmoid at known points
    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    /// Test a classic YOLOv5 export selects DetectHead
    #[test]
    fn test_select_detect_head() {
        let outputs = [output("output", &[1, 25200, 85])];
        assert_eq!(DecoderKind::select(&outputs, 80).unwrap(), DecoderKind::DetectHead);
    }

    /// Test heads with fewer rows than channels still select DetectHead
    #[test]
    fn test_select_small_detect_head() {
        for rows in [1, 3, 63, 83] {
            let outputs = [output("output", &[1, rows, 85])];
            let kind = DecoderKind::select(&outputs, 80).unwrap();
            assert_eq!(kind, DecoderKind::DetectHead, "[1, {rows}, 85] is a DetectHead");
            assert_eq!(kind.output_dimension(&outputs).unwrap(), 85);
        }

        // a one-class head: [1, 2, 6] only fits five box channels plus one class
        let single_class = [output("output", &[1, 2, 6])];
        assert_eq!(
            DecoderKind::select(&single_class, 1).unwrap(),
            DecoderKind::DetectHead
        );
    }

    /// Test transposed outputs select SingleTensor
    #[test]
    fn test_select_single_tensor() {
        let transposed = [output("output0", &[1, 84, 8400])];
        assert_eq!(
            DecoderKind::select(&transposed, 80).unwrap(),
            DecoderKind::SingleTensor
        );

        // few predictions: only the first axis can hold 4 + 80 channels
        let short = [output("output0", &[1, 84, 10])];
        assert_eq!(DecoderKind::select(&short, 80).unwrap(), DecoderKind::SingleTensor);

        let named = [output("score", &[1, 84, 8400])];
        assert_eq!(DecoderKind::select(&named, 80).unwrap(), DecoderKind::SingleTensor);
    }

    /// Test split box and score heads are rejected instead of misread
    #[test]
    fn test_select_decoupled_score_head() {
        let outputs = [output("boxes", &[1, 8400, 84]), output("score", &[1, 8400, 80])];

        let err = DecoderKind::select(&outputs, 80).unwrap_err();

        assert!(matches!(err, DetectorError::UnsupportedLayout(_)));
        assert!(err.to_string().contains("score"), "Message should name the head: {err}");
    }

    /// Test per-stride outputs select RawGrid
    #[test]
    fn test_select_raw_grid() {
        let outputs = [
            output("p3", &[1, 3, 80, 80, 85]),
            output("p4", &[1, 3, 40, 40, 85]),
            output("p5", &[1, 3, 20, 20, 85]),
        ];
        assert_eq!(DecoderKind::select(&outputs, 80).unwrap(), DecoderKind::RawGrid);
    }

    /// Test same-shaped auxiliary outputs do not trigger RawGrid
    #[test]
    fn test_identical_outputs_are_not_multi_scale() {
        let outputs = [output("a", &[1, 25200, 85]), output("b", &[1, 25200, 85])];
        assert_eq!(DecoderKind::select(&outputs, 80).unwrap(), DecoderKind::DetectHead);
    }

    /// Test unsupported shapes are configuration errors
    #[test]
    fn test_select_unsupported() {
        let err = DecoderKind::select(&[output("out", &[1, 100])], 80).unwrap_err();
        assert!(matches!(err, DetectorError::UnsupportedLayout(_)));

        let err = DecoderKind::select(&[], 80).unwrap_err();
        assert!(err.is_configuration());
    }

    /// Test output dimension per variant
    #[test]
    fn test_output_dimension() {
        let head = [output("output", &[1, 25200, 85])];
        assert_eq!(DecoderKind::DetectHead.output_dimension(&head).unwrap(), 85);

        let single = [output("output0", &[1, 84, 8400])];
        assert_eq!(DecoderKind::SingleTensor.output_dimension(&single).unwrap(), 84);

        let grid = [output("p3", &[1, 3, 80, 80, 85]), output("p4", &[1, 3, 40, 40, 85])];
        assert_eq!(DecoderKind::RawGrid.output_dimension(&grid).unwrap(), 85);

        let dynamic = [output("output0", &[1, -1, 8400])];
        assert!(matches!(
            DecoderKind::SingleTensor.output_dimension(&dynamic),
            Err(DetectorError::DynamicDimension { .. })
        ));
    }

    /// Test gain mode per variant
    #[test]
    fn test_gain_mode() {
        assert_eq!(DecoderKind::DetectHead.gain_mode(), GainMode::Isotropic);
        assert_eq!(DecoderKind::RawGrid.gain_mode(), GainMode::Isotropic);
        assert_eq!(DecoderKind::SingleTensor.gain_mode(), GainMode::Anisotropic);
    }

    /// Test parsing decoder names
    #[test]
    fn test_parse_decoder_kind() {
        assert_eq!("detect-head".parse::<DecoderKind>().unwrap(), DecoderKind::DetectHead);
        assert_eq!("RAW_GRID".parse::<DecoderKind>().unwrap(), DecoderKind::RawGrid);
        assert_eq!(" single-tensor ".parse::<DecoderKind>().unwrap(), DecoderKind::SingleTensor);
        assert!(matches!(
            "yolox".parse::<DecoderKind>(),
            Err(DetectorError::UnknownDecoder(_))
        ));

        for kind in [DecoderKind::DetectHead, DecoderKind::RawGrid, DecoderKind::SingleTensor] {
            assert_eq!(kind.to_string().parse::<DecoderKind>().unwrap(), kind);
        }
    }

    /// Test decoding without any tensor reports a shape error
    #[test]
    fn test_decode_without_outputs() {
        let geometry = GeometryTransform::new((640, 640), (640, 640), GainMode::Isotropic);
        let anchors = AnchorGrid::default();
        let ctx = DecodeContext {
            geometry: &geometry,
            num_labels: 80,
            objectness_confidence: 0.2,
            class_confidence: 0.25,
            anchors: &anchors,
        };

        let err = DecoderKind::DetectHead.decode(&[], &ctx).unwrap_err();
        assert!(matches!(err, DetectorError::TensorShape { .. }));
    }
}
