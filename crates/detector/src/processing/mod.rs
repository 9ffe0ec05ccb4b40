pub mod decode;
pub mod detection;
pub mod geometry;
pub mod labels;
pub mod suppress;

pub use decode::{AnchorGrid, DecodeContext, DecoderKind};
pub use detection::{Candidate, Prediction, Scored};
pub use geometry::{GainMode, GeometryTransform, Rect};
pub use labels::{COCO_LABELS, Label, LabelCatalog};
pub use suppress::suppress;
