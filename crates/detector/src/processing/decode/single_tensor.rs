use super::{DecodeContext, shape_error};
use crate::error::Result;
use crate::processing::Candidate;
use ndarray::{ArrayD, Ix3};
use rayon::prelude::*;

const EXPECTED: &str = "[1, 4+C, M]";

/// Decode the transposed `[1, 4+C, M]` layout. Class channels are used as
/// scores directly and every class at or above the threshold emits.
pub fn decode(output: &ArrayD<f32>, ctx: &DecodeContext) -> Result<Vec<Candidate>> {
    let view = output
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| shape_error(0, output, EXPECTED))?;

    let (batch, channels, predictions) = view.dim();
    if batch == 0 || channels < 4 {
        return Err(shape_error(0, output, EXPECTED));
    }
    let classes = (channels - 4).min(ctx.num_labels);

    let candidates = (0..predictions)
        .into_par_iter()
        .flat_map_iter(|j| {
            let rect = ctx.geometry.cxcywh_to_image(
                view[[0, 0, j]],
                view[[0, 1, j]],
                view[[0, 2, j]],
                view[[0, 3, j]],
            );
            (0..classes).filter_map(move |label_index| {
                let score = view[[0, 4 + label_index, j]];
                (score >= ctx.class_confidence).then_some(Candidate {
                    label_index,
                    score,
                    rect,
                })
            })
        })
        .collect();

    Ok(candidates)
}
