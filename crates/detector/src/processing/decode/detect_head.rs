use super::{DecodeContext, shape_error};
use crate::error::Result;
use crate::processing::Candidate;
use ndarray::{ArrayD, ArrayView1, Ix3, s};
use rayon::prelude::*;

const EXPECTED: &str = "[1, N, 5+C]";

/// Decode `[1, N, 5+C]`: `cx, cy, w, h, objectness, class scores...`.
///
/// Multi-label: every class whose `score * objectness` clears the class
/// threshold yields its own candidate.
pub fn decode(output: &ArrayD<f32>, ctx: &DecodeContext) -> Result<Vec<Candidate>> {
    let view = output
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| shape_error(0, output, EXPECTED))?;

    let (batch, rows, channels) = view.dim();
    if batch == 0 || channels < 5 {
        return Err(shape_error(0, output, EXPECTED));
    }
    let classes = (channels - 5).min(ctx.num_labels);

    let candidates = (0..rows)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row: ArrayView1<f32> = view.slice(s![0, i, ..]);
            let mut found = Vec::new();

            let objectness = row[4];
            if objectness <= ctx.objectness_confidence {
                return found;
            }

            let rect = ctx.geometry.cxcywh_to_image(row[0], row[1], row[2], row[3]);
            for label_index in 0..classes {
                let score = row[5 + label_index] * objectness;
                if score <= ctx.class_confidence {
                    continue;
                }
                found.push(Candidate {
                    label_index,
                    score,
                    rect,
                });
            }
            found
        })
        .collect();

    Ok(candidates)
}
