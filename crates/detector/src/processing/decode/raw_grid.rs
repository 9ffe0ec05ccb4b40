use super::{DecodeContext, shape_error, sigmoid};
use crate::error::Result;
use crate::processing::Candidate;
use ndarray::ArrayD;
use rayon::prelude::*;

/// Strides, anchors and fallback grid sizes for a multi-scale head.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGrid {
    pub strides: Vec<f32>,
    /// Anchor `(width, height)` pairs per scale, in input pixels.
    pub anchors: Vec<Vec<(f32, f32)>>,
    /// Used when an output does not carry its grid in its shape.
    pub grid_sizes: Vec<usize>,
}

impl Default for AnchorGrid {
    /// YOLOv5 P3/P4/P5 at 640x640.
    fn default() -> Self {
        Self {
            strides: vec![8.0, 16.0, 32.0],
            anchors: vec![
                vec![(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)],
                vec![(30.0, 61.0), (62.0, 45.0), (59.0, 119.0)],
                vec![(116.0, 90.0), (156.0, 198.0), (373.0, 326.0)],
            ],
            grid_sizes: vec![80, 40, 20],
        }
    }
}

impl AnchorGrid {
    pub fn scales(&self) -> usize {
        self.strides.len().min(self.anchors.len())
    }

    /// Grid side for one output: from a 5-D `[1, A, g, g, 5+C]` shape,
    /// otherwise from `grid_sizes`.
    fn grid_size(&self, scale: usize, output: &ArrayD<f32>, anchors: usize) -> Result<usize> {
        let shape = output.shape();
        if shape.len() == 5 {
            if shape[1] != anchors || shape[2] != shape[3] {
                return Err(shape_error(
                    scale,
                    output,
                    format!("[1, {anchors}, g, g, 5+C]"),
                ));
            }
            return Ok(shape[2]);
        }

        self.grid_sizes
            .get(scale)
            .copied()
            .ok_or_else(|| shape_error(scale, output, "a configured grid size for this scale"))
    }
}

/// Decode one pre-activation tensor per stride. Each cell keeps only its
/// best class.
pub fn decode(outputs: &[ArrayD<f32>], ctx: &DecodeContext) -> Result<Vec<Candidate>> {
    let grid = ctx.anchors;
    if outputs.len() > grid.scales() {
        return Err(shape_error(
            grid.scales(),
            &outputs[grid.scales()],
            format!("at most {} scales", grid.scales()),
        ));
    }

    let mut candidates = Vec::new();
    for (scale, output) in outputs.iter().enumerate() {
        let anchors = grid.anchors[scale].as_slice();
        let stride = grid.strides[scale];
        let size = grid.grid_size(scale, output, anchors.len())?;

        let cell_len = output.shape().last().copied().unwrap_or(0);
        let cells = anchors.len() * size * size;
        if cell_len < 5 || output.len() < cells * cell_len {
            return Err(shape_error(
                scale,
                output,
                format!("{} anchors x {size}x{size} cells x (5+C)", anchors.len()),
            ));
        }
        let classes = (cell_len - 5).min(ctx.num_labels);

        let data = output.as_standard_layout();
        let data = data
            .as_slice()
            .ok_or_else(|| shape_error(scale, output, "a contiguous tensor"))?;

        let found: Vec<Candidate> = (0..cells)
            .into_par_iter()
            .filter_map(|cell| {
                let anchor = anchors[cell / (size * size)];
                let y = (cell / size) % size;
                let x = cell % size;
                let raw = &data[cell * cell_len..(cell + 1) * cell_len];
                decode_cell(raw, x, y, stride, anchor, classes, ctx)
            })
            .collect();

        tracing::trace!(scale, size, candidates = found.len(), "Decoded scale");
        candidates.extend(found);
    }

    Ok(candidates)
}

fn decode_cell(
    raw: &[f32],
    x: usize,
    y: usize,
    stride: f32,
    anchor: (f32, f32),
    classes: usize,
    ctx: &DecodeContext,
) -> Option<Candidate> {
    let objectness = sigmoid(raw[4]);
    if objectness <= ctx.objectness_confidence {
        return None;
    }

    // First maximum wins on ties
    let mut best: Option<(usize, f32)> = None;
    for (label_index, &logit) in raw[5..5 + classes].iter().enumerate() {
        let score = sigmoid(logit) * objectness;
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((label_index, score)),
        }
    }
    let (label_index, score) = best?;
    if score <= ctx.class_confidence {
        return None;
    }

    let cx = (sigmoid(raw[0]) * 2.0 - 0.5 + x as f32) * stride;
    let cy = (sigmoid(raw[1]) * 2.0 - 0.5 + y as f32) * stride;
    let w = (sigmoid(raw[2]) * 2.0).powi(2) * anchor.0;
    let h = (sigmoid(raw[3]) * 2.0).powi(2) * anchor.1;

    Some(Candidate {
        label_index,
        score,
        rect: ctx.geometry.cxcywh_to_image(cx, cy, w, h),
    })
}
