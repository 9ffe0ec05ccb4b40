use super::geometry::Rect;
use super::labels::Label;
use std::fmt;

/// Raw decoder output in image pixels, before suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub label_index: usize,
    pub score: f32,
    pub rect: Rect,
}

/// A labelled detection returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub score: f32,
    pub rect: Rect,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} ({:.1}, {:.1}, {:.1}, {:.1})",
            self.label.name,
            self.score,
            self.rect.x_min,
            self.rect.y_min,
            self.rect.x_max,
            self.rect.y_max
        )
    }
}

/// Anything suppression can rank and compare.
pub trait Scored {
    fn score(&self) -> f32;
    fn rect(&self) -> &Rect;
}

impl Scored for Candidate {
    fn score(&self) -> f32 {
        self.score
    }

    fn rect(&self) -> &Rect {
        &self.rect
    }
}

impl Scored for Prediction {
    fn score(&self) -> f32 {
        self.score
    }

    fn rect(&self) -> &Rect {
        &self.rect
    }
}
