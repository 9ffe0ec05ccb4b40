//! Mapping between model input space and original image pixels.

use preprocess::ResizeMode;

/// How the model input gain is derived from the image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainMode {
    /// One gain for both axes (`min(gain_x, gain_y)`), image centred with padding.
    #[default]
    Isotropic,
    /// Independent gain per axis, no padding.
    Anisotropic,
}

impl From<GainMode> for ResizeMode {
    fn from(mode: GainMode) -> Self {
        match mode {
            GainMode::Isotropic => ResizeMode::Letterbox,
            GainMode::Anisotropic => ResizeMode::Stretch,
        }
    }
}

/// Axis-aligned box in corner form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Rect {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Build from center-x, center-y, width, height.
    #[inline]
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x_min: cx - w / 2.0,
            y_min: cy - h / 2.0,
            x_max: cx + w / 2.0,
            y_max: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Area shared with `other`, zero when the boxes are disjoint.
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        if x2 >= x1 && y2 >= y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    /// Intersection over union. Two zero-area boxes give NaN.
    pub fn overlap(&self, other: &Rect) -> f32 {
        let intersection = self.intersection_area(other);
        intersection / (self.area() + other.area() - intersection)
    }
}

/// Letterbox parameters for one image, plus the inverse mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryTransform {
    pub model_width: u32,
    pub model_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    /// `model_width / image_width`
    pub gain_x: f32,
    /// `model_height / image_height`
    pub gain_y: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub mode: GainMode,
}

impl GeometryTransform {
    pub fn new(model_size: (u32, u32), image_size: (u32, u32), mode: GainMode) -> Self {
        let (model_width, model_height) = model_size;
        let (image_width, image_height) = image_size;

        let gain_x = model_width as f32 / image_width as f32;
        let gain_y = model_height as f32 / image_height as f32;

        let mut transform = Self {
            model_width,
            model_height,
            image_width,
            image_height,
            gain_x,
            gain_y,
            pad_x: 0.0,
            pad_y: 0.0,
            mode,
        };

        let (effective_x, effective_y) = transform.gain();
        transform.pad_x = (model_width as f32 - image_width as f32 * effective_x) / 2.0;
        transform.pad_y = (model_height as f32 - image_height as f32 * effective_y) / 2.0;
        transform
    }

    /// Gain actually applied per axis for this mode.
    pub fn gain(&self) -> (f32, f32) {
        match self.mode {
            GainMode::Isotropic => {
                let gain = self.gain_x.min(self.gain_y);
                (gain, gain)
            }
            GainMode::Anisotropic => (self.gain_x, self.gain_y),
        }
    }

    /// Map a model-space box back to original image pixels.
    ///
    /// Min coordinates clamp to `[0, dimension]`, max coordinates to
    /// `[0, dimension - 1]`.
    pub fn to_image(&self, rect: Rect) -> Rect {
        let (gain_x, gain_y) = self.gain();
        let width = self.image_width as f32;
        let height = self.image_height as f32;

        Rect {
            x_min: clamp((rect.x_min - self.pad_x) / gain_x, 0.0, width),
            y_min: clamp((rect.y_min - self.pad_y) / gain_y, 0.0, height),
            x_max: clamp((rect.x_max - self.pad_x) / gain_x, 0.0, width - 1.0),
            y_max: clamp((rect.y_max - self.pad_y) / gain_y, 0.0, height - 1.0),
        }
    }

    #[inline]
    pub fn cxcywh_to_image(&self, cx: f32, cy: f32, w: f32, h: f32) -> Rect {
        self.to_image(Rect::from_cxcywh(cx, cy, w, h))
    }

    /// Map an image-space box into model input space. Not clamped.
    pub fn to_model(&self, rect: Rect) -> Rect {
        let (gain_x, gain_y) = self.gain();
        Rect {
            x_min: rect.x_min * gain_x + self.pad_x,
            y_min: rect.y_min * gain_y + self.pad_y,
            x_max: rect.x_max * gain_x + self.pad_x,
            y_max: rect.y_max * gain_y + self.pad_y,
        }
    }
}

/// Comparison clamp: NaN passes through unchanged.
#[inline]
fn clamp(value: f32, min: f32, max: f32) -> f32 {
    let clamped = if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    };
    // -0.0 + 0.0 == +0.0
    clamped + 0.0
}
