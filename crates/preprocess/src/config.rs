/// Default model input size (width, height).
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Grey used to fill the letterbox border.
pub const LETTERBOX_COLOR: u8 = 114;
