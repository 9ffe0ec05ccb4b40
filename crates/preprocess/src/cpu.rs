use crate::config::{DEFAULT_INPUT_SIZE, LETTERBOX_COLOR};
use crate::{Preprocess, PreprocessResult, ResizeMode};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

pub struct CpuPreProcessor {
    pub input_size: (u32, u32),
    pub mode: ResizeMode,
    canvas: Vec<u8>,
}

impl CpuPreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self::with_mode(input_size, ResizeMode::Letterbox)
    }

    pub fn with_mode(input_size: (u32, u32), mode: ResizeMode) -> Self {
        Self {
            input_size,
            mode,
            canvas: vec![LETTERBOX_COLOR; (input_size.0 * input_size.1 * 3) as usize],
        }
    }

    pub fn preprocess_from_u8_slice(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult> {
        let _s = span!("preprocess_frame");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            mode = ?self.mode,
            "Preprocessing frame dimensions"
        );

        let expected_size = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        let (scale_x, scale_y, offset_x, offset_y) = match self.mode {
            ResizeMode::Letterbox => self.resize_and_letterbox(pixels, width, height)?,
            ResizeMode::Stretch => self.resize_stretch(pixels, width, height)?,
        };

        let data = Self::normalize(&self.canvas, self.input_size.0, self.input_size.1)?;

        Ok(PreprocessResult {
            data,
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        })
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32, f32)> {
        let _s = span!("resize_and_letterbox");

        let scale =
            (self.input_size.0 as f32 / width as f32).min(self.input_size.1 as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, self.input_size.0);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, self.input_size.1);

        let offset_x = (self.input_size.0 - new_width) / 2;
        let offset_y = (self.input_size.1 - new_height) / 2;

        let resized = Self::resize(pixels, width, height, new_width, new_height)?;

        self.canvas.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = self.input_size.0 * 3;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.canvas[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok((scale, scale, offset_x as f32, offset_y as f32))
    }

    fn resize_stretch(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32, f32)> {
        let _s = span!("resize_stretch");

        let (input_width, input_height) = self.input_size;
        let resized = Self::resize(pixels, width, height, input_width, input_height)?;
        self.canvas.copy_from_slice(resized.buffer());

        Ok((
            input_width as f32 / width as f32,
            input_height as f32 / height as f32,
            0.0,
            0.0,
        ))
    }

    fn resize(
        pixels: &[u8],
        width: u32,
        height: u32,
        new_width: u32,
        new_height: u32,
    ) -> anyhow::Result<Image<'static>> {
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        if (width, height) == (new_width, new_height) {
            resized.buffer_mut().copy_from_slice(pixels);
            return Ok(resized);
        }

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(resized)
    }

    /// HWC u8 RGB -> NCHW f32 in [0, 1].
    fn normalize(buf: &[u8], width: u32, height: u32) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = width as usize;
        let height = height as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in buf.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult> {
        self.preprocess_from_u8_slice(pixels, width, height)
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test RGB preprocessing output shape and channel order
    #[test]
    fn test_rgb_preprocessing() {
        let pixels = vec![
            255, 0, 0, // Red pixel
            0, 255, 0, // Green pixel
            0, 0, 255, // Blue pixel
            255, 255, 255, // White pixel
        ];

        let mut preprocessor = CpuPreProcessor::new((2, 2));
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 2, 2)
            .expect("RGB preprocessing should succeed");

        assert_eq!(result.data.shape(), &[1, 3, 2, 2]);
        assert_eq!(result.data[[0, 0, 0, 0]], 1.0, "Red pixel lands in R plane");
        assert_eq!(result.data[[0, 1, 0, 0]], 0.0);
        assert_eq!(result.data[[0, 1, 0, 1]], 1.0, "Green pixel lands in G plane");
        assert_eq!(result.data[[0, 2, 1, 0]], 1.0, "Blue pixel lands in B plane");
    }

    /// Test buffer size mismatch detection
    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_from_u8_slice(&pixels, 10, 10);

        assert!(result.is_err(), "Size mismatch should return error");
        assert!(
            result.unwrap_err().to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let pixels = vec![128u8; 800 * 600 * 3];

        let mut preprocessor = CpuPreProcessor::new((512, 512));
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 800, 600)
            .unwrap();

        // Scale should be min(512/800, 512/600) = 512/800 = 0.64
        assert_eq!(result.scale_x, 0.64, "Scale should preserve aspect ratio");
        assert_eq!(result.scale_y, 0.64);

        // Resized dimensions: 800*0.64 = 512, 600*0.64 = 384
        // Offset X: (512 - 512) / 2 = 0
        // Offset Y: (512 - 384) / 2 = 64
        assert_eq!(result.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(result.offset_y, 64.0, "Y offset should center vertically");

        assert_eq!(result.data.shape(), &[1, 3, 512, 512]);
    }

    /// Test offsets stay within a pixel of the exact float padding
    #[test]
    fn test_letterbox_offset_tracks_exact_padding() {
        for (width, height) in [(1000, 333), (333, 1000), (641, 479), (1920, 1081)] {
            let pixels = vec![0u8; width * height * 3];
            let mut preprocessor = CpuPreProcessor::new((640, 640));
            let result = preprocessor
                .preprocess_from_u8_slice(&pixels, width as u32, height as u32)
                .unwrap();

            let exact_x = (640.0 - width as f32 * result.scale_x) / 2.0;
            let exact_y = (640.0 - height as f32 * result.scale_y) / 2.0;
            assert!(
                (result.offset_x - exact_x).abs() < 1.0,
                "{}x{}: offset_x {} vs exact {}",
                width,
                height,
                result.offset_x,
                exact_x
            );
            assert!(
                (result.offset_y - exact_y).abs() < 1.0,
                "{}x{}: offset_y {} vs exact {}",
                width,
                height,
                result.offset_y,
                exact_y
            );
        }
    }

    /// Test the border is filled with the letterbox grey
    #[test]
    fn test_letterbox_border_color() {
        let pixels = vec![0u8; 800 * 600 * 3];

        let mut preprocessor = CpuPreProcessor::new((512, 512));
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 800, 600)
            .unwrap();

        let border = LETTERBOX_COLOR as f32 / 255.0;
        assert!((result.data[[0, 0, 10, 256]] - border).abs() < 1e-6, "Top border is grey");
        assert!((result.data[[0, 2, 500, 256]] - border).abs() < 1e-6, "Bottom border is grey");
        assert_eq!(result.data[[0, 1, 256, 256]], 0.0, "Image content is black");
    }

    /// Test [0, 1] normalization without mean/std
    #[test]
    fn test_unit_normalization() {
        let pixels = vec![128u8; 2 * 2 * 3];

        let mut preprocessor = CpuPreProcessor::new((64, 64));
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 2, 2)
            .unwrap();

        let expected = 128.0 / 255.0;
        for c in 0..3 {
            let value = result.data[[0, c, 32, 32]];
            assert!(
                (value - expected).abs() < 0.01,
                "Channel {} should be ~{:.3} (got {})",
                c,
                expected,
                value
            );
        }
    }

    /// Test stretch mode scales per axis without padding
    #[test]
    fn test_stretch_mode() {
        let pixels = vec![200u8; 320 * 160 * 3];

        let mut preprocessor = CpuPreProcessor::with_mode((640, 640), ResizeMode::Stretch);
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 320, 160)
            .unwrap();

        assert_eq!(result.scale_x, 2.0);
        assert_eq!(result.scale_y, 4.0);
        assert_eq!(result.offset_x, 0.0);
        assert_eq!(result.offset_y, 0.0);

        let expected = 200.0 / 255.0;
        assert!(
            (result.data[[0, 0, 0, 0]] - expected).abs() < 0.01,
            "Stretched image covers the corner"
        );
    }

    /// Test an image that already matches the input size is copied through
    #[test]
    fn test_same_size_passthrough() {
        let mut pixels = vec![0u8; 4 * 4 * 3];
        pixels[0] = 255;

        let mut preprocessor = CpuPreProcessor::new((4, 4));
        let result = preprocessor
            .preprocess_from_u8_slice(&pixels, 4, 4)
            .unwrap();

        assert_eq!(result.scale_x, 1.0);
        assert_eq!(result.offset_x, 0.0);
        assert_eq!(result.data[[0, 0, 0, 0]], 1.0);
        assert_eq!(result.data[[0, 0, 0, 1]], 0.0);
    }

    /// Test the Preprocess trait implementation
    #[test]
    fn test_preprocess_trait() {
        let pixels = vec![128u8; 100 * 100 * 3];
        let mut preprocessor = CpuPreProcessor::default();

        let result = preprocessor.preprocess(&pixels, 100, 100);
        assert!(result.is_ok());

        let preprocess_result = result.unwrap();
        assert_eq!(preprocess_result.data.shape(), &[1, 3, 640, 640]);
        assert!(preprocess_result.scale_x > 0.0);
        assert_eq!(preprocessor.input_size(), DEFAULT_INPUT_SIZE);
    }
}
