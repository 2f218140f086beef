use std::fmt;

/// Pixel layouts accepted from a frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgba8 => "RGBA8",
            PixelFormat::Bgra8 => "BGRA8",
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Gray8 => "GRAY8",
        };
        f.write_str(name)
    }
}

/// Borrowed view of one camera frame.
///
/// The referenced buffer is owned by the frame source and stays valid only
/// until the next frame is requested from it.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Red/green/blue triple at `(x, y)`; zeros outside the frame.
    #[inline]
    pub fn rgb(&self, x: i32, y: i32) -> [u8; 3] {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return [0, 0, 0];
        }
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width + x as usize) * bpp;
        match self.format {
            PixelFormat::Rgba8 => [self.data[i], self.data[i + 1], self.data[i + 2]],
            PixelFormat::Bgra8 => [self.data[i + 2], self.data[i + 1], self.data[i]],
            PixelFormat::Rgb8 => [self.data[i], self.data[i + 1], self.data[i + 2]],
            PixelFormat::Gray8 => [self.data[i], self.data[i], self.data[i]],
        }
    }

    /// Rec.601 luma at `(x, y)`, integer arithmetic; zero outside the frame.
    #[inline]
    pub fn luma(&self, x: i32, y: i32) -> u8 {
        let [r, g, b] = self.rgb(x, y);
        ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
    }

    /// Convert the whole frame to a grayscale image.
    pub fn to_gray(&self) -> GrayImage {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                data.push(self.luma(x, y));
            }
        }
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Grayscale image built from even rows only (half height, rounded up).
    pub fn to_gray_even_field(&self) -> GrayImage {
        let field_h = self.height.div_ceil(2);
        let mut data = Vec::with_capacity(self.width * field_h);
        for fy in 0..field_h {
            let y = (fy * 2) as i32;
            for x in 0..self.width as i32 {
                data.push(self.luma(x, y));
            }
        }
        GrayImage {
            width: self.width,
            height: field_h,
            data,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

/// Bilinear colour sample from a frame; used by template matching.
#[inline]
pub fn sample_bilinear_rgb(frame: &FrameView<'_>, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    let p00 = frame.rgb(x0, y0);
    let p10 = frame.rgb(x0 + 1, y0);
    let p01 = frame.rgb(x0, y0 + 1);
    let p11 = frame.rgb(x0 + 1, y0 + 1);
    for c in 0..3 {
        let a = p00[c] as f32 + fx * (p10[c] as f32 - p00[c] as f32);
        let b = p01[c] as f32 + fx * (p11[c] as f32 - p01[c] as f32);
        out[c] = a + fy * (b - a);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_frame(w: usize, h: usize) -> Vec<u8> {
        let mut data = vec![0u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                let i = (y * w + x) * 4;
                // BGRA
                data[i] = v;
                data[i + 1] = v;
                data[i + 2] = v;
                data[i + 3] = 255;
            }
        }
        data
    }

    #[test]
    fn luma_of_white_bgra_is_near_255() {
        let data = checker_frame(4, 4);
        let frame = FrameView {
            width: 4,
            height: 4,
            format: PixelFormat::Bgra8,
            data: &data,
        };
        assert!(frame.luma(0, 0) >= 254);
        assert_eq!(frame.luma(1, 0), 0);
        assert_eq!(frame.luma(-1, 0), 0);
    }

    #[test]
    fn even_field_halves_height() {
        let data = checker_frame(4, 5);
        let frame = FrameView {
            width: 4,
            height: 5,
            format: PixelFormat::Bgra8,
            data: &data,
        };
        let field = frame.to_gray_even_field();
        assert_eq!(field.width, 4);
        assert_eq!(field.height, 3);
        // Row 1 of the field is row 2 of the frame.
        assert_eq!(field.data[field.width], frame.luma(0, 2));
    }

    #[test]
    fn bilinear_midpoint_averages() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![0, 200],
        };
        let v = sample_bilinear(&img.view(), 0.5, 0.0);
        assert!((v - 100.0).abs() < 1e-3);
    }
}
