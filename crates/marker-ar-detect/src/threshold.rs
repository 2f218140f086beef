//! Frame binarisation for marker labelling.

use marker_ar_core::{GrayImage, GrayImageView};

use crate::params::{DetectorParams, ThresholdMode};

/// Binary mask, `true` where the source pixel counts as marker-dark.
#[derive(Clone, Debug)]
pub struct BinaryImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryImage {
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    /// Grayscale rendering of the mask (dark regions black), used for the
    /// detector debug display.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&d| if d { 0 } else { 255 }).collect(),
        }
    }
}

fn histogram(img: &GrayImageView<'_>) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in img.data {
        hist[v as usize] += 1;
    }
    hist
}

/// Median intensity of the image.
pub fn median_threshold(img: &GrayImageView<'_>) -> u8 {
    let hist = histogram(img);
    let total: u64 = img.data.len() as u64;
    if total == 0 {
        return 127;
    }
    let half = total / 2;
    let mut seen = 0u64;
    for (v, &count) in hist.iter().enumerate() {
        seen += count as u64;
        if seen > half {
            return v as u8;
        }
    }
    255
}

/// Otsu's threshold: maximise the between-class variance over the
/// intensity histogram.
pub fn otsu_threshold(img: &GrayImageView<'_>) -> u8 {
    let hist = histogram(img);
    let total = img.data.len() as f64;
    if total == 0.0 {
        return 127;
    }

    let mut sum_total = 0.0f64;
    for (v, &count) in hist.iter().enumerate() {
        sum_total += v as f64 * count as f64;
    }

    let mut w_b = 0.0f64;
    let mut sum_b = 0.0f64;
    let mut best_var = -1.0f64;
    let mut best_t = 127u8;

    for (t, &count) in hist.iter().enumerate() {
        w_b += count as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * count as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Adaptive kernel radius (9x9 block) and dark bias.
const ADAPTIVE_RADIUS: i32 = 4;
const ADAPTIVE_BIAS: i32 = -7;

/// Per-pixel adaptive binarisation against the local block mean.
pub fn adaptive_binarize(img: &GrayImageView<'_>) -> BinaryImage {
    let w = img.width;
    let h = img.height;

    // Summed-area table with a zero row/column in front.
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += img.data[y * w + x] as u64;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let area_sum = |x0: i32, y0: i32, x1: i32, y1: i32| -> u64 {
        let x0 = x0.max(0) as usize;
        let y0 = y0.max(0) as usize;
        let x1 = (x1.min(w as i32 - 1) + 1) as usize;
        let y1 = (y1.min(h as i32 - 1) + 1) as usize;
        integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
            - integral[y0 * (w + 1) + x1]
            - integral[y1 * (w + 1) + x0]
    };

    let mut data = vec![false; w * h];
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let x0 = x - ADAPTIVE_RADIUS;
            let y0 = y - ADAPTIVE_RADIUS;
            let x1 = x + ADAPTIVE_RADIUS;
            let y1 = y + ADAPTIVE_RADIUS;
            let count =
                ((x1.min(w as i32 - 1) - x0.max(0) + 1) * (y1.min(h as i32 - 1) - y0.max(0) + 1)) as u64;
            let mean = (area_sum(x0, y0, x1, y1) / count.max(1)) as i32;
            let v = img.data[y as usize * w + x as usize] as i32;
            data[y as usize * w + x as usize] = v < mean + ADAPTIVE_BIAS;
        }
    }

    BinaryImage {
        width: w,
        height: h,
        data,
    }
}

/// Binarise with the mode selected in `params`.
///
/// Returns the mask and the effective global threshold (`None` for the
/// adaptive mode, which has no single value to report).
pub fn binarize(img: &GrayImageView<'_>, params: &DetectorParams) -> (BinaryImage, Option<u8>) {
    let thresh = match params.thresh_mode {
        ThresholdMode::Manual => params.manual_thresh,
        ThresholdMode::AutoMedian => median_threshold(img),
        ThresholdMode::AutoOtsu => otsu_threshold(img),
        ThresholdMode::AutoAdaptive => return (adaptive_binarize(img), None),
    };

    let data = img.data.iter().map(|&v| v < thresh).collect();
    (
        BinaryImage {
            width: img.width,
            height: img.height,
            data,
        },
        Some(thresh),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal_image() -> GrayImage {
        // 60% background at 200, 40% foreground at 40.
        let mut data = vec![200u8; 60];
        data.extend(vec![40u8; 40]);
        GrayImage {
            width: 10,
            height: 10,
            data,
        }
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let img = bimodal_image();
        let t = otsu_threshold(&img.view());
        assert!(t > 40 && t <= 200, "threshold {t} outside the modes");
    }

    #[test]
    fn median_of_constant_image_is_that_value() {
        let img = GrayImage {
            width: 4,
            height: 4,
            data: vec![90u8; 16],
        };
        assert_eq!(median_threshold(&img.view()), 90);
    }

    #[test]
    fn manual_binarize_reports_threshold() {
        let img = bimodal_image();
        let params = DetectorParams {
            manual_thresh: 100,
            ..DetectorParams::default()
        };
        let (mask, thresh) = binarize(&img.view(), &params);
        assert_eq!(thresh, Some(100));
        assert!(!mask.get(0, 0));
        assert!(mask.get(0, 6));
    }

    #[test]
    fn adaptive_mode_reports_no_global_threshold() {
        let img = bimodal_image();
        let params = DetectorParams {
            thresh_mode: ThresholdMode::AutoAdaptive,
            ..DetectorParams::default()
        };
        let (_, thresh) = binarize(&img.view(), &params);
        assert_eq!(thresh, None);
    }

    #[test]
    fn adaptive_marks_dark_spot_on_flat_background() {
        let mut data = vec![180u8; 32 * 32];
        for y in 12..20 {
            for x in 12..20 {
                data[y * 32 + x] = 20;
            }
        }
        let img = GrayImage {
            width: 32,
            height: 32,
            data,
        };
        let mask = adaptive_binarize(&img.view());
        assert!(mask.get(15, 15));
        assert!(!mask.get(2, 2));
    }
}
