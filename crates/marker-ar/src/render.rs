//! Software renderer for the AR view.
//!
//! A small CPU rasteriser over the `u32` framebuffer the window presents
//! directly. A redraw is composed in order: clear, background blit of the
//! camera frame (or the detector's debug image), a z-buffered Gouraud pass
//! for the mesh under the intrinsics-derived projection, then the 2D HUD
//! overlay in window pixels.

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3, Vector4};

use marker_ar_core::{view_rh, FrameView, TriangleMesh};
use marker_ar_pose::SquarePose;

use crate::font::{glyph, CHAR_WIDTH};
use crate::VIEW_SCALE_FACTOR;

/// How the camera frame reaches the framebuffer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DrawMode {
    /// 1:1 pixel copy, anchored at the top-left corner.
    #[default]
    PixelCopy,
    /// Full frame scaled to the viewport.
    TextureFull,
    /// Even field only, scaled to the viewport.
    TextureHalf,
}

impl DrawMode {
    /// Deterministic cycle used by the `c` key.
    pub fn next(self) -> Self {
        match self {
            DrawMode::PixelCopy => DrawMode::TextureFull,
            DrawMode::TextureFull => DrawMode::TextureHalf,
            DrawMode::TextureHalf => DrawMode::PixelCopy,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrawMode::PixelCopy => "pixel copy",
            DrawMode::TextureFull => "texture mapping",
            DrawMode::TextureHalf => "texture mapping (even field only)",
        }
    }
}

const AMBIENT: f64 = 0.25;
const DIFFUSE: f64 = 0.75;
/// Material tint for the mesh, linear RGB.
const MATERIAL: [f64; 3] = [0.85, 0.80, 0.55];

#[inline]
fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Modelview placing the mesh on the marker: the marker pose, a spin about
/// the marker normal and a lift along it so the mesh base rests on the
/// marker plane.
pub fn marker_transform(pose: &SquarePose, rotate_deg: f32, lift: f64) -> Matrix4<f64> {
    let spin = Rotation3::from_axis_angle(&Vector3::z_axis(), (rotate_deg as f64).to_radians())
        .to_homogeneous();
    let lift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, lift));
    view_rh(&pose.transform, VIEW_SCALE_FACTOR) * spin * lift
}

/// Screen-space vertex ready for rasterisation.
#[derive(Clone, Copy)]
struct Shaded {
    x: f32,
    y: f32,
    /// NDC depth in [-1, 1] for points between the clip planes.
    z: f32,
    intensity: f32,
    visible: bool,
}

pub struct SoftwareRenderer {
    pub width: usize,
    pub height: usize,
    pub draw_mode: DrawMode,
    color: Vec<u32>,
    depth: Vec<f32>,
}

impl SoftwareRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            draw_mode: DrawMode::default(),
            color: vec![0; width * height],
            depth: vec![f32::INFINITY; width * height],
        }
    }

    /// Reset the viewport to a new window size. Intrinsics are not re-fit;
    /// the projection simply stretches to the new aspect ratio.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.color = vec![0; width * height];
        self.depth = vec![f32::INFINITY; width * height];
    }

    /// The composed frame, row-major 0RGB, ready to present.
    pub fn buffer(&self) -> &[u32] {
        &self.color
    }

    pub fn clear(&mut self) {
        self.color.fill(0);
        self.depth.fill(f32::INFINITY);
    }

    /// Blit a frame as the background using the current draw mode. The
    /// frame borrow ends with this call; nothing retains the pixels.
    pub fn blit_frame(&mut self, frame: &FrameView<'_>) {
        if frame.width == 0 || frame.height == 0 {
            return;
        }
        match self.draw_mode {
            DrawMode::PixelCopy => {
                let w = self.width.min(frame.width);
                let h = self.height.min(frame.height);
                for y in 0..h {
                    let row = y * self.width;
                    for x in 0..w {
                        let [r, g, b] = frame.rgb(x as i32, y as i32);
                        self.color[row + x] = pack(r, g, b);
                    }
                }
            }
            DrawMode::TextureFull => self.blit_scaled(frame, 1),
            DrawMode::TextureHalf => self.blit_scaled(frame, 2),
        }
    }

    /// Bilinear blit to the full viewport, sampling every `row_step`-th
    /// source row (1 = full frame, 2 = even field).
    fn blit_scaled(&mut self, frame: &FrameView<'_>, row_step: usize) {
        let src_rows = frame.height.div_ceil(row_step);
        let sx_scale = frame.width as f32 / self.width as f32;
        let sy_scale = src_rows as f32 / self.height as f32;

        for y in 0..self.height {
            let sy = (y as f32 + 0.5) * sy_scale - 0.5;
            let fy0 = sy.floor();
            let ty = sy - fy0;
            let row0 = (fy0 as i32).clamp(0, src_rows as i32 - 1) as usize * row_step;
            let row1 = ((fy0 as i32 + 1).clamp(0, src_rows as i32 - 1)) as usize * row_step;
            let out_row = y * self.width;

            for x in 0..self.width {
                let sx = (x as f32 + 0.5) * sx_scale - 0.5;
                let fx0 = sx.floor();
                let tx = sx - fx0;
                let col0 = (fx0 as i32).clamp(0, frame.width as i32 - 1);
                let col1 = (fx0 as i32 + 1).clamp(0, frame.width as i32 - 1);

                let p00 = frame.rgb(col0, row0 as i32);
                let p10 = frame.rgb(col1, row0 as i32);
                let p01 = frame.rgb(col0, row1 as i32);
                let p11 = frame.rgb(col1, row1 as i32);

                let mut rgb = [0u8; 3];
                for c in 0..3 {
                    let a = p00[c] as f32 + tx * (p10[c] as f32 - p00[c] as f32);
                    let b = p01[c] as f32 + tx * (p11[c] as f32 - p01[c] as f32);
                    rgb[c] = (a + ty * (b - a)).clamp(0.0, 255.0) as u8;
                }
                self.color[out_row + x] = pack(rgb[0], rgb[1], rgb[2]);
            }
        }
    }

    /// Draw the mesh with smooth shading under `projection * modelview`.
    ///
    /// The modelview must be rigid (GL convention, camera looking down -z);
    /// a single headlight along the view axis lights both faces.
    pub fn draw_mesh(
        &mut self,
        mesh: &TriangleMesh,
        projection: &Matrix4<f64>,
        modelview: &Matrix4<f64>,
    ) {
        let normal_m: Matrix3<f64> = modelview.fixed_view::<3, 3>(0, 0).into_owned();
        let mvp = projection * modelview;

        let mut verts = Vec::with_capacity(mesh.positions.len());
        for (p, n) in mesh.positions.iter().zip(mesh.normals.iter()) {
            let clip = mvp * Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0);
            if clip.w <= 1e-9 {
                verts.push(Shaded {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    intensity: 0.0,
                    visible: false,
                });
                continue;
            }
            let inv_w = 1.0 / clip.w;
            let sx = (clip.x * inv_w * 0.5 + 0.5) * self.width as f64;
            let sy = (1.0 - (clip.y * inv_w * 0.5 + 0.5)) * self.height as f64;

            let n_eye = normal_m * Vector3::new(n.x as f64, n.y as f64, n.z as f64);
            let ndotl = (n_eye.z / n_eye.norm().max(1e-12)).abs();
            let intensity = (AMBIENT + DIFFUSE * ndotl).min(1.0);

            verts.push(Shaded {
                x: sx as f32,
                y: sy as f32,
                z: (clip.z * inv_w) as f32,
                intensity: intensity as f32,
                visible: true,
            });
        }

        for [a, b, c] in &mesh.faces {
            let (a, b, c) = (
                verts[*a as usize],
                verts[*b as usize],
                verts[*c as usize],
            );
            if a.visible && b.visible && c.visible {
                self.raster_triangle(&a, &b, &c);
            }
        }
    }

    fn raster_triangle(&mut self, a: &Shaded, b: &Shaded, c: &Shaded) {
        let area = edge(a, b, c.x, c.y);
        if area.abs() < 1e-6 {
            return;
        }

        let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).clamp(0, self.width as i64 - 1) as usize;
        let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as usize;
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).clamp(0, self.height as i64 - 1) as usize;
        if min_x > max_x || min_y > max_y {
            return;
        }

        let inv_area = 1.0 / area;
        for y in min_y..=max_y {
            let py = y as f32 + 0.5;
            let row = y * self.width;
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let w0 = edge(b, c, px, py);
                let w1 = edge(c, a, px, py);
                let w2 = edge(a, b, px, py);
                // Accept both windings so the mesh is two-sided.
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if !inside {
                    continue;
                }

                let (b0, b1, b2) = (w0 * inv_area, w1 * inv_area, w2 * inv_area);
                let z = b0 * a.z + b1 * b.z + b2 * c.z;
                if !(-1.0..=1.0).contains(&z) {
                    continue;
                }
                let idx = row + x;
                if z < self.depth[idx] {
                    self.depth[idx] = z;
                    let i = (b0 * a.intensity + b1 * b.intensity + b2 * c.intensity) as f64;
                    self.color[idx] = pack(
                        (MATERIAL[0] * i * 255.0) as u8,
                        (MATERIAL[1] * i * 255.0) as u8,
                        (MATERIAL[2] * i * 255.0) as u8,
                    );
                }
            }
        }
    }

    /// Alpha-blend a filled rectangle over the framebuffer, window pixels.
    pub fn fill_rect_blend(&mut self, x: usize, y: usize, w: usize, h: usize, rgb: [u8; 3], alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        for py in y.min(self.height)..y1 {
            let row = py * self.width;
            for px in x..x1 {
                let dst = self.color[row + px];
                let dr = ((dst >> 16) & 0xff) as f32;
                let dg = ((dst >> 8) & 0xff) as f32;
                let db = (dst & 0xff) as f32;
                self.color[row + px] = pack(
                    (rgb[0] as f32 * alpha + dr * (1.0 - alpha)) as u8,
                    (rgb[1] as f32 * alpha + dg * (1.0 - alpha)) as u8,
                    (rgb[2] as f32 * alpha + db * (1.0 - alpha)) as u8,
                );
            }
        }
    }

    /// Draw opaque white bitmap text with its line box anchored at `(x, y)`.
    pub fn draw_text(&mut self, x: usize, y: usize, text: &str) {
        for (ci, ch) in text.chars().enumerate() {
            let gx = x + ci * CHAR_WIDTH;
            let cols = glyph(ch);
            for (col, bits) in cols.iter().enumerate() {
                for row in 0..7 {
                    if bits >> row & 1 == 0 {
                        continue;
                    }
                    let px = gx + col;
                    let py = y + 2 + row;
                    if px < self.width && py < self.height {
                        self.color[py * self.width + px] = 0x00ff_ffff;
                    }
                }
            }
        }
    }
}

#[inline]
fn edge(p0: &Shaded, p1: &Shaded, px: f32, py: f32) -> f32 {
    (p1.x - p0.x) * (py - p0.y) - (p1.y - p0.y) * (px - p0.x)
}
