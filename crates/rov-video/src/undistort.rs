//! 镜头去畸变
//!
//! 针孔相机 + Brown-Conrady 畸变模型（k1, k2 径向，p1, p2 切向）。
//!
//! 流程：
//! 1. 在图像边界上取 9×9 网格点，迭代反畸变，得到内/外包围矩形
//! 2. 按 `alpha` 在“只保留有效像素”（0）与“保留全部源像素”（1）之间插值出新内参
//! 3. 用新内参重新计算内矩形，取整后与图像求交作为有效区域（ROI）
//! 4. 对 ROI 内每个目标像素预先计算源坐标，之后每帧只做双线性采样

use crate::error::VideoError;
use crate::frame::{BYTES_PER_PIXEL, Frame};
use nalgebra::{Matrix3, Vector3};

/// 相机内参与畸变系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCalibration {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

impl CameraCalibration {
    /// 1280×720 水下相机的标定结果
    pub const REFERENCE: CameraCalibration = CameraCalibration {
        fx: 605.571998544127,
        fy: 603.160880757148,
        cx: 641.654856317165,
        cy: 343.186661021091,
        k1: -0.326257291325774,
        k2: 0.0854715353372504,
        p1: 0.0,
        p2: 0.0,
    };

    /// 内参矩阵 K
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// 对归一化坐标施加畸变
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    /// 迭代求解归一化坐标的反畸变
    pub fn undistort_normalized(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let icdist = 1.0 / (1.0 + self.k1 * r2 + self.k2 * r2 * r2);
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) * icdist;
            y = (yd - dy) * icdist;
        }
        (x, y)
    }
}

impl Default for CameraCalibration {
    fn default() -> Self {
        Self::REFERENCE
    }
}

const UNDISTORT_ITERATIONS: usize = 20;
const GRID: usize = 9;
/// ROI 取整容差，吸收浮点误差（避免 1e-15 被 ceil 成 1）
const ROI_EPS: f64 = 1e-6;

/// 整数像素矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
struct RectF {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// 边界网格点反畸变后的内/外包围矩形
///
/// `project` 为 None 时返回归一化坐标，否则用给定内参投影到像素坐标。
fn boundary_rects(
    calib: &CameraCalibration,
    width: u32,
    height: u32,
    project: Option<&Matrix3<f64>>,
) -> (RectF, RectF) {
    let (mut ox0, mut oy0, mut ox1, mut oy1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    let (mut ix0, mut iy0, mut ix1, mut iy1) = (f64::MIN, f64::MIN, f64::MAX, f64::MAX);

    let step_x = (width as f64 - 1.0) / (GRID - 1) as f64;
    let step_y = (height as f64 - 1.0) / (GRID - 1) as f64;

    for gy in 0..GRID {
        for gx in 0..GRID {
            let u = gx as f64 * step_x;
            let v = gy as f64 * step_y;
            let xd = (u - calib.cx) / calib.fx;
            let yd = (v - calib.cy) / calib.fy;
            let (mut x, mut y) = calib.undistort_normalized(xd, yd);
            if let Some(k) = project {
                let p = k * Vector3::new(x, y, 1.0);
                x = p.x;
                y = p.y;
            }

            ox0 = ox0.min(x);
            oy0 = oy0.min(y);
            ox1 = ox1.max(x);
            oy1 = oy1.max(y);

            if gx == 0 {
                ix0 = ix0.max(x);
            }
            if gx == GRID - 1 {
                ix1 = ix1.min(x);
            }
            if gy == 0 {
                iy0 = iy0.max(y);
            }
            if gy == GRID - 1 {
                iy1 = iy1.min(y);
            }
        }
    }

    let inner = RectF {
        x: ix0,
        y: iy0,
        width: ix1 - ix0,
        height: iy1 - iy0,
    };
    let outer = RectF {
        x: ox0,
        y: oy0,
        width: ox1 - ox0,
        height: oy1 - oy0,
    };
    (inner, outer)
}

/// 计算最优新内参与有效区域
///
/// # 参数
/// - `alpha`: 0 表示新图像只含有效像素，1 表示保留全部源像素（四周可能出现黑边）
pub fn optimal_new_camera_matrix(
    calib: &CameraCalibration,
    width: u32,
    height: u32,
    alpha: f64,
) -> (Matrix3<f64>, Roi) {
    let alpha = alpha.clamp(0.0, 1.0);
    let (inner, outer) = boundary_rects(calib, width, height, None);
    let w1 = width as f64 - 1.0;
    let h1 = height as f64 - 1.0;

    let fx0 = w1 / inner.width;
    let fy0 = h1 / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;

    let fx1 = w1 / outer.width;
    let fy1 = h1 / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let lerp = |a: f64, b: f64| a * (1.0 - alpha) + b * alpha;
    let new_k = Matrix3::new(
        lerp(fx0, fx1),
        0.0,
        lerp(cx0, cx1),
        0.0,
        lerp(fy0, fy1),
        lerp(cy0, cy1),
        0.0,
        0.0,
        1.0,
    );

    let (valid, _) = boundary_rects(calib, width, height, Some(&new_k));
    let x0 = (valid.x - ROI_EPS).ceil().max(0.0);
    let y0 = (valid.y - ROI_EPS).ceil().max(0.0);
    let x1 = (valid.x + valid.width + ROI_EPS).floor().min(width as f64);
    let y1 = (valid.y + valid.height + ROI_EPS).floor().min(height as f64);
    let roi = Roi {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0).max(0.0) as u32,
        height: (y1 - y0).max(0.0) as u32,
    };

    (new_k, roi)
}

/// 预计算的去畸变映射（只覆盖 ROI）
pub struct UndistortMap {
    width: u32,
    height: u32,
    new_camera_matrix: Matrix3<f64>,
    roi: Roi,
    /// ROI 内每个目标像素对应的源像素坐标（行优先）
    map: Vec<[f32; 2]>,
}

impl UndistortMap {
    /// 以 `alpha = 1` 构建映射
    pub fn new(calib: &CameraCalibration, width: u32, height: u32) -> Self {
        Self::with_alpha(calib, width, height, 1.0)
    }

    pub fn with_alpha(calib: &CameraCalibration, width: u32, height: u32, alpha: f64) -> Self {
        let (new_k, roi) = optimal_new_camera_matrix(calib, width, height, alpha);
        let k = calib.camera_matrix();
        // 新内参为上三角且对角元非零，逆矩阵总是存在
        let new_k_inv = new_k.try_inverse().unwrap_or_else(Matrix3::identity);

        let mut map = Vec::with_capacity(roi.width as usize * roi.height as usize);
        for v in roi.y..roi.y + roi.height {
            for u in roi.x..roi.x + roi.width {
                let ray = new_k_inv * Vector3::new(u as f64, v as f64, 1.0);
                let (xd, yd) = calib.distort(ray.x / ray.z, ray.y / ray.z);
                let src = k * Vector3::new(xd, yd, 1.0);
                map.push([src.x as f32, src.y as f32]);
            }
        }

        Self {
            width,
            height,
            new_camera_matrix: new_k,
            roi,
            map,
        }
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn new_camera_matrix(&self) -> &Matrix3<f64> {
        &self.new_camera_matrix
    }

    /// 去畸变并裁剪到 ROI
    ///
    /// # 错误
    /// - `VideoError::InvalidResolution`: 帧尺寸与映射不一致
    pub fn apply(&self, frame: &Frame) -> Result<Frame, VideoError> {
        if frame.width != self.width
            || frame.height != self.height
            || frame.data.len() != Frame::byte_len(self.width, self.height)
        {
            return Err(VideoError::InvalidResolution {
                width: frame.width,
                height: frame.height,
            });
        }

        let mut data = Vec::with_capacity(self.map.len() * BYTES_PER_PIXEL);
        for &[sx, sy] in &self.map {
            data.extend_from_slice(&sample_bilinear(frame, sx, sy));
        }

        Ok(Frame {
            width: self.roi.width,
            height: self.roi.height,
            seq: frame.seq,
            data,
        })
    }
}

impl std::fmt::Debug for UndistortMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndistortMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("roi", &self.roi)
            .finish()
    }
}

/// 双线性采样，越界像素按黑色处理
fn sample_bilinear(frame: &Frame, sx: f32, sy: f32) -> [u8; 3] {
    let x0 = sx.floor();
    let y0 = sy.floor();
    let ax = sx - x0;
    let ay = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |x: i64, y: i64| -> [f32; 3] {
        if x < 0 || y < 0 || x >= frame.width as i64 || y >= frame.height as i64 {
            return [0.0; 3];
        }
        let offset = (y as usize * frame.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            frame.data[offset] as f32,
            frame.data[offset + 1] as f32,
            frame.data[offset + 2] as f32,
        ]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - ax) + p10[c] * ax;
        let bottom = p01[c] * (1.0 - ax) + p11[c] * ax;
        out[c] = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinhole(width: u32, height: u32) -> CameraCalibration {
        CameraCalibration {
            fx: 100.0,
            fy: 100.0,
            cx: (width as f64 - 1.0) / 2.0,
            cy: (height as f64 - 1.0) / 2.0,
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
        }
    }

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity(Frame::byte_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        Frame {
            width,
            height,
            seq: 7,
            data,
        }
    }

    #[test]
    fn test_distort_roundtrip() {
        let calib = CameraCalibration::REFERENCE;
        for &(x, y) in &[(0.0, 0.0), (0.3, -0.2), (-0.8, 0.5)] {
            let (xd, yd) = calib.distort(x, y);
            let (xu, yu) = calib.undistort_normalized(xd, yd);
            assert!((xu - x).abs() < 1e-6, "x: {} vs {}", xu, x);
            assert!((yu - y).abs() < 1e-6, "y: {} vs {}", yu, y);
        }
    }

    #[test]
    fn test_no_distortion_keeps_camera_matrix() {
        let calib = pinhole(32, 24);
        let (new_k, roi) = optimal_new_camera_matrix(&calib, 32, 24, 1.0);

        let k = calib.camera_matrix();
        assert!((new_k - k).abs().max() < 1e-6);
        assert_eq!((roi.x, roi.y), (0, 0));
        assert!(roi.width >= 30 && roi.width <= 32);
        assert!(roi.height >= 22 && roi.height <= 24);
    }

    #[test]
    fn test_no_distortion_map_is_identity() {
        let calib = pinhole(32, 24);
        let map = UndistortMap::new(&calib, 32, 24);
        let input = gradient(32, 24);
        let output = map.apply(&input).unwrap();

        let roi = map.roi();
        assert_eq!(output.width, roi.width);
        assert_eq!(output.height, roi.height);
        assert_eq!(output.seq, 7);
        for (x, y) in [(0, 0), (5, 3), (roi.width - 1, roi.height - 1)] {
            let got = output.pixel(x, y).unwrap();
            let want = input.pixel(roi.x + x, roi.y + y).unwrap();
            for c in 0..3 {
                assert!((got[c] as i32 - want[c] as i32).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_barrel_distortion_zooms_out_with_alpha_one() {
        let calib = CameraCalibration::REFERENCE;
        let (new_k, roi) = optimal_new_camera_matrix(&calib, 1280, 720, 1.0);

        assert!(new_k[(0, 0)] < calib.fx);
        assert!(new_k[(1, 1)] < calib.fy);
        assert!(roi.width > 0 && roi.width < 1280);
        assert!(roi.height > 0 && roi.height < 720);
        assert!(roi.x + roi.width <= 1280);
        assert!(roi.y + roi.height <= 720);
    }

    #[test]
    fn test_alpha_zero_fills_frame() {
        let calib = CameraCalibration::REFERENCE;
        let (k1, roi1) = optimal_new_camera_matrix(&calib, 1280, 720, 1.0);
        let (k0, roi0) = optimal_new_camera_matrix(&calib, 1280, 720, 0.0);

        assert!(k0[(0, 0)] > k1[(0, 0)]);
        assert!(roi0.width >= roi1.width);
    }

    #[test]
    fn test_apply_rejects_wrong_size() {
        let calib = pinhole(8, 8);
        let map = UndistortMap::new(&calib, 8, 8);
        let frame = gradient(4, 4);
        assert!(matches!(
            map.apply(&frame),
            Err(VideoError::InvalidResolution { width: 4, height: 4 })
        ));
    }

    #[test]
    fn test_sample_outside_is_black() {
        let frame = gradient(4, 4);
        assert_eq!(sample_bilinear(&frame, -5.0, -5.0), [0, 0, 0]);
        assert_eq!(sample_bilinear(&frame, 1.0, 2.0), [8, 16, 128]);
    }
}
