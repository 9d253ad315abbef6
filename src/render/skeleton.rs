use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point;

use crate::pose::{KeypointIndex as K, Pose};

/// Limb connections (from, to). The limb takes the color of `to`.
pub const SKELETON_CONNECTIONS: [(K, K); 24] = [
    // torso and arms
    (K::Neck, K::MidHip),
    (K::Neck, K::RightShoulder),
    (K::Neck, K::LeftShoulder),
    (K::RightShoulder, K::RightElbow),
    (K::RightElbow, K::RightWrist),
    (K::LeftShoulder, K::LeftElbow),
    (K::LeftElbow, K::LeftWrist),
    // legs
    (K::MidHip, K::RightHip),
    (K::RightHip, K::RightKnee),
    (K::RightKnee, K::RightAnkle),
    (K::MidHip, K::LeftHip),
    (K::LeftHip, K::LeftKnee),
    (K::LeftKnee, K::LeftAnkle),
    // head
    (K::Neck, K::Nose),
    (K::Nose, K::RightEye),
    (K::RightEye, K::RightEar),
    (K::Nose, K::LeftEye),
    (K::LeftEye, K::LeftEar),
    // feet
    (K::LeftAnkle, K::LeftBigToe),
    (K::LeftBigToe, K::LeftSmallToe),
    (K::LeftAnkle, K::LeftHeel),
    (K::RightAnkle, K::RightBigToe),
    (K::RightBigToe, K::RightSmallToe),
    (K::RightAnkle, K::RightHeel),
];

/// Per-joint color (RGB), indexed by `KeypointIndex`
pub const JOINT_COLORS: [[u8; 3]; K::COUNT] = [
    [255, 0, 85],
    [255, 0, 0],
    [255, 85, 0],
    [255, 170, 0],
    [255, 255, 0],
    [170, 255, 0],
    [85, 255, 0],
    [0, 255, 0],
    [255, 0, 0],
    [0, 255, 85],
    [0, 255, 170],
    [0, 255, 255],
    [0, 170, 255],
    [0, 85, 255],
    [0, 0, 255],
    [255, 0, 170],
    [170, 0, 255],
    [255, 0, 255],
    [85, 0, 255],
    [0, 0, 255],
    [0, 0, 255],
    [0, 0, 255],
    [0, 255, 255],
    [0, 255, 255],
    [0, 255, 255],
];

/// Joints used for the size estimate must clear this confidence
const RECTANGLE_THRESHOLD: f32 = 0.1;
const CIRCLE_RATIO: f32 = 1.0 / 75.0;
const LINE_RATIO_WRT_CIRCLE: f32 = 0.75;

/// Stroke sizes scaled to how much of the frame the person covers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeWidths {
    pub line: i32,
    pub radius: i32,
    /// Ring width around each joint; 1 for people far from the camera
    pub ring: i32,
}

impl StrokeWidths {
    pub fn for_pose(pose: &Pose, width: u32, height: u32) -> Option<Self> {
        let (_, _, w, h) = pose.bounding_box(RECTANGLE_THRESHOLD)?;
        if w * h <= 0.0 {
            return None;
        }
        let ratio_area = (w / width as f32).max(h / height as f32).min(1.0);
        let area = (width * height) as f32;
        let thickness = (area.sqrt() * CIRCLE_RATIO * ratio_area).round().max(2.0);
        Some(Self {
            line: (thickness * LINE_RATIO_WRT_CIRCLE).round().max(1.0) as i32,
            radius: (thickness / 2.0).round() as i32,
            ring: if ratio_area > 0.05 { thickness as i32 } else { 1 },
        })
    }
}

fn joint_color(joint: K) -> Rgba<u8> {
    let [r, g, b] = JOINT_COLORS[joint as usize];
    Rgba([r, g, b, 255])
}

/// Draw the BODY_25 skeleton. Joints at or below `threshold` are skipped,
/// as are limbs touching them.
pub fn draw_skeleton(image: &mut RgbaImage, pose: &Pose, threshold: f32) {
    let Some(stroke) = StrokeWidths::for_pose(pose, image.width(), image.height()) else {
        return;
    };

    for &(from, to) in SKELETON_CONNECTIONS.iter() {
        let a = pose.get(from);
        let b = pose.get(to);
        if a.is_valid(threshold) && b.is_valid(threshold) {
            draw_thick_line(image, a.to_pixel(), b.to_pixel(), stroke.line, joint_color(to));
        }
    }

    for joint in K::ALL {
        let kp = pose.get(joint);
        if !kp.is_valid(threshold) {
            continue;
        }
        let color = joint_color(joint);
        if stroke.ring > 1 {
            // a ring as wide as the radius is a disc
            draw_filled_circle_mut(image, kp.to_pixel(), stroke.radius + stroke.ring / 2, color);
        } else {
            draw_hollow_circle_mut(image, kp.to_pixel(), stroke.radius, color);
        }
    }
}

/// Line of the given stroke width as a quad
pub fn draw_thick_line(
    image: &mut RgbaImage,
    from: (i32, i32),
    to: (i32, i32),
    width: i32,
    color: Rgba<u8>,
) {
    let (x0, y0) = (from.0 as f32, from.1 as f32);
    let (x1, y1) = (to.0 as f32, to.1 as f32);
    let len = (x1 - x0).hypot(y1 - y0);

    if width <= 1 || len < 1.0 {
        draw_line_segment_mut(image, (x0, y0), (x1, y1), color);
        return;
    }

    let half = width as f32 / 2.0;
    let nx = -(y1 - y0) / len * half;
    let ny = (x1 - x0) / len * half;
    let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
    let quad = [
        corner(x0 + nx, y0 + ny),
        corner(x1 + nx, y1 + ny),
        corner(x1 - nx, y1 - ny),
        corner(x0 - nx, y0 - ny),
    ];
    if quad[0] == quad[3] {
        draw_line_segment_mut(image, (x0, y0), (x1, y1), color);
    } else {
        draw_polygon_mut(image, &quad, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;
    use crate::render::plate::CLEAR;

    fn standing(confidence: f32) -> Pose {
        let mut pose = Pose::default();
        pose.set(K::Nose, Keypoint::new(320.0, 60.0, confidence));
        pose.set(K::Neck, Keypoint::new(320.0, 100.0, confidence));
        pose.set(K::MidHip, Keypoint::new(320.0, 260.0, confidence));
        pose.set(K::LeftAnkle, Keypoint::new(340.0, 440.0, confidence));
        pose
    }

    #[test]
    fn test_every_joint_has_a_color() {
        assert_eq!(JOINT_COLORS.len(), K::COUNT);
        for (from, to) in SKELETON_CONNECTIONS {
            assert_ne!(from, to);
        }
    }

    #[test]
    fn test_stroke_scales_with_person() {
        // 380 px tall in a 640x480 frame
        let stroke = StrokeWidths::for_pose(&standing(0.9), 640, 480).unwrap();
        // sqrt(307200) / 75 * (380/480) = 5.84 -> 6
        assert_eq!(stroke.radius, 3);
        assert_eq!(stroke.line, 5);
        assert_eq!(stroke.ring, 6);
    }

    #[test]
    fn test_no_stroke_for_single_point() {
        let mut pose = Pose::default();
        pose.set(K::Nose, Keypoint::new(10.0, 10.0, 0.9));
        assert!(StrokeWidths::for_pose(&pose, 640, 480).is_none());
    }

    #[test]
    fn test_draws_limb_in_target_joint_color() {
        let mut image = RgbaImage::from_pixel(640, 480, CLEAR);
        draw_skeleton(&mut image, &standing(0.9), 0.05);
        // midpoint of neck -> midhip, colored as MidHip
        assert_eq!(*image.get_pixel(320, 180), joint_color(K::MidHip));
    }

    #[test]
    fn test_low_confidence_draws_nothing() {
        let mut image = RgbaImage::from_pixel(640, 480, CLEAR);
        let mut pose = standing(0.9);
        for joint in [K::Nose, K::Neck, K::MidHip, K::LeftAnkle] {
            let kp = *pose.get(joint);
            pose.set(joint, Keypoint::new(kp.x, kp.y, 0.05));
        }
        draw_skeleton(&mut image, &pose, 0.05);
        assert!(image.pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_thick_line_covers_width() {
        let mut image = RgbaImage::from_pixel(40, 40, CLEAR);
        let red = Rgba([255, 0, 0, 255]);
        draw_thick_line(&mut image, (5, 20), (35, 20), 6, red);
        assert_eq!(*image.get_pixel(20, 18), red);
        assert_eq!(*image.get_pixel(20, 22), red);
        assert_eq!(*image.get_pixel(20, 30), CLEAR);
    }
}
