//! Pose estimation over RGB video frames
//!
//! - **Domain types** - [`KeypointName`], [`Point2D`], [`Keypoint`], [`Pose`]
//! - **Inference** - [`PoseEstimator`] trait with a MoveNet `MultiPose` backend
//! - **Letterboxing** - aspect-preserving resize to the model's square input
//! - **Overlay** - skeleton rendering back onto the source frame

pub mod letterbox;
pub mod movenet;
pub mod overlay;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::video::VideoMeta;

pub use letterbox::Letterbox;
pub use movenet::{MoveNetConfig, MoveNetEstimator};
pub use overlay::{PoseOverlay, SKELETON_EDGES};

/// The 17 COCO keypoints in the order MoveNet emits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointName {
    /// All keypoints in model output order
    pub const ALL: [Self; 17] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// Normalized image coordinate, both axes in `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&x) {
            return Err(Error::InvalidInput(format!(
                "x must be between 0.0 and 1.0, got {x}"
            )));
        }
        if !(0.0..=1.0).contains(&y) {
            return Err(Error::InvalidInput(format!(
                "y must be between 0.0 and 1.0, got {y}"
            )));
        }
        Ok(Self { x, y })
    }
}

/// A single detected joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: KeypointName,
    pub point: Point2D,
    /// Detection confidence in `[0.0, 1.0]`
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: KeypointName, point: Point2D, score: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&score) {
            return Err(Error::InvalidInput(format!(
                "score must be between 0.0 and 1.0, got {score}"
            )));
        }
        Ok(Self { name, point, score })
    }
}

/// One person detected in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Zero-based index of the frame the pose was found in
    pub frame_index: u64,
    /// Keypoints in [`KeypointName::ALL`] order
    pub keypoints: Vec<Keypoint>,
    /// Person-level confidence (bounding-box score)
    pub overall_score: f32,
}

impl Pose {
    /// Look up a keypoint by name
    #[must_use]
    pub fn keypoint(&self, name: KeypointName) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.name == name)
    }
}

/// Pose analysis results for a whole video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedVideo {
    pub video_path: String,
    pub meta: VideoMeta,
    #[serde(default)]
    pub poses: Vec<Pose>,
}

impl AnalyzedVideo {
    #[must_use]
    pub fn new(video_path: impl Into<String>, meta: VideoMeta) -> Self {
        Self {
            video_path: video_path.into(),
            meta,
            poses: Vec::new(),
        }
    }

    pub fn add_pose(&mut self, pose: Pose) {
        self.poses.push(pose);
    }

    /// All poses detected in the given frame
    #[must_use]
    pub fn poses_for_frame(&self, frame_index: u64) -> Vec<&Pose> {
        self.poses
            .iter()
            .filter(|p| p.frame_index == frame_index)
            .collect()
    }
}

/// Keypoint detector run once per frame.
///
/// Implementations return every person whose overall score clears their own
/// detection threshold; callers may filter further.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn estimate(&self, frame: &RgbImage) -> Result<Vec<Pose>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> VideoMeta {
        VideoMeta {
            width: 640,
            height: 480,
            fps: 30.0,
            total_frames: 90,
            duration_sec: 3.0,
            has_audio: false,
        }
    }

    #[test]
    fn point_rejects_out_of_range() {
        assert!(Point2D::new(0.5, 0.5).is_ok());
        assert!(Point2D::new(0.0, 1.0).is_ok());
        assert!(Point2D::new(1.1, 0.5).is_err());
        assert!(Point2D::new(0.5, -0.1).is_err());
    }

    #[test]
    fn keypoint_rejects_bad_score() {
        let p = Point2D::new(0.1, 0.2).unwrap();
        assert!(Keypoint::new(KeypointName::Nose, p, 0.9).is_ok());
        let err = Keypoint::new(KeypointName::Nose, p, 1.5).unwrap_err();
        assert!(err.to_string().contains("score must be between"));
    }

    #[test]
    fn keypoint_names_serialize_snake_case() {
        let json = serde_json::to_string(&KeypointName::LeftShoulder).unwrap();
        assert_eq!(json, "\"left_shoulder\"");
        for name in KeypointName::ALL {
            assert_eq!(
                serde_json::to_string(&name).unwrap(),
                format!("\"{}\"", name.as_str())
            );
        }
    }

    #[test]
    fn analyzed_video_groups_by_frame() {
        let mut video = AnalyzedVideo::new("input.mp4", meta());
        for frame_index in [0, 1, 1, 2] {
            video.add_pose(Pose {
                frame_index,
                keypoints: Vec::new(),
                overall_score: 0.8,
            });
        }
        assert_eq!(video.poses_for_frame(1).len(), 2);
        assert_eq!(video.poses_for_frame(2).len(), 1);
        assert!(video.poses_for_frame(5).is_empty());
    }

    #[test]
    fn pose_keypoint_lookup() {
        let kp = Keypoint::new(KeypointName::RightKnee, Point2D::new(0.3, 0.7).unwrap(), 0.6)
            .unwrap();
        let pose = Pose {
            frame_index: 0,
            keypoints: vec![kp],
            overall_score: 0.6,
        };
        assert_eq!(pose.keypoint(KeypointName::RightKnee), Some(&kp));
        assert!(pose.keypoint(KeypointName::Nose).is_none());
    }
}
