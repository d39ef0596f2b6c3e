//! Domain error type shared by the pose, video, storage and pipeline layers.

use thiserror::Error;

/// Which side of the accepted duration range a video fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBound {
    TooShort,
    TooLong,
}

/// Errors raised while processing a video
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be probed or decoded
    #[error("Video processing failed: {0}")]
    VideoProcessing(String),

    /// Encoding or muxing the rendered output failed
    #[error("Video encoding failed: {0}")]
    VideoEncoding(String),

    /// The model could not be loaded or inference failed
    #[error("Pose estimation failed: {0}")]
    PoseEstimation(String),

    /// Upload, download or URL signing failed
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// Video is shorter or longer than the accepted range
    #[error("{}", duration_message(.bound, .duration_sec, .limit_sec))]
    VideoDuration {
        bound: DurationBound,
        duration_sec: f64,
        limit_sec: f64,
    },

    /// Caller supplied a value outside its domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn duration_message(bound: &DurationBound, duration_sec: &f64, limit_sec: &f64) -> String {
    match bound {
        DurationBound::TooShort => {
            format!("Video too short: {duration_sec:.1}s (minimum: {limit_sec:.1}s)")
        }
        DurationBound::TooLong => format!(
            "Video too long: {duration_sec:.1}s (maximum: {:.0} minutes)",
            limit_sec / 60.0
        ),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_message_names_minimum() {
        let err = Error::VideoDuration {
            bound: DurationBound::TooShort,
            duration_sec: 0.5,
            limit_sec: 3.0,
        };
        assert_eq!(err.to_string(), "Video too short: 0.5s (minimum: 3.0s)");
    }

    #[test]
    fn too_long_message_in_minutes() {
        let err = Error::VideoDuration {
            bound: DurationBound::TooLong,
            duration_sec: 1000.0,
            limit_sec: 420.0,
        };
        assert_eq!(err.to_string(), "Video too long: 1000.0s (maximum: 7 minutes)");
    }

    #[test]
    fn io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }
}
