use std::path::PathBuf;

/// Failures surfaced by export, print and configuration loading.
///
/// Contract violations inside the engine are not represented here; they panic.
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("could not create a {width}x{height} surface")]
    SurfaceCreation { width: u32, height: u32 },
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid export geometry: {0}")]
    InvalidGeometry(String),
}

impl CanvasError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failure() {
        let err = CanvasError::io("out.png", std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "i/o error on out.png: disk full");

        let err = CanvasError::SurfaceCreation {
            width: 0,
            height: 10,
        };
        assert_eq!(err.to_string(), "could not create a 0x10 surface");
    }

    #[test]
    fn test_json_errors_convert() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CanvasError = parse.unwrap_err().into();
        assert!(matches!(err, CanvasError::Config(_)));
    }
}
