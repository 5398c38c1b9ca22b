//! Download and share helpers for stored images.

use crate::error::{Result, StudioError};
use crate::image::{ImageFormat, ImagePayload};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "genstudio";

fn generated_filename(format: ImageFormat) -> String {
    format!(
        "{FILE_PREFIX}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    )
}

/// An image ready to be written out under a generated filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// `genstudio-<epoch millis>.<ext>`.
    pub filename: String,
    /// The decoded payload.
    pub payload: ImagePayload,
}

impl Download {
    /// Writes the image into `dir` and returns the written path.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        match &self.payload {
            ImagePayload::Inline { data, .. } => {
                let dir = dir.as_ref();
                std::fs::create_dir_all(dir)?;
                let path = dir.join(&self.filename);
                std::fs::write(&path, data)?;
                Ok(path)
            }
            ImagePayload::Reference(url) => Err(StudioError::InvalidRequest(format!(
                "image is stored as a reference ({url}); open it directly to save"
            ))),
        }
    }
}

/// Prepares a download of a stored image payload. Performs no I/O.
pub fn download_image(image_data: &str) -> Download {
    let payload = ImagePayload::parse(image_data);
    let format = match &payload {
        ImagePayload::Inline { format, .. } => *format,
        ImagePayload::Reference(_) => ImageFormat::Png,
    };
    Download {
        filename: generated_filename(format),
        payload,
    }
}

/// What gets handed to the platform's share facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImage {
    /// Share sheet title.
    pub title: String,
    /// Accompanying text.
    pub text: String,
    /// File name for the attached image.
    pub filename: String,
    /// MIME type of `data`.
    pub mime_type: &'static str,
    /// Image bytes.
    pub data: Vec<u8>,
}

/// A platform's native share facility.
pub trait ShareTarget: Send + Sync {
    /// Returns true if sharing can be attempted at all.
    fn is_supported(&self) -> bool;

    /// Hands the image to the platform.
    fn share(&self, image: &SharedImage) -> Result<()>;
}

/// Share target for platforms without a share facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShare;

impl ShareTarget for NoShare {
    fn is_supported(&self) -> bool {
        false
    }

    fn share(&self, _image: &SharedImage) -> Result<()> {
        Err(StudioError::ShareUnsupported)
    }
}

/// Shares a stored image payload through `target`.
///
/// Only inline payloads can be shared; references are rejected before the
/// platform is asked. A failing share call is reported as
/// [`StudioError::Share`].
pub fn share_image(target: &dyn ShareTarget, image_data: &str) -> Result<()> {
    let ImagePayload::Inline { format, data } = ImagePayload::parse(image_data) else {
        return Err(StudioError::Validation(
            "Cannot share a non-data URL directly. Please download and share.".into(),
        ));
    };

    if !target.is_supported() {
        return Err(StudioError::ShareUnsupported);
    }

    let image = SharedImage {
        title: "My AI Generated Image".into(),
        text: "Check out this image I generated with genstudio!".into(),
        filename: generated_filename(format),
        mime_type: format.mime_type(),
        data,
    };

    target.share(&image).map_err(|e| match e {
        StudioError::Share(_) | StudioError::ShareUnsupported => e,
        other => StudioError::Share(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAAA";

    struct RecordingShare {
        shared: Mutex<Vec<SharedImage>>,
        fail: bool,
    }

    impl ShareTarget for RecordingShare {
        fn is_supported(&self) -> bool {
            true
        }

        fn share(&self, image: &SharedImage) -> Result<()> {
            if self.fail {
                return Err(StudioError::Io(std::io::Error::other("share sheet closed")));
            }
            self.shared.lock().unwrap().push(image.clone());
            Ok(())
        }
    }

    #[test]
    fn test_download_generates_filename() {
        let download = download_image(PNG_DATA_URL);
        assert!(download.filename.starts_with("genstudio-"));
        assert!(download.filename.ends_with(".png"));
        assert!(download.payload.is_inline());
    }

    #[test]
    fn test_download_save_in_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let download = download_image(PNG_DATA_URL);
        let path = download.save_in(dir.path().join("out")).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_download_reference_cannot_be_saved() {
        let dir = tempfile::tempdir().unwrap();
        let download = download_image("https://example.com/image.png");
        assert!(download.save_in(dir.path()).is_err());
    }

    #[test]
    fn test_share_rejects_references() {
        let target = RecordingShare {
            shared: Mutex::new(Vec::new()),
            fail: false,
        };
        let err = share_image(&target, "https://example.com/a.png").unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));

        let notice = crate::notice::Notice::from_error(&err);
        assert_eq!(notice.title, "Error");
        assert_eq!(
            notice.description,
            "Cannot share a non-data URL directly. Please download and share."
        );
        assert!(target.shared.lock().unwrap().is_empty());
    }

    #[test]
    fn test_share_unsupported() {
        assert!(matches!(
            share_image(&NoShare, PNG_DATA_URL),
            Err(StudioError::ShareUnsupported)
        ));
    }

    #[test]
    fn test_share_success_and_failure() {
        let target = RecordingShare {
            shared: Mutex::new(Vec::new()),
            fail: false,
        };
        share_image(&target, PNG_DATA_URL).unwrap();
        let shared = target.shared.lock().unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].mime_type, "image/png");

        let failing = RecordingShare {
            shared: Mutex::new(Vec::new()),
            fail: true,
        };
        assert!(matches!(
            share_image(&failing, PNG_DATA_URL),
            Err(StudioError::Share(_))
        ));
    }
}
