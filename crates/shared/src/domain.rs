use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_newtype!(UploadedName);
name_newtype!(OutputName);
name_newtype!(RecordId);

/// Extensions rendered as still images. Everything else is played back as video.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleCounts {
    #[serde(default)]
    pub motorbikes: u32,
    #[serde(default)]
    pub cars: u32,
    #[serde(default)]
    pub trucks: u32,
}

impl VehicleCounts {
    pub fn new(motorbikes: u32, cars: u32, trucks: u32) -> Self {
        Self {
            motorbikes,
            cars,
            trucks,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.motorbikes) + u64::from(self.cars) + u64::from(self.trucks)
    }
}

/// Normalized file-type tag as reported by the upload endpoint (`"jpg"`, `"mp4"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileKind(String);

impl FileKind {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(
            raw.as_ref()
                .trim()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
        )
    }

    /// Derives the kind from the text after the last `.` of a file name.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        if extension.trim().is_empty() {
            return None;
        }
        Some(Self::new(extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileKind {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<FileKind> for String {
    fn from(value: FileKind) -> Self {
        value.0
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Closed two-way switch: a missing or unrecognized kind is treated as video.
    pub fn classify(kind: Option<&FileKind>) -> Self {
        match kind {
            Some(kind) if IMAGE_EXTENSIONS.contains(&kind.as_str()) => MediaKind::Image,
            _ => MediaKind::Video,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}
