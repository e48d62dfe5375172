use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The two kinds of asset a video record can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Thumbnail,
    Video,
}

impl AssetKind {
    /// Exact-match allow-list of declared content types for this kind.
    pub fn allowed_content_types(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Thumbnail => &["image/jpeg", "image/png"],
            AssetKind::Video => &["video/mp4"],
        }
    }

    /// Name of the multipart field carrying the asset bytes.
    pub fn form_field(&self) -> &'static str {
        match self {
            AssetKind::Thumbnail => "thumbnail",
            AssetKind::Video => "video",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Thumbnail => "thumbnail",
            AssetKind::Video => "video",
        }
    }
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Coarse orientation class of a video, used only to prefix its storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectBucket {
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
    Other,
}

impl AspectBucket {
    pub fn prefix(&self) -> &'static str {
        match self {
            AspectBucket::Landscape => "landscape",
            AspectBucket::Portrait => "portrait",
            AspectBucket::Other => "other",
        }
    }
}

impl Display for AspectBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.prefix())
    }
}
