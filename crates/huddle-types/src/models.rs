use serde::{Deserialize, Serialize};

/// Kind of an attachment, fixed once at ingestion from the upload's MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    File,
}

impl MediaType {
    /// Classify by the top-level MIME token. Anything unrecognised is a `File`.
    pub fn from_mime(mime: &str) -> Self {
        let top = mime.split('/').next().unwrap_or_default().trim();
        if top.eq_ignore_ascii_case("image") {
            Self::Image
        } else if top.eq_ignore_ascii_case("video") {
            Self::Video
        } else if top.eq_ignore_ascii_case("audio") {
            Self::Audio
        } else {
            Self::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
            Self::File => "FILE",
        }
    }

    /// Parse the stored column value. Unknown values fall back to `File`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "IMAGE" => Self::Image,
            "VIDEO" => Self::Video,
            "AUDIO" => Self::Audio,
            _ => Self::File,
        }
    }
}

/// Per-message delivery state as seen by its author.
///
/// Ordered: `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// `read` implies `delivered` implies `sent`.
    pub fn derive(read_by_other: bool, delivered_to_other: bool) -> Self {
        if read_by_other {
            Self::Read
        } else if delivered_to_other {
            Self::Delivered
        } else {
            Self::Sent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Message,
    Mention,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Mention => "MENTION",
        }
    }

    pub fn from_stored(value: &str) -> Self {
        match value {
            "MENTION" => Self::Mention,
            _ => Self::Message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_top_level_token() {
        assert_eq!(MediaType::from_mime("image/png"), MediaType::Image);
        assert_eq!(MediaType::from_mime("IMAGE/JPEG"), MediaType::Image);
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("audio/mpeg"), MediaType::Audio);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::File);
        assert_eq!(MediaType::from_mime(""), MediaType::File);
        assert_eq!(MediaType::from_mime("imagery/x"), MediaType::File);
    }

    #[test]
    fn stored_value_roundtrip() {
        for t in [MediaType::Image, MediaType::Video, MediaType::Audio, MediaType::File] {
            assert_eq!(MediaType::from_stored(t.as_str()), t);
        }
        assert_eq!(MediaType::from_stored("garbage"), MediaType::File);
    }

    #[test]
    fn delivery_status_is_monotonic() {
        assert_eq!(DeliveryStatus::derive(false, false), DeliveryStatus::Sent);
        assert_eq!(DeliveryStatus::derive(false, true), DeliveryStatus::Delivered);
        assert_eq!(DeliveryStatus::derive(true, false), DeliveryStatus::Read);
        assert!(DeliveryStatus::Sent < DeliveryStatus::Delivered);
        assert!(DeliveryStatus::Delivered < DeliveryStatus::Read);
    }

    #[test]
    fn serializes_wire_names() {
        assert_eq!(serde_json::to_string(&MediaType::Image).unwrap(), "\"IMAGE\"");
        assert_eq!(serde_json::to_string(&DeliveryStatus::Delivered).unwrap(), "\"delivered\"");
        assert_eq!(serde_json::to_string(&NotificationKind::Mention).unwrap(), "\"MENTION\"");
    }
}
