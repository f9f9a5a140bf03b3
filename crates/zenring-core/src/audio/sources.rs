use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ambient sound the user can pick before a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    #[default]
    Forest,
    Stream,
    /// No ambient bed; the ambient track is faded and paused.
    #[serde(rename = "none")]
    Silent,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [SoundKind::Forest, SoundKind::Silent, SoundKind::Stream];

    pub fn as_str(self) -> &'static str {
        match self {
            SoundKind::Forest => "forest",
            SoundKind::Stream => "stream",
            SoundKind::Silent => "none",
        }
    }
}

impl fmt::Display for SoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forest" => Ok(SoundKind::Forest),
            "stream" => Ok(SoundKind::Stream),
            "none" | "silent" => Ok(SoundKind::Silent),
            other => Err(format!("unknown sound '{other}' (expected forest, stream or none)")),
        }
    }
}

const FOREST_URL: &str = "https://cdn.pixabay.com/audio/2022/01/18/audio_74d9c39d87.mp3";
const STREAM_URL: &str = "https://assets.mixkit.co/active_storage/sfx/2429/2429-preview.mp3";
const CHIME_URL: &str = "https://cdn.pixabay.com/audio/2022/03/14/audio_03a30685cc.mp3";

/// Streamable sources for every track the engine can play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSources {
    #[serde(default = "default_forest")]
    pub forest: String,
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default = "default_chime")]
    pub chime: String,
}

fn default_forest() -> String {
    FOREST_URL.into()
}
fn default_stream() -> String {
    STREAM_URL.into()
}
fn default_chime() -> String {
    CHIME_URL.into()
}

impl Default for SoundSources {
    fn default() -> Self {
        Self {
            forest: default_forest(),
            stream: default_stream(),
            chime: default_chime(),
        }
    }
}

impl SoundSources {
    /// Source for an ambient kind. `Silent` has none.
    pub fn ambient(&self, kind: SoundKind) -> Option<&str> {
        match kind {
            SoundKind::Forest => Some(&self.forest),
            SoundKind::Stream => Some(&self.stream),
            SoundKind::Silent => None,
        }
    }

    pub fn chime(&self) -> &str {
        &self.chime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_maps_to_no_source() {
        let sources = SoundSources::default();
        assert_eq!(sources.ambient(SoundKind::Silent), None);
        assert_eq!(sources.ambient(SoundKind::Forest), Some(FOREST_URL));
        assert_eq!(sources.chime(), CHIME_URL);
    }

    #[test]
    fn parses_user_spellings() {
        assert_eq!("Stream".parse::<SoundKind>(), Ok(SoundKind::Stream));
        assert_eq!("none".parse::<SoundKind>(), Ok(SoundKind::Silent));
        assert_eq!("silent".parse::<SoundKind>(), Ok(SoundKind::Silent));
        assert!("rain".parse::<SoundKind>().is_err());
    }

    #[test]
    fn serializes_silent_as_none() {
        let json = serde_json::to_string(&SoundKind::Silent).unwrap();
        assert_eq!(json, "\"none\"");
        let back: SoundKind = serde_json::from_str("\"forest\"").unwrap();
        assert_eq!(back, SoundKind::Forest);
    }
}
