// src/sync/types.rs

use serde::Serialize;

use crate::engine::EngineFile;

use super::activity::TrackerActivity;
use super::status::{LifecycleStatus, PauseMode};

/// Coarse media kind, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Video,
    Audio,
    Image,
    Document,
    Other,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return FileKind::Other,
        };
        match ext.as_str() {
            "mp4" | "webm" | "mkv" | "avi" | "mov" => FileKind::Video,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" => FileKind::Audio,
            "jpg" | "jpeg" | "png" | "gif" | "webp" => FileKind::Image,
            "pdf" | "txt" | "doc" | "docx" => FileKind::Document,
            _ => FileKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFile {
    pub name: String,
    pub path: String,
    pub length: u64,
    pub kind: FileKind,
    pub progress: f64,
    pub downloaded: u64,
}

impl From<EngineFile> for SessionFile {
    fn from(file: EngineFile) -> Self {
        Self {
            kind: FileKind::from_name(&file.name),
            name: file.name,
            path: file.path,
            length: file.length,
            progress: file.progress,
            downloaded: file.downloaded,
        }
    }
}

/// Counters read from the engine on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct LiveMetrics {
    pub progress: f64,
    pub download_speed: f64,
    pub upload_speed: f64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub num_peers: u32,
    /// Seconds; `f64::INFINITY` when no estimate is possible.
    pub time_remaining: f64,
    pub ready: bool,
    pub done: bool,
}

/// Externally observable state of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Content fingerprint (info hash).
    pub id: String,
    pub name: String,
    pub length: u64,
    pub files: Vec<SessionFile>,
    pub metrics: LiveMetrics,
    pub status: LifecycleStatus,
    pub tracker_activity: TrackerActivity,
    pub boost_enabled: bool,
    /// Set while paused.
    pub pause_mode: Option<PauseMode>,
}

impl SessionState {
    pub fn is_paused(&self) -> bool {
        self.status == LifecycleStatus::Paused
    }
}
