//! Track manager interface consumed by the control socket.
//!
//! The control channel only needs three playback operations. Listing,
//! status and reload are answered by placeholder handlers in
//! [`crate::protocol`] until the manager grows real support for them.

use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Playback operations invoked by the command dispatcher.
///
/// Calls arrive sequentially from the control socket worker thread.
pub trait TrackManager: Send + Sync {
    /// Start playing a track. Returns false if the track could not be played.
    fn play(&self, id: &str) -> bool;

    /// Stop a playing track. Returns false if the track could not be stopped.
    fn stop(&self, id: &str) -> bool;

    /// Stop every playing track.
    fn stop_all(&self) -> bool;
}

/// In-memory track manager used by the daemon binary.
///
/// Tracks are identified by id only; an empty catalog accepts any id.
pub struct PlaybackTable {
    /// Ids that may be played (empty = unrestricted)
    catalog: HashSet<String>,
    /// Currently playing tracks and when they started
    playing: RwLock<HashMap<String, DateTime<Local>>>,
}

impl PlaybackTable {
    /// Create a table restricted to `catalog` (empty = any id).
    pub fn new<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            catalog: catalog.into_iter().map(Into::into).collect(),
            playing: RwLock::new(HashMap::new()),
        }
    }

    fn in_catalog(&self, id: &str) -> bool {
        self.catalog.is_empty() || self.catalog.contains(id)
    }
}

impl TrackManager for PlaybackTable {
    fn play(&self, id: &str) -> bool {
        if !self.in_catalog(id) {
            warn!(track = id, "Track not in catalog");
            return false;
        }

        let Ok(mut playing) = self.playing.write() else {
            return false;
        };
        let started = Local::now();
        if playing.insert(id.to_string(), started).is_some() {
            debug!(track = id, "Restarting track");
        }
        info!(
            track = id,
            started = %started.format("%H:%M:%S"),
            playing = playing.len(),
            "Playing track"
        );
        true
    }

    fn stop(&self, id: &str) -> bool {
        let Ok(mut playing) = self.playing.write() else {
            return false;
        };
        match playing.remove(id) {
            Some(started) => {
                let elapsed = Local::now().signed_duration_since(started);
                info!(track = id, played_secs = elapsed.num_seconds(), "Stopped track");
                true
            }
            None => {
                debug!(track = id, "Stop requested for track that is not playing");
                false
            }
        }
    }

    fn stop_all(&self) -> bool {
        let Ok(mut playing) = self.playing.write() else {
            return false;
        };
        let count = playing.len();
        playing.clear();
        info!(count, "Stopped all tracks");
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TrackManager;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Track manager that records every call and returns a fixed result.
    pub struct RecordingTracks {
        succeed: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingTracks {
        pub fn new(succeed: bool) -> Self {
            Self {
                succeed: AtomicBool::new(succeed),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> bool {
            self.calls.lock().unwrap().push(call);
            self.succeed.load(Ordering::SeqCst)
        }
    }

    impl TrackManager for RecordingTracks {
        fn play(&self, id: &str) -> bool {
            self.record(format!("play {id}"))
        }

        fn stop(&self, id: &str) -> bool {
            self.record(format!("stop {id}"))
        }

        fn stop_all(&self) -> bool {
            self.record("stop-all".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_and_stop() {
        let table = PlaybackTable::new(Vec::<String>::new());

        assert!(table.play("track42"));
        assert!(table.stop("track42"));

        // Stopping again fails
        assert!(!table.stop("track42"));
    }

    #[test]
    fn test_stop_unknown_track() {
        let table = PlaybackTable::new(Vec::<String>::new());
        assert!(!table.stop("never-played"));
    }

    #[test]
    fn test_catalog_restricts_play() {
        let table = PlaybackTable::new(["intro", "loop-a"]);

        assert!(table.play("intro"));
        assert!(!table.play("outro"));
        assert!(table.stop("intro"));
        assert!(!table.stop("outro"));
    }

    #[test]
    fn test_stop_all() {
        let table = PlaybackTable::new(Vec::<String>::new());
        table.play("a");
        table.play("b");

        assert!(table.stop_all());
        assert!(!table.stop("a"));
        assert!(!table.stop("b"));

        // Nothing playing still succeeds
        assert!(table.stop_all());
    }

    #[test]
    fn test_replay_keeps_single_entry() {
        let table = PlaybackTable::new(Vec::<String>::new());
        assert!(table.play("a"));
        assert!(table.play("a"));
        assert!(table.stop("a"));
        assert!(!table.stop("a"));
    }
}
