//! Earcon playback.
//!
//! A fixed set of short wave assets is loaded once at construction; `play`
//! is fire-and-forget from any thread. The rodio output stream is not
//! `Send`, so a dedicated audio thread owns it and receives cue requests
//! over a channel; multiple overlapping plays are permitted (each play is an
//! independent mixer source). Disabled player, missing asset, or missing
//! output device all degrade to a silent no-op.

use std::sync::Mutex;

#[cfg(feature = "audio")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "audio")]
use std::sync::Arc;

/// The earcon vocabulary. Asset files are named `<asset_name>.wav`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    BrowseMode,
    FocusMode,
    Boundary,
    Wrap,
    Error,
}

impl CueKind {
    pub const ALL: [CueKind; 5] = [
        CueKind::BrowseMode,
        CueKind::FocusMode,
        CueKind::Boundary,
        CueKind::Wrap,
        CueKind::Error,
    ];

    pub fn asset_name(&self) -> &'static str {
        match self {
            CueKind::BrowseMode => "browse_mode",
            CueKind::FocusMode => "focus_mode",
            CueKind::Boundary => "boundary",
            CueKind::Wrap => "wrap",
            CueKind::Error => "error",
        }
    }
}

/// Cue destination. Navigation and mode code request cues through this trait
/// so they stay decoupled from the audio device.
pub trait CueSink: Send + Sync {
    fn play(&self, cue: CueKind);
}

/// Sink that discards every cue.
pub struct NullCueSink;

impl CueSink for NullCueSink {
    fn play(&self, _cue: CueKind) {}
}

/// Test sink recording the cues played, in order.
#[derive(Default)]
pub struct RecordingCueSink {
    played: Mutex<Vec<CueKind>>,
}

impl RecordingCueSink {
    pub fn played(&self) -> Vec<CueKind> {
        self.played.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.played.lock().unwrap().clear();
    }
}

impl CueSink for RecordingCueSink {
    fn play(&self, cue: CueKind) {
        self.played.lock().unwrap().push(cue);
    }
}

/// Audio-device earcon player. See module docs for the threading model.
#[cfg(feature = "audio")]
pub struct EarconPlayer {
    tx: crossbeam_channel::Sender<CueKind>,
    enabled: Arc<AtomicBool>,
}

#[cfg(feature = "audio")]
impl EarconPlayer {
    /// Load `<name>.wav` for every cue from `asset_dir` and start the audio
    /// thread. Missing files are tolerated and logged once.
    pub fn new(asset_dir: &std::path::Path, enabled: bool) -> Self {
        use std::collections::HashMap;
        use tracing::debug;

        let mut assets: HashMap<CueKind, Arc<Vec<u8>>> = HashMap::new();
        for cue in CueKind::ALL {
            let path = asset_dir.join(format!("{}.wav", cue.asset_name()));
            match std::fs::read(&path) {
                Ok(bytes) => {
                    assets.insert(cue, Arc::new(bytes));
                }
                Err(error) => {
                    debug!(target: "speech.cues", file = %path.display(), %error, "cue_asset_missing");
                }
            }
        }
        debug!(target: "speech.cues", loaded = assets.len(), "cue_assets_loaded");

        let (tx, rx) = crossbeam_channel::unbounded::<CueKind>();
        std::thread::Builder::new()
            .name("lector-earcons".into())
            .spawn(move || audio_thread(rx, assets))
            .expect("spawn earcon thread");

        Self {
            tx,
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "audio")]
impl CueSink for EarconPlayer {
    fn play(&self, cue: CueKind) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        // Fire-and-forget; a stopped audio thread means shutdown is underway.
        let _ = self.tx.send(cue);
    }
}

#[cfg(feature = "audio")]
fn audio_thread(
    rx: crossbeam_channel::Receiver<CueKind>,
    assets: std::collections::HashMap<CueKind, std::sync::Arc<Vec<u8>>>,
) {
    use rodio::{Decoder, OutputStream, Source};
    use tracing::{trace, warn};

    // Stream handles stay on this thread for their whole life (not Send).
    let output = match OutputStream::try_default() {
        Ok(pair) => Some(pair),
        Err(error) => {
            warn!(target: "speech.cues", %error, "audio_device_unavailable");
            None
        }
    };

    while let Ok(cue) = rx.recv() {
        let Some((_stream, handle)) = output.as_ref() else {
            continue;
        };
        let Some(bytes) = assets.get(&cue) else {
            trace!(target: "speech.cues", cue = cue.asset_name(), "cue_not_loaded");
            continue;
        };
        match Decoder::new(std::io::Cursor::new(bytes.as_ref().clone())) {
            Ok(source) => {
                if let Err(error) = handle.play_raw(source.convert_samples()) {
                    trace!(target: "speech.cues", %error, "cue_play_failed");
                }
            }
            Err(error) => {
                warn!(target: "speech.cues", cue = cue.asset_name(), %error, "cue_decode_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_names_are_the_contract_names() {
        let names: Vec<_> = CueKind::ALL.iter().map(|c| c.asset_name()).collect();
        assert_eq!(
            names,
            vec!["browse_mode", "focus_mode", "boundary", "wrap", "error"]
        );
    }

    #[cfg(feature = "audio")]
    #[test]
    fn player_tolerates_missing_assets_and_disabled_state() {
        let dir = std::env::temp_dir();
        let player = EarconPlayer::new(&dir.join("lector-no-such-assets"), false);
        // Disabled and empty: both paths must be silent no-ops.
        player.play(CueKind::Boundary);
        player.set_enabled(true);
        player.play(CueKind::Wrap);
        assert!(player.is_enabled());
    }

    #[test]
    fn recording_sink_orders_cues() {
        let sink = RecordingCueSink::default();
        sink.play(CueKind::FocusMode);
        sink.play(CueKind::Boundary);
        assert_eq!(sink.played(), vec![CueKind::FocusMode, CueKind::Boundary]);
        sink.clear();
        assert!(sink.played().is_empty());
    }
}
