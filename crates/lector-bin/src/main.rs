//! Lector entrypoint: assembles the capture, dispatch, bus, buffer, and
//! speech pipelines and runs them until interrupted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU16};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use core_a11y::ApartmentHost;
use core_config::{ModifierKey, SettingsHandle};
use core_events::{EventBus, ModeCell};
use core_events::{BusSubscriber, Event, KeyEvent};
use core_input::{vk, KeyQueue, TypingEchoHandler};
#[cfg(windows)]
use core_input::CaptureSource;
use core_keymap::{InputConsumer, Keymap};
use core_session::{run_wizard, CommandHandler, DocumentStore, ModeManager, SayAll, WizardConfig};
use core_speech::{CueSink, SpeechBackend, SpeechHandle, UtteranceQueue};
use core_vbuf::Cursor;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod backend;
mod demo;
mod refresh;

use backend::ConsoleBackend;
use refresh::BufferRefresher;

/// Speech-queue drain budget at shutdown.
const SPEECH_DISPOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lector", version, about = "Lector screen reader")]
struct Args {
    /// Settings file path (overrides discovery of `lector.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Keymap file overlaying the built-in bindings.
    #[arg(long)]
    keymap: Option<PathBuf>,
    /// Directory holding the earcon wave assets.
    #[arg(long, default_value = "sounds")]
    sounds: PathBuf,
    /// Serve a built-in demo document instead of a live platform tree.
    #[arg(long)]
    demo: bool,
    /// Skip the first-run wizard even on a fresh profile.
    #[arg(long)]
    skip_wizard: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) {
        let file_appender = tracing_appender::rolling::never(Path::new("."), "lector.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // Global subscriber already installed (tests); drop the
                // guard so the writer shuts down.
            }
        }
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn reader_vk_for(modifier: ModifierKey) -> u16 {
    match modifier {
        ModifierKey::Insert => vk::VK_INSERT,
        ModifierKey::CapsLock => vk::VK_CAPITAL,
    }
}

fn load_keymap(path: Option<&Path>) -> Arc<Keymap> {
    let mut keymap = Keymap::builtin();
    let candidate = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("keymap.json"));
    if candidate.exists() {
        match core_keymap::load_into(&mut keymap, &candidate) {
            Ok(stats) => {
                info!(target: "runtime.startup", loaded = stats.loaded, skipped = stats.skipped, "keymap_overlay")
            }
            Err(error) => warn!(target: "runtime.startup", %error, "keymap_overlay_failed"),
        }
    }
    Arc::new(keymap)
}

/// Forwards raw keys from the bus into the wizard while it runs.
struct WizardFeed {
    tx: Mutex<Option<tokio::sync::mpsc::UnboundedSender<KeyEvent>>>,
}

impl WizardFeed {
    fn new(tx: tokio::sync::mpsc::UnboundedSender<KeyEvent>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn detach(&self) {
        self.tx.lock().expect("wizard feed lock").take();
    }
}

impl BusSubscriber for WizardFeed {
    fn on_raw_key(&self, key: KeyEvent, _event: &Event) -> anyhow::Result<()> {
        if let Some(tx) = self.tx.lock().expect("wizard feed lock").as_ref() {
            let _ = tx.send(key);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging();
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();

    // Settings with fallback chain; the handle is the runtime's single
    // source of configuration truth.
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(core_config::discover);
    let settings = core_config::load(
        Some(&settings_path),
        Some(Path::new("lector.defaults.json")),
    );
    let settings_handle = SettingsHandle::new(settings.clone());

    // Output side: earcons + speech queue over the pluggable backend.
    let cues = make_cue_sink(&args.sounds, settings.audio_cues_enabled);
    let backend = Arc::new(ConsoleBackend::new(settings.speech_rate_wpm));
    if let Some(voice) = &settings.voice_name {
        let _ = backend.set_voice(voice);
    }
    let (speech, speech_join) = UtteranceQueue::spawn(backend.clone(), cues.clone());

    // Document store, cursor, mode state.
    let store = DocumentStore::default();
    let cursor = Arc::new(Mutex::new(Cursor::new(cues.clone())));
    let mode_cell = ModeCell::default();
    let dispatch_bypass = Arc::new(AtomicBool::new(false));
    let reader_vk = Arc::new(AtomicU16::new(reader_vk_for(settings.modifier_key)));

    // Accessibility host + buffer refresher.
    #[cfg(windows)]
    let host = Arc::new(ApartmentHost::start_with_init(core_a11y::host::com_sta_init));
    #[cfg(not(windows))]
    let host = Arc::new(ApartmentHost::start());

    let tree_source: Arc<dyn refresh::TreeSource> = if args.demo {
        Arc::new(demo::DemoTreeSource)
    } else {
        Arc::new(demo::EmptyTreeSource)
    };
    let refresher = Arc::new(BufferRefresher::new(
        host.clone(),
        tree_source,
        store.clone(),
    ));

    // Bus and subscribers.
    let (mut bus, bus_handle) = EventBus::new();
    let sink = Arc::new(bus_handle.clone());

    let mode_manager = ModeManager::new(
        mode_cell.clone(),
        sink.clone(),
        speech.clone(),
        cues.clone(),
    );
    let say_all = Arc::new(SayAll::new(speech.clone(), store.clone(), cursor.clone()));
    let handler = Arc::new(CommandHandler::new(
        store.clone(),
        cursor.clone(),
        mode_manager,
        say_all,
        speech.clone(),
        cues.clone(),
        settings_handle.clone(),
        dispatch_bypass.clone(),
    ));

    let echo_settings = settings_handle.clone();
    let echo = Arc::new(TypingEchoHandler::new(
        Arc::new(move || echo_settings.snapshot().typing_echo),
        sink.clone(),
    ));

    let (wizard_tx, mut wizard_rx) = tokio::sync::mpsc::unbounded_channel();
    let wizard_feed = Arc::new(WizardFeed::new(wizard_tx));

    bus.subscribe(handler.clone());
    bus.subscribe(echo);
    bus.subscribe(refresher.clone());
    bus.subscribe(wizard_feed.clone());
    let bus_join = bus.spawn();

    // Input capture: hook -> bounded queue -> consumer thread -> bus.
    let (push, pop) = KeyQueue::bounded();
    let mut capture = start_capture(push);
    let consumer = InputConsumer::spawn(
        pop,
        load_keymap(args.keymap.as_deref()),
        mode_cell,
        reader_vk.clone(),
        dispatch_bypass.clone(),
        sink.clone(),
    );

    // First run: the wizard owns the keys until it completes.
    if !settings.first_run_completed && !args.skip_wizard {
        dispatch_bypass.store(true, std::sync::atomic::Ordering::Release);
        let adjusted = run_wizard(
            &mut wizard_rx,
            &speech,
            settings.clone(),
            WizardConfig::default(),
        )
        .await;
        dispatch_bypass.store(false, std::sync::atomic::Ordering::Release);
        reader_vk.store(
            reader_vk_for(adjusted.modifier_key),
            std::sync::atomic::Ordering::Relaxed,
        );
        #[cfg(windows)]
        core_input::win32::set_reader_vk(reader_vk_for(adjusted.modifier_key));
        if let Err(error) = core_config::save(&adjusted, &settings_path) {
            error!(target: "runtime.startup", %error, "settings_save_failed");
        }
        settings_handle.update(|s| *s = adjusted.clone());
    }
    wizard_feed.detach();

    refresher.prime().await;
    announce_ready(&speech, &store);

    info!(target: "runtime", "running");
    tokio::signal::ctrl_c().await.ok();
    info!(target: "runtime", "shutdown_begin");

    // Teardown order: input first (no new events), then the bus, then
    // speech within its drain budget, then the apartment worker.
    capture_stop(&mut capture);
    consumer.join();
    drop(sink);
    drop(bus_handle);
    // Subscribers held by the bus task keep sink clones alive, so the loop
    // cannot observe a closed channel; give queued events a beat, then stop
    // the task directly.
    tokio::time::sleep(Duration::from_millis(50)).await;
    bus_join.abort();
    let _ = bus_join.await;
    drop(handler);
    drop(speech);
    if tokio::time::timeout(SPEECH_DISPOSE_TIMEOUT, speech_join)
        .await
        .is_err()
    {
        warn!(target: "runtime", "speech_dispose_timeout");
    }
    host.shutdown();
    info!(target: "runtime", "shutdown_complete");
    Ok(())
}

#[cfg(feature = "audio")]
fn make_cue_sink(sounds: &Path, enabled: bool) -> Arc<dyn CueSink> {
    Arc::new(core_speech::EarconPlayer::new(sounds, enabled))
}

#[cfg(not(feature = "audio"))]
fn make_cue_sink(_sounds: &Path, _enabled: bool) -> Arc<dyn CueSink> {
    info!(target: "runtime.startup", "earcons_disabled_no_audio_feature");
    Arc::new(core_speech::NullCueSink)
}

fn announce_ready(speech: &SpeechHandle, store: &DocumentStore) {
    let doc = store.snapshot();
    let text = if doc.is_empty() {
        "Lector ready.".to_string()
    } else {
        format!("Lector ready. Document loaded, {} elements.", doc.len())
    };
    speech.enqueue(core_speech::Utterance::high(text));
}

#[cfg(windows)]
fn start_capture(push: core_input::KeyQueuePush) -> Option<core_input::win32::Win32Hook> {
    let mut hook = core_input::win32::Win32Hook::new();
    match hook.start(push) {
        Ok(()) => Some(hook),
        Err(error) => {
            // No input is survivable; speech output still works.
            error!(target: "input.hook", %error, "hook_install_failed");
            None
        }
    }
}

#[cfg(not(windows))]
fn start_capture(_push: core_input::KeyQueuePush) -> Option<NoCapture> {
    warn!(target: "input.hook", "no_capture_backend_for_platform");
    None
}

#[cfg(not(windows))]
struct NoCapture;

#[cfg(windows)]
fn capture_stop(capture: &mut Option<core_input::win32::Win32Hook>) {
    if let Some(hook) = capture.as_mut() {
        hook.stop();
    }
}

#[cfg(not(windows))]
fn capture_stop(_capture: &mut Option<NoCapture>) {}
