//! End-to-end pipeline tests: scripted key events flow through the bounded
//! capture queue, the dispatcher thread, the event bus, and the command
//! handler into the speech backend.

use std::sync::atomic::{AtomicBool, AtomicU16};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use core_a11y::TestElement;
use core_config::{Settings, SettingsHandle};
use core_events::{
    ElementSummary, Event, EventBus, EventPayload, EventSink, KeyEvent, Mode, ModeCell, ModMask,
    Politeness,
};
use core_input::{vk, KeyQueue, TypingEchoHandler};
use core_keymap::{InputConsumer, Keymap};
use core_session::{CommandHandler, DocumentStore, ModeManager, SayAll};
use core_speech::{CueKind, CueSink, RecordingCueSink, ScriptedBackend, UtteranceQueue};
use core_vbuf::{build_document, Cursor};

struct Pipeline {
    push: Option<core_input::KeyQueuePush>,
    consumer: Option<InputConsumer>,
    handle: core_events::BusHandle,
    bus_join: tokio::task::JoinHandle<()>,
    backend: Arc<ScriptedBackend>,
    cues: Arc<RecordingCueSink>,
    mode: ModeCell,
}

impl Pipeline {
    fn press(&self, vk_code: u16, mods: ModMask) {
        let push = self.push.as_ref().expect("pipeline running");
        push.push(KeyEvent::down(vk_code, mods));
        push.push(KeyEvent::up(vk_code, mods));
    }

    async fn settle(&self) {
        // Real threads feed the bus; paused time cannot cover them, so the
        // suite runs on the live clock with generous settles.
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    async fn shutdown(mut self) {
        self.push.take();
        if let Some(consumer) = self.consumer.take() {
            consumer.join();
        }
        self.bus_join.abort();
        let _ = self.bus_join.await;
    }
}

fn demo_page() -> TestElement {
    TestElement::new(vec![1], "Document")
        .child(
            TestElement::named(vec![2], "Text", "Intro")
                .role("heading")
                .properties("level=1"),
        )
        .child(TestElement::named(vec![3], "Hyperlink", "Click here").properties("visited=true"))
        .child(
            TestElement::named(vec![4], "Text", "Details")
                .role("heading")
                .properties("level=2"),
        )
        .child(TestElement::named(vec![5], "Edit", "Name").focusable())
        .child(
            TestElement::named(vec![6], "Text", "Summary")
                .role("heading")
                .properties("level=1"),
        )
}

fn pipeline(settings: Settings) -> Pipeline {
    let doc = build_document(Arc::new(demo_page()));
    let backend = Arc::new(ScriptedBackend::new());
    let cues = Arc::new(RecordingCueSink::default());
    let cue_sink: Arc<dyn CueSink> = cues.clone();
    let (speech, _speech_join) = UtteranceQueue::spawn(backend.clone(), cue_sink.clone());

    let store = DocumentStore::new(doc);
    let cursor = Arc::new(Mutex::new(Cursor::new(cue_sink.clone())));
    let mode = ModeCell::new(Mode::Browse);
    let bypass = Arc::new(AtomicBool::new(false));
    let settings_handle = SettingsHandle::new(settings);

    let (mut bus, handle) = EventBus::new();
    let sink: Arc<dyn EventSink> = Arc::new(handle.clone());

    let mode_manager = ModeManager::new(mode.clone(), sink.clone(), speech.clone(), cue_sink.clone());
    let say_all = Arc::new(SayAll::new(speech.clone(), store.clone(), cursor.clone()));
    let handler = Arc::new(CommandHandler::new(
        store,
        cursor,
        mode_manager,
        say_all,
        speech,
        cue_sink,
        settings_handle.clone(),
        bypass.clone(),
    ));
    let echo = Arc::new(TypingEchoHandler::new(
        Arc::new(move || settings_handle.snapshot().typing_echo),
        sink.clone(),
    ));
    bus.subscribe(handler);
    bus.subscribe(echo);
    let bus_join = bus.spawn();

    let (push, pop) = KeyQueue::bounded();
    let consumer = InputConsumer::spawn(
        pop,
        Arc::new(Keymap::builtin()),
        mode.clone(),
        Arc::new(AtomicU16::new(vk::VK_INSERT)),
        bypass,
        sink,
    );

    Pipeline {
        push: Some(push),
        consumer: Some(consumer),
        handle,
        bus_join,
        backend,
        cues,
        mode,
    }
}

#[tokio::test]
async fn quick_nav_keys_walk_headings_end_to_end() {
    let p = pipeline(Settings::default());

    p.press(b'H' as u16, ModMask::empty());
    p.settle().await;
    p.press(b'H' as u16, ModMask::empty());
    p.settle().await;
    p.press(b'H' as u16, ModMask::empty());
    p.settle().await;
    p.press(b'H' as u16, ModMask::empty());
    p.settle().await;

    let texts = p.backend.spoken_texts();
    let joined = texts.join(" | ");
    assert!(joined.contains("heading level 1, Intro"), "{joined}");
    assert!(joined.contains("heading level 2, Details"), "{joined}");
    assert!(joined.contains("heading level 1, Summary"), "{joined}");
    // Fourth press ran out of headings.
    assert!(p.cues.played().contains(&CueKind::Boundary));

    p.shutdown().await;
}

#[tokio::test]
async fn mode_toggle_chord_switches_and_blocks_quick_nav() {
    let p = pipeline(Settings::default());

    // Insert+Space toggles into Focus mode.
    let push = p.push.as_ref().unwrap();
    push.push(KeyEvent::down(vk::VK_INSERT, ModMask::empty()));
    push.push(KeyEvent::down(vk::VK_SPACE, ModMask::empty()));
    push.push(KeyEvent::up(vk::VK_SPACE, ModMask::empty()));
    push.push(KeyEvent::up(vk::VK_INSERT, ModMask::empty()));
    p.settle().await;

    assert_eq!(p.mode.get(), Mode::Focus);
    assert!(p.cues.played().contains(&CueKind::FocusMode));
    assert!(p
        .backend
        .spoken_texts()
        .contains(&"Focus mode".to_string()));

    // 'H' now passes through: no heading announcement, only typing echo.
    p.press(b'H' as u16, ModMask::empty());
    p.settle().await;
    let texts = p.backend.spoken_texts().join(" | ");
    assert!(!texts.contains("Intro"), "{texts}");

    p.shutdown().await;
}

#[tokio::test]
async fn typing_echo_word_flush_end_to_end() {
    let p = pipeline(Settings {
        typing_echo: core_config::TypingEchoMode::Words,
        ..Settings::default()
    });

    // In Focus mode letters are unbound, so typing reaches the echo.
    p.mode.set(Mode::Focus);
    for c in [b'H', b'E', b'L', b'L', b'O'] {
        p.press(c as u16, ModMask::empty());
    }
    p.press(vk::VK_SPACE, ModMask::empty());
    p.settle().await;

    assert!(p
        .backend
        .spoken_texts()
        .contains(&"hello".to_string()));

    p.shutdown().await;
}

#[tokio::test]
async fn focus_event_coalescing_announces_last_only() {
    let p = pipeline(Settings::default());

    for name in ["first", "second", "third"] {
        p.handle.post(Event::new(EventPayload::FocusChanged(
            ElementSummary {
                name: name.to_string(),
                control_type: "Button".into(),
                ..ElementSummary::default()
            },
        )));
    }
    p.settle().await;

    let texts = p.backend.spoken_texts().join(" | ");
    assert!(texts.contains("third"), "{texts}");
    assert!(!texts.contains("first"), "{texts}");
    assert!(!texts.contains("second"), "{texts}");

    p.shutdown().await;
}

#[tokio::test]
async fn live_region_events_diff_before_speaking() {
    let p = pipeline(Settings::default());

    for _ in 0..3 {
        p.handle.post(Event::new(EventPayload::LiveRegionChanged {
            source_id: "9,9".into(),
            text: "Loading".into(),
            politeness: Politeness::Polite,
        }));
    }
    p.settle().await;

    let spoken = p.backend.spoken_texts();
    assert_eq!(
        spoken.iter().filter(|t| t.contains("Loading")).count(),
        1,
        "{spoken:?}"
    );

    p.shutdown().await;
}

#[tokio::test]
async fn say_all_reads_and_any_key_stops_it() {
    let p = pipeline(Settings::default());

    // Insert+Down starts continuous reading.
    let push = p.push.as_ref().unwrap();
    push.push(KeyEvent::down(vk::VK_INSERT, ModMask::empty()));
    push.push(KeyEvent::down(vk::VK_DOWN, ModMask::empty()));
    push.push(KeyEvent::up(vk::VK_DOWN, ModMask::empty()));
    push.push(KeyEvent::up(vk::VK_INSERT, ModMask::empty()));
    p.settle().await;

    let texts = p.backend.spoken_texts().join(" | ");
    assert!(texts.contains("Intro"), "{texts}");
    assert!(texts.contains("Summary"), "{texts}");

    p.shutdown().await;
}
