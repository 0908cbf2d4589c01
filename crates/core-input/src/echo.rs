//! Typing echo: speaks characters and completed words as the user types.
//!
//! The handler subscribes to raw-key traffic on the bus (echo needs key-up,
//! and keys consumed by the keymap never become typing). A rolling word
//! buffer accumulates printable characters; word-boundary keys flush it.
//! Chorded keys (Ctrl/Alt/reader held) are not typing and are ignored.

use std::sync::{Arc, Mutex};

use core_events::{BusSubscriber, Event, EventPayload, EventSink, KeyEvent, ModMask};
use core_config::TypingEchoMode;
use tracing::trace;

use crate::vk;

/// Upper bound on the rolling word buffer; longest-word flushes are not a
/// correctness concern, only memory.
const WORD_BUFFER_CAP: usize = 64;

/// Word-boundary punctuation (flushes the buffer on key-up).
const BOUNDARY_CHARS: [char; 6] = ['.', ',', ';', ':', '!', '?'];

type ModeGetter = Arc<dyn Fn() -> TypingEchoMode + Send + Sync>;

pub struct TypingEchoHandler {
    mode: ModeGetter,
    sink: Arc<dyn EventSink>,
    buffer: Mutex<String>,
}

impl TypingEchoHandler {
    pub fn new(mode: ModeGetter, sink: Arc<dyn EventSink>) -> Self {
        Self {
            mode,
            sink,
            buffer: Mutex::new(String::new()),
        }
    }

    fn emit(&self, text: String, is_word: bool) {
        trace!(target: "input.echo", len = text.len(), is_word, "echo");
        self.sink
            .post(Event::new(EventPayload::TypingEcho { text, is_word }));
    }

    fn handle(&self, key: KeyEvent) {
        let mode = (self.mode)();
        let mut buffer = self.buffer.lock().expect("echo buffer lock");

        if mode == TypingEchoMode::None {
            buffer.clear();
            return;
        }
        if key
            .mods
            .intersects(ModMask::CTRL | ModMask::ALT | ModMask::READER)
        {
            return;
        }

        if key.down {
            if key.vk == vk::VK_BACK || key.vk == vk::VK_DELETE {
                buffer.pop();
            }
            return;
        }

        // Key-up from here on.
        let shifted = key.mods.contains(ModMask::SHIFT);
        let printable = vk::to_printable(key.vk, shifted);

        let boundary_name = match key.vk {
            vk::VK_RETURN => Some("Return".to_string()),
            vk::VK_SPACE => Some("Space".to_string()),
            _ => printable.filter(|c| BOUNDARY_CHARS.contains(c)).map(|c| {
                vk::spoken_name(c)
                    .map(str::to_string)
                    .unwrap_or_else(|| c.to_string())
            }),
        };

        if let Some(name) = boundary_name {
            if matches!(mode, TypingEchoMode::Words | TypingEchoMode::Both) && !buffer.is_empty() {
                let word = std::mem::take(&mut *buffer);
                drop(buffer);
                self.emit(word, true);
            } else {
                buffer.clear();
                drop(buffer);
            }
            if matches!(mode, TypingEchoMode::Characters | TypingEchoMode::Both) {
                self.emit(name, false);
            }
            return;
        }

        let Some(c) = printable else { return };
        let typed = if shifted { c } else { c.to_ascii_lowercase() };
        if buffer.len() >= WORD_BUFFER_CAP {
            buffer.remove(0);
        }
        buffer.push(typed);
        drop(buffer);

        if matches!(mode, TypingEchoMode::Characters | TypingEchoMode::Both) {
            let name = vk::spoken_name(typed)
                .map(str::to_string)
                .unwrap_or_else(|| typed.to_string());
            self.emit(name, false);
        }
    }

    #[cfg(test)]
    fn buffer_contents(&self) -> String {
        self.buffer.lock().unwrap().clone()
    }
}

impl BusSubscriber for TypingEchoHandler {
    fn on_raw_key(&self, key: KeyEvent, _event: &Event) -> anyhow::Result<()> {
        self.handle(key);
        Ok(())
    }
}
