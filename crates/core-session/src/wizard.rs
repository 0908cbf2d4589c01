//! First-run wizard: a speech-only, seven-step setup flow.
//!
//! The wizard runs before the normal dispatcher and consumes key events
//! directly from the capture path, so mode rules and the keymap never see
//! its keys. Escape at the welcome step (or 30 s of inactivity there) skips
//! the whole flow; either way the run marks first-run as completed, and the
//! caller persists the returned settings.

use std::time::Duration;

use core_config::{ModifierKey, Settings, VerbosityLevel, SPEECH_RATE_MAX, SPEECH_RATE_MIN};
use core_events::KeyEvent;
use core_input::vk;
use core_speech::{SpeechHandle, Utterance};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// Rate change per Up/Down press at the speech-rate step.
const RATE_STEP: u16 = 10;

pub struct WizardConfig {
    /// Sentence re-spoken after every rate or voice adjustment.
    pub test_sentence: String,
    /// Inactivity budget at the welcome step.
    pub welcome_timeout: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            test_sentence: "The quick brown fox jumps over the lazy dog.".to_string(),
            welcome_timeout: Duration::from_secs(30),
        }
    }
}

enum Advance {
    Continue,
    SkipAll,
    InputGone,
}

/// Run the wizard to completion. Returns the adjusted settings with
/// first-run marked completed; persistence is the caller's job.
pub async fn run_wizard(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    mut settings: Settings,
    config: WizardConfig,
) -> Settings {
    info!(target: "session.wizard", "start");

    match welcome_step(keys, speech, &config).await {
        Advance::Continue => {}
        Advance::SkipAll | Advance::InputGone => {
            settings.first_run_completed = true;
            debug!(target: "session.wizard", "skipped");
            return settings;
        }
    }

    if let Advance::InputGone = rate_step(keys, speech, &mut settings, &config).await {
        settings.first_run_completed = true;
        return settings;
    }
    if let Advance::InputGone = voice_step(keys, speech, &mut settings, &config).await {
        settings.first_run_completed = true;
        return settings;
    }
    if let Advance::InputGone = verbosity_step(keys, speech, &mut settings).await {
        settings.first_run_completed = true;
        return settings;
    }
    if let Advance::InputGone = modifier_step(keys, speech, &mut settings).await {
        settings.first_run_completed = true;
        return settings;
    }
    if let Advance::InputGone = tutorial_step(keys, speech).await {
        settings.first_run_completed = true;
        return settings;
    }

    speech.enqueue(Utterance::high(
        "Setup complete. Press Insert plus Space to switch modes at any time.",
    ));
    settings.first_run_completed = true;
    info!(target: "session.wizard", "completed");
    settings
}

/// Next key-down, skipping ups. `None` when the input side is gone.
async fn next_key_down(keys: &mut UnboundedReceiver<KeyEvent>) -> Option<KeyEvent> {
    loop {
        let key = keys.recv().await?;
        if key.down {
            return Some(key);
        }
    }
}

async fn welcome_step(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    config: &WizardConfig,
) -> Advance {
    speech.enqueue(Utterance::high(
        "Welcome to Lector. Press Enter to set up speech and keys, or Escape to skip.",
    ));
    loop {
        let key = match tokio::time::timeout(config.welcome_timeout, next_key_down(keys)).await {
            Ok(Some(key)) => key,
            Ok(None) => return Advance::InputGone,
            Err(_) => {
                debug!(target: "session.wizard", "welcome_timeout");
                return Advance::SkipAll;
            }
        };
        match key.vk {
            vk::VK_RETURN => return Advance::Continue,
            vk::VK_ESCAPE => return Advance::SkipAll,
            _ => {}
        }
    }
}

async fn rate_step(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    settings: &mut Settings,
    config: &WizardConfig,
) -> Advance {
    speech.enqueue(Utterance::high(
        "Speech rate. Press Up or Down to adjust, then Enter to accept.",
    ));
    loop {
        let Some(key) = next_key_down(keys).await else {
            return Advance::InputGone;
        };
        match key.vk {
            vk::VK_UP => {
                settings.speech_rate_wpm =
                    (settings.speech_rate_wpm + RATE_STEP).min(SPEECH_RATE_MAX);
            }
            vk::VK_DOWN => {
                settings.speech_rate_wpm = settings
                    .speech_rate_wpm
                    .saturating_sub(RATE_STEP)
                    .max(SPEECH_RATE_MIN);
            }
            vk::VK_RETURN => return Advance::Continue,
            _ => continue,
        }
        speech.backend().set_rate(settings.speech_rate_wpm);
        speech.enqueue(Utterance::interrupt(config.test_sentence.clone()));
    }
}

async fn voice_step(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    settings: &mut Settings,
    config: &WizardConfig,
) -> Advance {
    speech.enqueue(Utterance::high(
        "Voice. Press Up or Down to try voices, then Enter to accept.",
    ));
    let voices = speech.backend().available_voices();
    let mut selected = settings
        .voice_name
        .as_ref()
        .and_then(|name| voices.iter().position(|v| v == name))
        .unwrap_or(0);
    loop {
        let Some(key) = next_key_down(keys).await else {
            return Advance::InputGone;
        };
        match key.vk {
            vk::VK_UP | vk::VK_DOWN if !voices.is_empty() => {
                selected = if key.vk == vk::VK_DOWN {
                    (selected + 1) % voices.len()
                } else {
                    (selected + voices.len() - 1) % voices.len()
                };
                let name = &voices[selected];
                if speech.backend().set_voice(name).is_ok() {
                    settings.voice_name = Some(name.clone());
                }
                speech.enqueue(Utterance::interrupt(config.test_sentence.clone()));
            }
            vk::VK_RETURN => return Advance::Continue,
            _ => {}
        }
    }
}

async fn verbosity_step(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    settings: &mut Settings,
) -> Advance {
    speech.enqueue(Utterance::high(
        "Verbosity. Press 1 for beginner, 2 for intermediate, 3 for advanced, or Enter to keep.",
    ));
    loop {
        let Some(key) = next_key_down(keys).await else {
            return Advance::InputGone;
        };
        let chosen = match key.vk {
            k if k == vk::VK_0 + 1 => Some(VerbosityLevel::Beginner),
            k if k == vk::VK_0 + 2 => Some(VerbosityLevel::Intermediate),
            k if k == vk::VK_0 + 3 => Some(VerbosityLevel::Advanced),
            vk::VK_RETURN => return Advance::Continue,
            _ => None,
        };
        if let Some(level) = chosen {
            settings.verbosity = level;
            speech.enqueue(Utterance::high(format!("{level:?} selected.")));
            return Advance::Continue;
        }
    }
}

async fn modifier_step(
    keys: &mut UnboundedReceiver<KeyEvent>,
    speech: &SpeechHandle,
    settings: &mut Settings,
) -> Advance {
    speech.enqueue(Utterance::high(
        "Screen reader key. Press 1 for Insert, 2 for Caps Lock, or Enter to keep.",
    ));
    loop {
        let Some(key) = next_key_down(keys).await else {
            return Advance::InputGone;
        };
        let chosen = match key.vk {
            k if k == vk::VK_0 + 1 => Some(ModifierKey::Insert),
            k if k == vk::VK_0 + 2 => Some(ModifierKey::CapsLock),
            vk::VK_RETURN => return Advance::Continue,
            _ => None,
        };
        if let Some(modifier) = chosen {
            settings.modifier_key = modifier;
            speech.enqueue(Utterance::high(format!("{modifier} selected.")));
            return Advance::Continue;
        }
    }
}

async fn tutorial_step(keys: &mut UnboundedReceiver<KeyEvent>, speech: &SpeechHandle) -> Advance {
    speech.enqueue(Utterance::high(
        "Quick tour: in browse mode, press H for headings, K for links, and F for form fields. \
         Press Insert plus Down to read continuously. Press Enter to finish.",
    ));
    loop {
        match next_key_down(keys).await {
            Some(key) if key.vk == vk::VK_RETURN => return Advance::Continue,
            Some(_) => {}
            None => return Advance::InputGone,
        }
    }
}
