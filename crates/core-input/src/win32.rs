//! Win32 low-level keyboard hook.
//!
//! `WH_KEYBOARD_LL` callbacks run on the installing thread's message loop,
//! so the hook owns a dedicated pump thread and the queue handle lives in
//! that thread's local storage; the callback touches no cross-thread state
//! beyond the queue's internal atomics and one relaxed atomic holding the
//! reader-modifier vk. The OS removes hooks whose callbacks are slow or
//! whose thread stops pumping; the callback body is kept to a handful of
//! reads and one wait-free push.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use core_events::{KeyEvent, ModMask};
use tracing::{debug, error};

use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::GetKeyState;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

use crate::{vk, CaptureError, CaptureSource, KeyQueuePush};

/// The configured reader-modifier vk, readable from the hook callback.
static READER_VK: AtomicU16 = AtomicU16::new(vk::VK_INSERT);

thread_local! {
    static PUMP_QUEUE: RefCell<Option<KeyQueuePush>> = const { RefCell::new(None) };
}

/// Swap the reader key the callback samples (Insert <-> CapsLock).
pub fn set_reader_vk(reader_vk: u16) {
    READER_VK.store(reader_vk, Ordering::Relaxed);
}

fn key_is_down(virtual_key: u16) -> bool {
    // High bit of GetKeyState = currently down.
    unsafe { (GetKeyState(virtual_key as i32) as u16) & 0x8000 != 0 }
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let kb = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let down = matches!(wparam.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN);

        let mut mods = ModMask::empty();
        if key_is_down(vk::VK_SHIFT) {
            mods |= ModMask::SHIFT;
        }
        if key_is_down(vk::VK_CONTROL) {
            mods |= ModMask::CTRL;
        }
        if key_is_down(vk::VK_MENU) {
            mods |= ModMask::ALT;
        }
        if key_is_down(READER_VK.load(Ordering::Relaxed)) {
            mods |= ModMask::READER;
        }

        let event = KeyEvent {
            vk: kb.vkCode as u16,
            mods,
            down,
            time_ms: kb.time,
        };
        PUMP_QUEUE.with(|q| {
            if let Some(queue) = q.borrow().as_ref() {
                queue.push(event);
            }
        });
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

pub struct Win32Hook {
    pump: Option<(JoinHandle<()>, u32)>,
}

impl Win32Hook {
    pub fn new() -> Self {
        Self { pump: None }
    }
}

impl Default for Win32Hook {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for Win32Hook {
    fn start(&mut self, queue: KeyQueuePush) -> Result<(), CaptureError> {
        if self.pump.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let handle = std::thread::Builder::new()
            .name("lector-kbd-hook".into())
            .spawn(move || {
                PUMP_QUEUE.with(|q| *q.borrow_mut() = Some(queue));
                let hook = unsafe {
                    SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), HINSTANCE::default(), 0)
                };
                let hook = match hook {
                    Ok(h) => {
                        let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));
                        h
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                // Pump until WM_QUIT; GetMessageW returns 0 on quit, -1 on error.
                let mut msg = MSG::default();
                loop {
                    let result = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if result.0 <= 0 {
                        break;
                    }
                }

                if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
                    error!(target: "input.hook", error = %e, "unhook_failed");
                }
                PUMP_QUEUE.with(|q| *q.borrow_mut() = None);
                debug!(target: "input.hook", "pump_stopped");
            })
            .map_err(|e| CaptureError::InstallFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                debug!(target: "input.hook", thread_id, "hook_installed");
                self.pump = Some((handle, thread_id));
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(CaptureError::InstallFailed(message))
            }
            Err(_) => Err(CaptureError::InstallFailed(
                "hook thread exited before reporting".into(),
            )),
        }
    }

    fn stop(&mut self) {
        if let Some((handle, thread_id)) = self.pump.take() {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            // The pump exits on the next message; WM_QUIT is already queued,
            // so this join completes well inside the disposal budget.
            if handle.join().is_err() {
                error!(target: "input.hook", "pump_join_panicked");
            }
        }
    }
}

impl Drop for Win32Hook {
    fn drop(&mut self) {
        self.stop();
    }
}
