//! Consumer-side modifier tracking.
//!
//! On Windows the hook callback samples Shift/Ctrl/Alt and the reader key
//! from the OS key-state table, so captured events usually arrive with their
//! mask filled. The tracker re-derives the mask from the transition stream
//! anyway and merges the two: capture sources that cannot sample state (the
//! scripted test source, remote replay) still dispatch correctly, and the
//! reader key stays accurate when the user re-binds it at runtime.

use core_events::{KeyEvent, ModMask};

use crate::vk;

pub struct ModifierTracker {
    held: ModMask,
    reader_vk: u16,
}

impl ModifierTracker {
    pub fn new(reader_vk: u16) -> Self {
        Self {
            held: ModMask::empty(),
            reader_vk,
        }
    }

    /// Swap the reader modifier key (Insert <-> CapsLock). Clears a held
    /// READER bit so a key that is down during the swap cannot stick.
    pub fn set_reader_vk(&mut self, reader_vk: u16) {
        self.reader_vk = reader_vk;
        self.held.remove(ModMask::READER);
    }

    pub fn reader_vk(&self) -> u16 {
        self.reader_vk
    }

    fn mask_for(&self, event_vk: u16) -> Option<ModMask> {
        if event_vk == self.reader_vk {
            return Some(ModMask::READER);
        }
        match event_vk {
            vk::VK_SHIFT => Some(ModMask::SHIFT),
            vk::VK_CONTROL => Some(ModMask::CTRL),
            vk::VK_MENU => Some(ModMask::ALT),
            _ => None,
        }
    }

    /// Record the transition and return the effective mask for this event:
    /// tracked state merged with whatever the capture source sampled.
    /// Modifier keys do not carry their own bit on the down transition (a
    /// held Insert must not turn `Insert+Down` into `Insert+Insert+Down`).
    pub fn apply(&mut self, event: &KeyEvent) -> ModMask {
        if let Some(bit) = self.mask_for(event.vk) {
            if event.down {
                self.held.insert(bit);
            } else {
                self.held.remove(bit);
            }
            // The transition of a modifier reports the *other* held bits.
            return (self.held | event.mods) - bit;
        }
        self.held | event.mods
    }

    pub fn held(&self) -> ModMask {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_reader_chord() {
        let mut t = ModifierTracker::new(vk::VK_INSERT);
        t.apply(&KeyEvent::down(vk::VK_INSERT, ModMask::empty()));
        let mods = t.apply(&KeyEvent::down(vk::VK_DOWN, ModMask::empty()));
        assert_eq!(mods, ModMask::READER);
        t.apply(&KeyEvent::up(vk::VK_INSERT, ModMask::empty()));
        let mods = t.apply(&KeyEvent::down(vk::VK_DOWN, ModMask::empty()));
        assert_eq!(mods, ModMask::empty());
    }

    #[test]
    fn modifier_transition_excludes_own_bit() {
        let mut t = ModifierTracker::new(vk::VK_INSERT);
        let mods = t.apply(&KeyEvent::down(vk::VK_SHIFT, ModMask::empty()));
        assert_eq!(mods, ModMask::empty());
        assert_eq!(t.held(), ModMask::SHIFT);
    }

    #[test]
    fn merges_sampled_mask_from_source() {
        let mut t = ModifierTracker::new(vk::VK_INSERT);
        // Source sampled CTRL even though the tracker never saw it go down.
        let mods = t.apply(&KeyEvent::down(vk::VK_A, ModMask::CTRL));
        assert_eq!(mods, ModMask::CTRL);
    }

    #[test]
    fn rebinding_reader_clears_held_bit() {
        let mut t = ModifierTracker::new(vk::VK_INSERT);
        t.apply(&KeyEvent::down(vk::VK_INSERT, ModMask::empty()));
        assert_eq!(t.held(), ModMask::READER);
        t.set_reader_vk(vk::VK_CAPITAL);
        assert_eq!(t.held(), ModMask::empty());
        t.apply(&KeyEvent::down(vk::VK_CAPITAL, ModMask::empty()));
        assert_eq!(t.held(), ModMask::READER);
    }
}
