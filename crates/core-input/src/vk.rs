//! Virtual-key code constants and printable-character mapping.
//!
//! Codes follow the Win32 assignments; the portable parts of the runtime
//! (keymap files, echo tables, tests) use these constants so no other crate
//! hard-codes raw numbers.

pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12; // Alt
pub const VK_CAPITAL: u16 = 0x14; // CapsLock
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_PRIOR: u16 = 0x21;
pub const VK_NEXT: u16 = 0x22;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_INSERT: u16 = 0x2D;
pub const VK_DELETE: u16 = 0x2E;

pub const VK_0: u16 = 0x30;
pub const VK_9: u16 = 0x39;
pub const VK_A: u16 = 0x41;
pub const VK_Z: u16 = 0x5A;

pub const VK_NUMPAD0: u16 = 0x60;
pub const VK_NUMPAD9: u16 = 0x69;

pub const VK_F7: u16 = 0x76;

// OEM punctuation (US layout).
pub const VK_OEM_1: u16 = 0xBA; // ;:
pub const VK_OEM_PLUS: u16 = 0xBB; // =+
pub const VK_OEM_COMMA: u16 = 0xBC; // ,<
pub const VK_OEM_MINUS: u16 = 0xBD; // -_
pub const VK_OEM_PERIOD: u16 = 0xBE; // .>
pub const VK_OEM_2: u16 = 0xBF; // /?
pub const VK_OEM_3: u16 = 0xC0; // `~

/// Shifted number-row symbols, indexed by digit.
const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

/// Map a virtual-key code to the character it would type, honoring the
/// shift state for the number row and OEM punctuation. Letters come back
/// uppercase (echo speaks letter names, not case). Returns `None` for
/// non-printing keys.
pub fn to_printable(vk: u16, shifted: bool) -> Option<char> {
    match vk {
        VK_A..=VK_Z => Some(vk as u8 as char),
        VK_0..=VK_9 => {
            let digit = (vk - VK_0) as usize;
            if shifted {
                Some(SHIFTED_DIGITS[digit])
            } else {
                Some((b'0' + digit as u8) as char)
            }
        }
        VK_NUMPAD0..=VK_NUMPAD9 => Some((b'0' + (vk - VK_NUMPAD0) as u8) as char),
        VK_OEM_1 => Some(if shifted { ':' } else { ';' }),
        VK_OEM_PLUS => Some(if shifted { '+' } else { '=' }),
        VK_OEM_COMMA => Some(if shifted { '<' } else { ',' }),
        VK_OEM_MINUS => Some(if shifted { '_' } else { '-' }),
        VK_OEM_PERIOD => Some(if shifted { '>' } else { '.' }),
        VK_OEM_2 => Some(if shifted { '?' } else { '/' }),
        VK_OEM_3 => Some(if shifted { '~' } else { '`' }),
        _ => None,
    }
}

/// Spoken names for characters whose glyph alone is unhelpful over speech.
pub fn spoken_name(c: char) -> Option<&'static str> {
    let name = match c {
        '@' => "at",
        '#' => "hash",
        '$' => "dollar",
        '%' => "percent",
        '^' => "caret",
        '&' => "ampersand",
        '*' => "star",
        '(' => "left paren",
        ')' => "right paren",
        '!' => "exclamation",
        ',' => "comma",
        '.' => "dot",
        ';' => "semicolon",
        ':' => "colon",
        '?' => "question",
        '/' => "slash",
        '-' => "dash",
        '_' => "underscore",
        '=' => "equals",
        '+' => "plus",
        '<' => "less than",
        '>' => "greater than",
        '`' => "backtick",
        '~' => "tilde",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits() {
        assert_eq!(to_printable(VK_A, false), Some('A'));
        assert_eq!(to_printable(VK_Z, true), Some('Z'));
        assert_eq!(to_printable(VK_0 + 5, false), Some('5'));
        assert_eq!(to_printable(VK_NUMPAD0 + 7, false), Some('7'));
        // Numpad ignores shift.
        assert_eq!(to_printable(VK_NUMPAD0 + 7, true), Some('7'));
    }

    #[test]
    fn shifted_number_row() {
        assert_eq!(to_printable(VK_0 + 2, true), Some('@'));
        assert_eq!(to_printable(VK_0 + 3, true), Some('#'));
        assert_eq!(to_printable(VK_0 + 1, true), Some('!'));
    }

    #[test]
    fn non_printing_keys_map_to_none() {
        assert_eq!(to_printable(VK_RETURN, false), None);
        assert_eq!(to_printable(VK_SHIFT, false), None);
        assert_eq!(to_printable(VK_F7, false), None);
    }

    #[test]
    fn symbol_names() {
        assert_eq!(spoken_name('@'), Some("at"));
        assert_eq!(spoken_name('#'), Some("hash"));
        assert_eq!(spoken_name('a'), None);
    }
}
