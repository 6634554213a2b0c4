//! Translation of W3C key-code text into keystrokes

/// Non-printable keys from the W3C private-use range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Null,
    Cancel,
    Help,
    Backspace,
    Tab,
    Clear,
    Enter,
    Shift,
    Control,
    Alt,
    Pause,
    Escape,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Insert,
    Delete,
    F(u8),
    Meta,
}

impl SpecialKey {
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            SpecialKey::Shift | SpecialKey::Control | SpecialKey::Alt | SpecialKey::Meta
        )
    }

    /// Key name in the UI Automation `{key}` send-keys syntax.
    pub fn uia_name(&self) -> String {
        let name = match self {
            SpecialKey::Null => "",
            SpecialKey::Cancel => "cancel",
            SpecialKey::Help => "help",
            SpecialKey::Backspace => "backspace",
            SpecialKey::Tab => "tab",
            SpecialKey::Clear => "clear",
            SpecialKey::Enter => "enter",
            SpecialKey::Shift => "shift",
            SpecialKey::Control => "ctrl",
            SpecialKey::Alt => "alt",
            SpecialKey::Pause => "pause",
            SpecialKey::Escape => "esc",
            SpecialKey::PageUp => "pageup",
            SpecialKey::PageDown => "pagedown",
            SpecialKey::End => "end",
            SpecialKey::Home => "home",
            SpecialKey::Left => "left",
            SpecialKey::Up => "up",
            SpecialKey::Right => "right",
            SpecialKey::Down => "down",
            SpecialKey::Insert => "insert",
            SpecialKey::Delete => "delete",
            SpecialKey::F(n) => return format!("F{n}"),
            SpecialKey::Meta => "win",
        };
        name.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    Char(char),
    Special(SpecialKey),
}

fn translate(c: char) -> KeyStroke {
    let special = match c as u32 {
        0xE000 => SpecialKey::Null,
        0xE001 => SpecialKey::Cancel,
        0xE002 => SpecialKey::Help,
        0xE003 => SpecialKey::Backspace,
        0xE004 => SpecialKey::Tab,
        0xE005 => SpecialKey::Clear,
        0xE006 | 0xE007 => SpecialKey::Enter,
        0xE008 | 0xE050 => SpecialKey::Shift,
        0xE009 | 0xE051 => SpecialKey::Control,
        0xE00A | 0xE052 => SpecialKey::Alt,
        0xE00B => SpecialKey::Pause,
        0xE00C => SpecialKey::Escape,
        0xE00D => return KeyStroke::Char(' '),
        0xE00E | 0xE054 => SpecialKey::PageUp,
        0xE00F | 0xE055 => SpecialKey::PageDown,
        0xE010 | 0xE056 => SpecialKey::End,
        0xE011 | 0xE057 => SpecialKey::Home,
        0xE012 | 0xE058 => SpecialKey::Left,
        0xE013 | 0xE059 => SpecialKey::Up,
        0xE014 | 0xE05A => SpecialKey::Right,
        0xE015 | 0xE05B => SpecialKey::Down,
        0xE016 | 0xE05C => SpecialKey::Insert,
        0xE017 | 0xE05D => SpecialKey::Delete,
        0xE018 => return KeyStroke::Char(';'),
        0xE019 => return KeyStroke::Char('='),
        code @ 0xE01A..=0xE023 => {
            return KeyStroke::Char(char::from(b'0' + (code - 0xE01A) as u8));
        }
        0xE024 => return KeyStroke::Char('*'),
        0xE025 => return KeyStroke::Char('+'),
        0xE026 => return KeyStroke::Char(','),
        0xE027 => return KeyStroke::Char('-'),
        0xE028 => return KeyStroke::Char('.'),
        0xE029 => return KeyStroke::Char('/'),
        code @ 0xE031..=0xE03C => SpecialKey::F((code - 0xE030) as u8),
        0xE03D | 0xE053 => SpecialKey::Meta,
        _ => return KeyStroke::Char(c),
    };
    KeyStroke::Special(special)
}

/// Splits WebDriver send-keys text into keystrokes.
pub fn parse_keys(text: &str) -> Vec<KeyStroke> {
    text.chars().map(translate).collect()
}

/// Keystrokes grouped into what an input backend can send in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChunk {
    Text(String),
    Special(SpecialKey),
    /// Keys typed while modifiers are held down.
    Chord {
        modifiers: Vec<SpecialKey>,
        keys: Vec<KeyStroke>,
    },
}

/// Groups keystrokes, applying W3C modifier semantics: a modifier toggles its
/// held state and `Null` releases every held modifier.
pub fn chunk_keys(strokes: &[KeyStroke]) -> Vec<KeyChunk> {
    let mut chunks = Vec::new();
    let mut held: Vec<SpecialKey> = Vec::new();
    let mut text = String::new();
    let mut chord: Vec<KeyStroke> = Vec::new();

    let flush = |chunks: &mut Vec<KeyChunk>,
                     text: &mut String,
                     chord: &mut Vec<KeyStroke>,
                     held: &[SpecialKey]| {
        if !text.is_empty() {
            chunks.push(KeyChunk::Text(std::mem::take(text)));
        }
        if !chord.is_empty() {
            chunks.push(KeyChunk::Chord {
                modifiers: held.to_vec(),
                keys: std::mem::take(chord),
            });
        }
    };

    for stroke in strokes {
        match stroke {
            KeyStroke::Special(SpecialKey::Null) => {
                flush(&mut chunks, &mut text, &mut chord, &held);
                held.clear();
            }
            KeyStroke::Special(key) if key.is_modifier() => {
                flush(&mut chunks, &mut text, &mut chord, &held);
                if let Some(pos) = held.iter().position(|k| k == key) {
                    held.remove(pos);
                } else {
                    held.push(*key);
                }
            }
            _ if !held.is_empty() => chord.push(*stroke),
            KeyStroke::Char(c) => text.push(*c),
            KeyStroke::Special(key) => {
                flush(&mut chunks, &mut text, &mut chord, &held);
                chunks.push(KeyChunk::Special(*key));
            }
        }
    }
    flush(&mut chunks, &mut text, &mut chord, &held);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_private_use_codes() {
        let strokes = parse_keys("a\u{E007}\u{E01B}\u{E032}");
        assert_eq!(
            strokes,
            vec![
                KeyStroke::Char('a'),
                KeyStroke::Special(SpecialKey::Enter),
                KeyStroke::Char('1'),
                KeyStroke::Special(SpecialKey::F(2)),
            ]
        );
    }

    #[test]
    fn plain_text_stays_one_chunk() {
        assert_eq!(
            chunk_keys(&parse_keys("report.txt")),
            vec![KeyChunk::Text("report.txt".to_string())]
        );
    }

    #[test]
    fn modifiers_hold_until_null() {
        let chunks = chunk_keys(&parse_keys("x\u{E009}a\u{E000}b\u{E004}"));
        assert_eq!(
            chunks,
            vec![
                KeyChunk::Text("x".to_string()),
                KeyChunk::Chord {
                    modifiers: vec![SpecialKey::Control],
                    keys: vec![KeyStroke::Char('a')],
                },
                KeyChunk::Text("b".to_string()),
                KeyChunk::Special(SpecialKey::Tab),
            ]
        );
    }

    #[test]
    fn pressing_modifier_twice_releases_it() {
        let chunks = chunk_keys(&parse_keys("\u{E008}\u{E008}z"));
        assert_eq!(chunks, vec![KeyChunk::Text("z".to_string())]);
    }
}
