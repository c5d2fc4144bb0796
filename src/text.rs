//! Script text decoding
//!
//! Dialogue strings in SCR files are UTF-16LE code units interleaved with
//! 4-byte control codes of the form `xx FF FF FF`, where the low byte
//! selects the directive (line break, pause, dialogue branch, player
//! choice, button glyph, furigana, color, variable substitution). The
//! decoder walks the stream once, dispatching each sentinel through a
//! low-byte handler lookup, and stops at the first bare null code unit.
//!
//! All declared lengths and counts are bounds-checked up front; a control
//! code that would read past the buffer fails the whole string with
//! [`Error::TruncatedText`] rather than returning partial text.

use crate::error::{Error, Result};

/// Control directive kinds found in script text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `0xE9`: two alternate dialogue paths, both emitted
    Branch,
    /// `0xF0`: line break, emitted as the literal sequence `\n`
    LineBreak,
    /// `0xF1`: pause until the player confirms, emitted as `\n`
    Pause,
    /// `0xF4`: pronunciation guide, present in data but not rendered
    Furigana,
    /// `0xF5`: player choice set, emitted as `(a / b / ...)`
    ChoiceSet,
    /// `0xF6`: variable substitution, emitted as `(op1, op2)`
    VariableRef,
    /// `0xF7`: text color change, not representable in plain text
    ColorSet,
    /// `0xF9`: controller button glyph
    ButtonRef,
}

/// One decoded control code: its kind, the position just past its span,
/// and the text it contributes (possibly empty)
#[derive(Debug, Clone)]
pub struct ControlToken {
    pub kind: TokenKind,
    pub end: usize,
    pub text: String,
}

type Handler = fn(&[u8], usize) -> Result<ControlToken>;

/// Select the handler for a sentinel low byte, if the byte is a known
/// control code
fn handler_for(code: u8) -> Option<Handler> {
    Some(match code {
        0xE9 => branch,
        0xF0 => line_break,
        0xF1 => pause,
        0xF4 => furigana,
        0xF5 => choice_set,
        0xF6 => variable_ref,
        0xF7 => color_set,
        0xF9 => button_ref,
        _ => return None,
    })
}

/// Display label for a button glyph code
pub fn button_label(code: u32) -> Option<&'static str> {
    Some(match code {
        0 => "A",
        1 => "B",
        2 => "X",
        3 => "D-Pad",
        4 => "Circle Pad",
        5 | 7 => "L",
        6 | 8 => "R",
        9 | 10 => "Y",
        _ => return None,
    })
}

/// Name of a text color code
///
/// Colors are not representable in plain text output; the color control
/// code is consumed without emission. The names are exposed for tooling.
pub fn color_name(code: u32) -> Option<&'static str> {
    Some(match code {
        0 => "Black",
        3 => "Red",
        4 => "Green",
        _ => return None,
    })
}

/// Decode the control-coded UTF-16 text starting at `offset`
///
/// Returns the concatenated display string. The terminal condition is a
/// null code unit outside any control span; line breaks and pauses emit
/// the two-character literal `\n` so one logical row stays on one line.
pub fn decode_text(data: &[u8], offset: usize) -> Result<String> {
    let mut out = String::new();
    let mut pos = offset;

    loop {
        let unit = need(data, pos, 2)?;

        if let Some(handler) = sentinel_at(data, pos) {
            let token = handler(data, pos)?;
            if token.kind == TokenKind::ChoiceSet && !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token.text);
            pos = token.end;
            continue;
        }

        if unit == [0xFF, 0xFF] {
            // 2-byte filler
            pos += 2;
            continue;
        }
        if unit == [0x00, 0x00] {
            break;
        }

        // Plain run: consume code units up to the next control boundary so
        // surrogate pairs decode as one character
        let start = pos;
        pos += 2;
        while let Some(next) = data.get(pos..pos + 2) {
            if next == [0x00, 0x00] || next == [0xFF, 0xFF] || sentinel_at(data, pos).is_some() {
                break;
            }
            pos += 2;
        }
        out.push_str(&utf16_run(&data[start..pos]));
    }

    Ok(out)
}

/// Handler for the 4-byte sentinel starting at `pos`, if one starts there
fn sentinel_at(data: &[u8], pos: usize) -> Option<Handler> {
    let window = data.get(pos..pos + 4)?;
    if window[1..4] == [0xFF, 0xFF, 0xFF] {
        handler_for(window[0])
    } else {
        None
    }
}

fn branch(data: &[u8], pos: usize) -> Result<ControlToken> {
    let first_count = read_u16(data, pos + 22)? as usize;
    let mut cur = pos + 24;
    let first = utf16_run(need(data, cur, string_payload(first_count, cur)?)?);
    cur += first_count;

    if data.get(cur..cur + 2) == Some(&[0xFF, 0xFF][..]) {
        cur += 2;
    }
    let second_count = read_u16(data, cur + 2)? as usize;
    let second = utf16_run(need(data, cur + 4, string_payload(second_count, cur)?)?);

    Ok(ControlToken {
        kind: TokenKind::Branch,
        end: cur + 4 + second_count,
        text: format!("{} / {}", first, second),
    })
}

/// Payload length of a counted string: the count includes its trailing
/// null pair
fn string_payload(count: usize, at: usize) -> Result<usize> {
    count
        .checked_sub(2)
        .ok_or(Error::TruncatedText { offset: at, needed: 2 })
}

fn line_break(data: &[u8], pos: usize) -> Result<ControlToken> {
    need(data, pos, 8)?;
    Ok(ControlToken {
        kind: TokenKind::LineBreak,
        end: pos + 8,
        text: "\\n".to_string(),
    })
}

fn pause(data: &[u8], pos: usize) -> Result<ControlToken> {
    need(data, pos, 8)?;
    Ok(ControlToken {
        kind: TokenKind::Pause,
        end: pos + 8,
        text: "\\n".to_string(),
    })
}

fn furigana(data: &[u8], pos: usize) -> Result<ControlToken> {
    let byte_count = read_u16(data, pos + 10)? as usize;
    need(data, pos + 12, byte_count)?;
    Ok(ControlToken {
        kind: TokenKind::Furigana,
        end: pos + 12 + byte_count,
        text: String::new(),
    })
}

fn choice_set(data: &[u8], pos: usize) -> Result<ControlToken> {
    let choice_count = read_u32(data, pos + 12)? as usize;
    // A 4-byte slot per choice precedes the option strings
    let mut cur = pos + 16 + 4 * choice_count;

    let mut options = Vec::with_capacity(choice_count);
    for _ in 0..choice_count {
        let byte_count = read_u16(data, cur + 4)? as usize;
        let bytes = need(data, cur + 8, byte_count)?;
        // An option shorter than its declared length ends at an embedded
        // null pair
        let mut len = 0;
        while len + 2 <= byte_count && bytes[len..len + 2] != [0x00, 0x00] {
            len += 2;
        }
        options.push(utf16_run(&bytes[..len]));
        cur += 8 + byte_count;
    }

    Ok(ControlToken {
        kind: TokenKind::ChoiceSet,
        end: cur,
        text: format!("({})", options.join(" / ")),
    })
}

fn variable_ref(data: &[u8], pos: usize) -> Result<ControlToken> {
    let op1 = read_u32(data, pos + 4)?;
    let op2 = read_u32(data, pos + 8)?;
    Ok(ControlToken {
        kind: TokenKind::VariableRef,
        end: pos + 12,
        text: format!("({}, {})", op1, op2),
    })
}

fn color_set(data: &[u8], pos: usize) -> Result<ControlToken> {
    need(data, pos, 12)?;
    Ok(ControlToken {
        kind: TokenKind::ColorSet,
        end: pos + 12,
        text: String::new(),
    })
}

fn button_ref(data: &[u8], pos: usize) -> Result<ControlToken> {
    let code = read_u32(data, pos + 8)?;
    Ok(ControlToken {
        kind: TokenKind::ButtonRef,
        end: pos + 12,
        text: button_label(code).unwrap_or("?").to_string(),
    })
}

fn need(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or(Error::TruncatedText { offset: pos, needed: len })
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    let bytes = need(data, pos, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    let bytes = need(data, pos, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn utf16_run(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    std::char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
