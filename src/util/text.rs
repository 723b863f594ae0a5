use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

fn is_stripped_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}

/// Remove terminal control characters and ANSI escape sequences.
///
/// Article titles and bodies come from the backend verbatim, so they are
/// passed through here before being printed. CSI (`ESC [ ... final`) and OSC
/// (`ESC ] ... BEL` or `ESC ] ... ESC \`) sequences are dropped whole; other
/// control characters are dropped individually. Tab, newline and carriage
/// return survive.
pub fn sanitize_for_terminal(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes, up to the final byte.
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Cow::Owned(out)
}

/// Fit `s` into `max_width` terminal columns, ending in "..." when cut.
///
/// Widths of 3 or less have no room for the ellipsis, so the text is simply
/// clipped.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..end].to_string())
    } else {
        Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
    }
}

/// Truncate to `width` columns, then right-pad with spaces to exactly `width`.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let fitted = truncate_to_width(s, width);
    let fill = width.saturating_sub(UnicodeWidthStr::width(fitted.as_ref()));
    let mut out = String::with_capacity(fitted.len() + fill);
    out.push_str(&fitted);
    out.extend(std::iter::repeat(' ').take(fill));
    out
}
