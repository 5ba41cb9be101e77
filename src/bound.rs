//! Hard length ceiling for outbound chat messages.

/// Marker appended when a message is cut.
pub const DEFAULT_TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Default character ceiling for replies, matching Telegram's limit.
///
/// Telegram measures that limit in UTF-16 code units, so a reply within this
/// many characters can still be too long; see [`bound_utf16`].
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram's message length limit in UTF-16 code units.
pub const TELEGRAM_MAX_MESSAGE_UTF16_UNITS: usize = 4096;

/// Clamp `text` to at most `max_len` characters.
///
/// Text that already fits is returned unchanged. Otherwise the text is cut at
/// `max_len - len(marker)` characters, with no regard for word boundaries,
/// and `marker` is appended. If the marker alone does not fit, the result is
/// the marker cut to `max_len`. Bounding is idempotent.
pub fn bound(text: &str, max_len: usize, marker: &str) -> String {
    if text.chars().count() <= max_len {
        return text.to_owned();
    }

    let marker_len = marker.chars().count();
    if marker_len >= max_len {
        return marker.chars().take(max_len).collect();
    }

    let keep = max_len.saturating_sub(marker_len);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(marker);
    out
}

/// Clamp `text` to at most `max_units` UTF-16 code units.
///
/// Same contract as [`bound`], measured the way Telegram measures message
/// length. Cuts only on `char` boundaries, so a surrogate pair is never
/// split.
pub fn bound_utf16(text: &str, max_units: usize, marker: &str) -> String {
    if text.encode_utf16().count() <= max_units {
        return text.to_owned();
    }

    let marker_units = marker.encode_utf16().count();
    if marker_units >= max_units {
        return take_utf16(marker, max_units);
    }

    let mut out = take_utf16(text, max_units.saturating_sub(marker_units));
    out.push_str(marker);
    out
}

/// Longest `char` prefix of `text` that fits in `max_units` UTF-16 units.
fn take_utf16(text: &str, max_units: usize) -> String {
    let mut used: usize = 0;
    let mut out = String::new();
    for c in text.chars() {
        let next = used.saturating_add(c.len_utf16());
        if next > max_units {
            break;
        }
        out.push(c);
        used = next;
    }
    out
}
