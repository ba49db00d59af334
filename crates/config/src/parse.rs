//! Line parser for the binding format.

use std::{path::Path, result::Result as StdResult, time::Duration};

use linux_keycode::Combo;

use crate::{
    ActionSpec, Binding, Config, DEFAULT_PROFILE, Entry, Error, LineError, ProfileSwap,
    Result, excerpt_at,
};

/// Tokens before the action arguments: `ch= ev= key= thres= ACTION`.
const MIN_TOKENS: usize = 5;

/// Largest accepted integer; values are parsed as 16-bit signed.
const MAX_INT: i64 = i16::MAX as i64;

/// Highest accepted toggle accept threshold.
const MAX_ACCEPT_THRESHOLD: i64 = 128;

/// Prefix of the group list in `REPEAT-SEQUENCE` lines.
const SEQUENCE_PREFIX: &str = "str=";

/// Failure within one line: 1-based column and kind.
type LineResult<T> = StdResult<T, (usize, LineError)>;

/// A whitespace-separated token and its 1-based column.
#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    /// Token text.
    text: &'a str,
    /// 1-based column of the first character.
    col: usize,
}

/// Split a line on whitespace, keeping column positions.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push(Token {
                    text: &line[s..i],
                    col: s + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &line[s..],
            col: s + 1,
        });
    }
    out
}

/// Parse an integer in decimal or with a `0x`, `0o` or `0b` prefix.
fn parse_int(s: &str) -> Option<i64> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(b) = lower.strip_prefix("0x") {
        (16, b)
    } else if let Some(b) = lower.strip_prefix("0o") {
        (8, b)
    } else if let Some(b) = lower.strip_prefix("0b") {
        (2, b)
    } else {
        (10, lower.as_str())
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    let value = i64::from_str_radix(body, radix).ok()?;
    let value = if neg { -value } else { value };
    (i64::from(i16::MIN)..=MAX_INT)
        .contains(&value)
        .then_some(value)
}

/// Parse a `prefix=value` token into a byte no larger than `max`.
fn prefixed_byte(
    tok: Token<'_>,
    prefix: &str,
    missing: LineError,
    invalid: LineError,
    max: u8,
) -> LineResult<u8> {
    let Some(raw) = tok.text.strip_prefix(prefix) else {
        return Err((tok.col, missing));
    };
    parse_int(raw)
        .filter(|v| (0..=i64::from(max)).contains(v))
        .and_then(|v| u8::try_from(v).ok())
        .ok_or((tok.col + prefix.len(), invalid))
}

/// Parse a positive action argument no larger than `max`.
fn positive_arg(tok: Token<'_>, max: i64) -> LineResult<i64> {
    parse_int(tok.text)
        .filter(|v| *v > 0 && *v <= max)
        .ok_or_else(|| (tok.col, LineError::ActionArgumentInvalid(tok.text.to_string())))
}

/// Parse a positive argument as a millisecond duration.
fn millis_arg(tok: Token<'_>) -> LineResult<Duration> {
    let ms = positive_arg(tok, MAX_INT)?;
    Ok(Duration::from_millis(ms.unsigned_abs()))
}

/// Parse a positive argument as a note number.
fn note_arg(tok: Token<'_>) -> LineResult<u8> {
    let v = positive_arg(tok, i64::from(u8::MAX))?;
    u8::try_from(v).map_err(|_| (tok.col, LineError::ActionArgumentInvalid(tok.text.to_string())))
}

/// Parse a key combo such as `ctrl,z`.
fn combo_at(text: &str, col: usize) -> LineResult<Combo> {
    Combo::parse(text).map_err(|e| (col, LineError::KeyInvalid(e.to_string())))
}

/// Number of arguments each action takes.
fn arg_count(action: &str) -> Option<usize> {
    match action {
        "BASIC" => Some(1),
        "VELOCITY" | "TOGGLE" | "REPEAT" => Some(2),
        "REPEAT-SEQUENCE" => Some(6),
        _ => None,
    }
}

/// Token count error pointing at the last token of the line.
fn token_count(tokens: &[Token<'_>], expected: usize) -> (usize, LineError) {
    let col = tokens.last().map_or(1, |t| t.col);
    (
        col,
        LineError::TokenCount {
            expected,
            found: tokens.len(),
        },
    )
}

/// Check that a line has exactly `expected` tokens.
fn expect_tokens(tokens: &[Token<'_>], expected: usize) -> LineResult<()> {
    if tokens.len() == expected {
        Ok(())
    } else {
        Err(token_count(tokens, expected))
    }
}

/// Parse `ch=` and `ev=` tokens.
fn channel_and_note(ch: Token<'_>, ev: Token<'_>) -> LineResult<(u8, u8)> {
    let channel = prefixed_byte(
        ch,
        "ch=",
        LineError::ChannelTokenMissing,
        LineError::ChannelInvalid,
        15,
    )?;
    let note = prefixed_byte(
        ev,
        "ev=",
        LineError::EventTokenMissing,
        LineError::EventInvalid,
        u8::MAX,
    )?;
    Ok((channel, note))
}

/// Parse a `thres=` token.
fn threshold(tok: Token<'_>) -> LineResult<u8> {
    prefixed_byte(
        tok,
        "thres=",
        LineError::ThresholdTokenMissing,
        LineError::ThresholdInvalid,
        u8::MAX,
    )
}

/// Parse the arguments of `action`.
fn action_spec(action: Token<'_>, args: &[Token<'_>]) -> LineResult<ActionSpec> {
    let spec = match action.text {
        "BASIC" => ActionSpec::Basic {
            release: millis_arg(args[0])?,
        },
        "VELOCITY" => ActionSpec::Velocity {
            min_press: millis_arg(args[0])?,
            max_press: millis_arg(args[1])?,
        },
        "TOGGLE" => {
            let accept = positive_arg(args[0], MAX_ACCEPT_THRESHOLD)?;
            ActionSpec::Toggle {
                accept_threshold: u8::try_from(accept).map_err(|_| {
                    (
                        args[0].col,
                        LineError::ActionArgumentInvalid(args[0].text.to_string()),
                    )
                })?,
                quick_press: millis_arg(args[1])?,
            }
        }
        "REPEAT" => ActionSpec::Repeat {
            max_repeat_delay: millis_arg(args[0])?,
            short_release: millis_arg(args[1])?,
        },
        "REPEAT-SEQUENCE" => {
            let max_repeat_delay = millis_arg(args[0])?;
            let short_release = millis_arg(args[1])?;
            let prev = note_arg(args[2])?;
            let next = note_arg(args[3])?;
            let reset = note_arg(args[4])?;
            let last = args[5];
            let Some(list) = last.text.strip_prefix(SEQUENCE_PREFIX) else {
                return Err((
                    last.col,
                    LineError::ActionArgumentInvalid(last.text.to_string()),
                ));
            };
            let mut groups = Vec::new();
            let mut col = last.col + SEQUENCE_PREFIX.len();
            for part in list.split(';') {
                groups.push(combo_at(part, col)?);
                col += part.len() + 1;
            }
            ActionSpec::RepeatSequence {
                max_repeat_delay,
                short_release,
                prev,
                next,
                reset,
                groups,
            }
        }
        other => return Err((action.col, LineError::ActionInvalid(other.to_string()))),
    };
    Ok(spec)
}

/// Parse a binding line.
fn binding(tokens: &[Token<'_>]) -> LineResult<Binding> {
    if tokens.len() < MIN_TOKENS {
        return Err(token_count(tokens, MIN_TOKENS));
    }
    let (channel, note) = channel_and_note(tokens[0], tokens[1])?;

    let key = tokens[2];
    let Some(keys) = key.text.strip_prefix("key=") else {
        return Err((key.col, LineError::KeyTokenMissing));
    };
    let combo = combo_at(keys, key.col + "key=".len())?;

    let threshold = threshold(tokens[3])?;

    let action = tokens[4];
    let Some(want) = arg_count(action.text) else {
        return Err((action.col, LineError::ActionInvalid(action.text.to_string())));
    };
    expect_tokens(tokens, MIN_TOKENS + want)?;
    let action = action_spec(action, &tokens[MIN_TOKENS..])?;

    Ok(Binding {
        channel,
        note,
        combo,
        threshold,
        action,
    })
}

/// Parse a profile name; `default` maps to `None` when `allow_default`.
fn profile_name(tok: Token<'_>, allow_default: bool) -> LineResult<Option<String>> {
    if tok.text == DEFAULT_PROFILE {
        if allow_default {
            return Ok(None);
        }
        return Err((tok.col, LineError::ProfileNameInvalid(tok.text.to_string())));
    }
    if tok.text.is_empty() || tok.text.contains(['=', ',', ';']) {
        return Err((tok.col, LineError::ProfileNameInvalid(tok.text.to_string())));
    }
    Ok(Some(tok.text.to_string()))
}

/// Parse an `@` directive line.
fn directive(tokens: &[Token<'_>]) -> LineResult<Entry> {
    let head = tokens[0];
    match head.text {
        "@profile" => {
            expect_tokens(tokens, 2)?;
            Ok(Entry::Profile(profile_name(tokens[1], true)?))
        }
        "@active" => {
            expect_tokens(tokens, 2)?;
            Ok(Entry::Activate(profile_name(tokens[1], true)?))
        }
        "@swap" => {
            expect_tokens(tokens, 5)?;
            let (channel, note) = channel_and_note(tokens[1], tokens[2])?;
            let threshold = threshold(tokens[3])?;
            let list = tokens[4];
            let mut names = Vec::new();
            let mut col = list.col;
            for part in list.text.split(',') {
                let tok = Token { text: part, col };
                if let Some(name) = profile_name(tok, false)? {
                    names.push(name);
                }
                col += part.len() + 1;
            }
            Ok(Entry::Swap(ProfileSwap {
                channel,
                note,
                threshold,
                names,
            }))
        }
        other => Err((head.col, LineError::DirectiveInvalid(other.to_string()))),
    }
}

/// Parse one line; `None` for blank lines and comments.
fn line(text: &str) -> LineResult<Option<Entry>> {
    let tokens = tokenize(text);
    let Some(first) = tokens.first() else {
        return Ok(None);
    };
    if first.text.starts_with('#') {
        return Ok(None);
    }
    if first.text.starts_with('@') {
        return directive(&tokens).map(Some);
    }
    binding(&tokens).map(|b| Some(Entry::Bind(b)))
}

/// Parse a whole configuration source.
pub fn parse(source: &str, path: Option<&Path>) -> Result<Config> {
    let mut entries = Vec::new();
    for (idx, text) in source.lines().enumerate() {
        match line(text) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err((col, kind)) => {
                let line = idx + 1;
                return Err(Error::Line {
                    path: path.map(Path::to_path_buf),
                    line,
                    col,
                    kind,
                    excerpt: excerpt_at(source, line, col),
                });
            }
        }
    }
    Ok(Config { entries })
}
