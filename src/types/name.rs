/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::borrow::Cow;

fn is_legal_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Rewrite a metric or label name into the exposition character set.
///
/// A leading ASCII digit gets an `_` prepended, every byte outside
/// `[A-Za-z0-9_]` becomes `_`. The caller must not pass an empty name.
pub fn escape_metric_name(name: &str) -> Cow<'_, str> {
    let bytes = name.as_bytes();
    if !bytes[0].is_ascii_digit() && bytes.iter().all(|b| is_legal_byte(*b)) {
        return Cow::Borrowed(name);
    }

    let mut escaped = Vec::with_capacity(bytes.len() + 1);
    if bytes[0].is_ascii_digit() {
        escaped.push(b'_');
    }
    for b in bytes {
        if is_legal_byte(*b) {
            escaped.push(*b);
        } else {
            escaped.push(b'_');
        }
    }
    // only ASCII was inserted or kept
    Cow::Owned(unsafe { String::from_utf8_unchecked(escaped) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_is_borrowed() {
        assert!(matches!(escape_metric_name("foo_bar"), Cow::Borrowed(_)));
    }

    #[test]
    fn illegal_chars() {
        assert_eq!(escape_metric_name("foo.bar"), "foo_bar");
        assert_eq!(escape_metric_name("foo-bar.baz"), "foo_bar_baz");
        assert_eq!(escape_metric_name("a\u{00e9}b"), "a__b");
    }

    #[test]
    fn leading_digit() {
        assert_eq!(escape_metric_name("9foo"), "_9foo");
        assert_eq!(escape_metric_name("9.foo"), "_9_foo");
    }

    #[test]
    fn idempotent() {
        for name in ["foo.bar", "9foo", "a b-c", "x"] {
            let once = escape_metric_name(name).into_owned();
            let twice = escape_metric_name(&once).into_owned();
            assert_eq!(once, twice);
        }
    }
}
