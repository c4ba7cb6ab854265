/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

//! Line-writing helpers for the Prometheus text exposition format.

/// Format a sample value the way the exposition format expects: integral
/// values without a fraction, everything else in shortest-float form.
pub(crate) fn push_value(buf: &mut String, v: f64) {
    if v.is_infinite() {
        buf.push_str(if v > 0.0 { "+Inf" } else { "-Inf" });
    } else if v.is_nan() {
        buf.push_str("NaN");
    } else if v == v.trunc() && v.abs() < 9.007_199_254_740_992e15 {
        let mut itoa_buf = itoa::Buffer::new();
        buf.push_str(itoa_buf.format(v as i64));
    } else {
        let mut ryu_buf = ryu::Buffer::new();
        buf.push_str(ryu_buf.format(v));
    }
}

/// Escape a label value: backslash, double quote and newline.
pub(crate) fn push_label_value(buf: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '"' => buf.push_str("\\\""),
            '\n' => buf.push_str("\\n"),
            c => buf.push(c),
        }
    }
}

/// Escape a help text: backslash and newline.
fn push_help_text(buf: &mut String, help: &str) {
    for c in help.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            c => buf.push(c),
        }
    }
}

pub(crate) fn write_help_type(buf: &mut String, name: &str, r#type: &str, help: &str) {
    buf.push_str("# HELP ");
    buf.push_str(name);
    buf.push(' ');
    push_help_text(buf, help);
    buf.push('\n');
    buf.push_str("# TYPE ");
    buf.push_str(name);
    buf.push(' ');
    buf.push_str(r#type);
    buf.push('\n');
}

pub(crate) fn write_plain_metric(buf: &mut String, name: &str, value: f64) {
    buf.push_str(name);
    buf.push(' ');
    push_value(buf, value);
    buf.push('\n');
}

pub(crate) fn write_single_label_metric(
    buf: &mut String,
    name: &str,
    label: &str,
    label_value: &str,
    value: f64,
) {
    buf.push_str(name);
    buf.push('{');
    buf.push_str(label);
    buf.push_str("=\"");
    push_label_value(buf, label_value);
    buf.push_str("\"}");
    buf.push(' ');
    push_value(buf, value);
    buf.push('\n');
}

/// Write `name{l1="v1",...}` without the sample value, optionally with one
/// trailing synthetic label (`le` or `quantile`).
pub(crate) fn push_labeled_name(
    buf: &mut String,
    name: &str,
    suffix: &str,
    label_names: &[String],
    label_values: &[String],
    extra: Option<(&str, f64)>,
) {
    buf.push_str(name);
    buf.push_str(suffix);

    if label_names.is_empty() && extra.is_none() {
        return;
    }

    buf.push('{');
    let mut first = true;
    for (ln, lv) in label_names.iter().zip(label_values.iter()) {
        if !first {
            buf.push(',');
        }
        first = false;
        buf.push_str(ln);
        buf.push_str("=\"");
        push_label_value(buf, lv);
        buf.push('"');
    }
    if let Some((extra_name, extra_value)) = extra {
        if !first {
            buf.push(',');
        }
        buf.push_str(extra_name);
        buf.push_str("=\"");
        push_value(buf, extra_value);
        buf.push('"');
    }
    buf.push('}');
}

pub(crate) fn write_labeled_metric(
    buf: &mut String,
    name: &str,
    suffix: &str,
    label_names: &[String],
    label_values: &[String],
    extra: Option<(&str, f64)>,
    value: f64,
) {
    push_labeled_name(buf, name, suffix, label_names, label_values, extra);
    buf.push(' ');
    push_value(buf, value);
    buf.push('\n');
}
