/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::collections::BTreeMap;

use log::debug;
use memchr::memchr;

use super::escape_metric_name;
use crate::stats;

/// Label set attached to an event, ordered by label name.
pub type TagMap = BTreeMap<String, String>;

/// Split a DogStatsD tag section (the part after `#`) into labels.
///
/// Tags without a `:` or with an empty value are skipped and counted.
/// Tag names go through [`escape_metric_name`], tag values are kept as
/// received.
pub(crate) fn parse_dogstatsd_tags(section: &str, tags: &mut TagMap) {
    stats::global().add_tags_received();

    for tag in section.split(',') {
        match memchr(b':', tag.as_bytes()) {
            Some(p) if p + 1 < tag.len() => {
                let name = escape_metric_name(&tag[..p]);
                tags.insert(name.into_owned(), tag[p + 1..].to_string());
            }
            _ => {
                stats::global().add_tag_error();
                debug!("malformed or empty DogStatsD tag {tag} in section {section}");
            }
        }
    }
}
