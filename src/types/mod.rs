/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

mod event;
pub use event::{Event, EventKind};

mod name;
pub use name::escape_metric_name;

mod tag;
pub(crate) use tag::parse_dogstatsd_tags;
pub use tag::TagMap;

mod duration;
pub(crate) use duration::parse_duration;
