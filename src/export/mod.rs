/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

pub(crate) mod format;

mod http;
pub(crate) use http::spawn_scrape_server;
