/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 The statsd-exporter Authors.
 */

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use http::header::CONTENT_TYPE;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::collect::MetricRegistry;
use crate::stats;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

struct ScrapeHandler {
    registry: Arc<Mutex<MetricRegistry>>,
    telemetry_path: String,
}

impl ScrapeHandler {
    fn render(&self) -> String {
        let mut buf = String::with_capacity(4096);
        stats::global().render(&mut buf);
        self.registry.lock().unwrap().render(&mut buf);
        buf
    }

    fn landing_page(&self) -> String {
        format!(
            "<html>\n\
             <head><title>StatsD Exporter</title></head>\n\
             <body>\n\
             <h1>StatsD Exporter</h1>\n\
             <p><a href=\"{}\">Metrics</a></p>\n\
             </body>\n\
             </html>\n",
            self.telemetry_path
        )
    }

    fn handle(&self, req: &Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path();
        if path == self.telemetry_path {
            let mut response = Response::new(Full::new(Bytes::from(self.render())));
            response.headers_mut().insert(
                CONTENT_TYPE,
                http::HeaderValue::from_static(EXPOSITION_CONTENT_TYPE),
            );
            return response;
        }
        if path == "/" {
            let mut response = Response::new(Full::new(Bytes::from(self.landing_page())));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, http::HeaderValue::from_static("text/html"));
            return response;
        }

        let mut response = Response::new(Full::default());
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}

/// Bind the scrape endpoint and spawn its accept loop. Each connection
/// is served on its own task; rendering takes the registry lock only for
/// the duration of one snapshot.
pub(crate) async fn spawn_scrape_server(
    listen_addr: SocketAddr,
    telemetry_path: String,
    registry: Arc<Mutex<MetricRegistry>>,
    mut quit: broadcast::Receiver<()>,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .context(format!("failed to bind web listen address {listen_addr}"))?;
    info!("accepting Prometheus scrapes on {listen_addr}{telemetry_path}");

    let handler = Arc::new(ScrapeHandler {
        registry,
        telemetry_path,
    });

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = quit.recv() => break,
                r = listener.accept() => {
                    let stream = match r {
                        Ok((stream, _peer_addr)) => stream,
                        Err(e) => {
                            warn!("error accepting scrape connection: {e}");
                            continue;
                        }
                    };

                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            async move {
                                Ok::<_, hyper::Error>(handler.handle(&req))
                            }
                        });
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            warn!("error serving scrape connection: {e}");
                        }
                    });
                }
            }
        }
        info!("stopped scrape listener on {listen_addr}");
    });
    Ok(handle)
}
