// grohe_exporter - Grohe Sense metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::api::Fetch;
use crate::metrics::MetricsExposition;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, Response, StatusCode};
use prometheus::TEXT_FORMAT;
use std::sync::Arc;

const HTML_FORMAT: &str = "text/html; charset=utf-8";
const PROJECT_URL: &str = "https://github.com/l3akage/grohe_exporter";

/// Global state shared between all HTTP requests via Arc.
pub struct RequestContext<F> {
    exposition: MetricsExposition<F>,
    metrics_path: String,
}

impl<F> RequestContext<F> {
    pub fn new<S: Into<String>>(exposition: MetricsExposition<F>, metrics_path: S) -> Self {
        RequestContext {
            exposition,
            metrics_path: metrics_path.into(),
        }
    }
}

/// Run a scrape of the API for `GET` requests to the metrics path and render a
/// small landing page linking to it for `GET /`. If metrics can't be encoded, an
/// HTTP 500 will be returned and the error will be logged.
pub async fn http_route<F>(req: Request<Body>, context: Arc<RequestContext<F>>) -> Result<Response<Body>, hyper::Error>
where
    F: Fetch + Sync,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let res = if path == context.metrics_path {
        match method {
            Method::GET => match context.exposition.encoded_text().await {
                Ok(buffer) => http_status_body(StatusCode::OK, TEXT_FORMAT, buffer),
                Err(e) => {
                    tracing::error!(message = "error scraping metrics", error = %e);
                    http_status_no_body(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            _ => http_status_no_body(StatusCode::METHOD_NOT_ALLOWED),
        }
    } else {
        match (&method, path.as_ref()) {
            (&Method::GET, "/") => http_status_body(StatusCode::OK, HTML_FORMAT, landing_page(&context.metrics_path)),
            _ => http_status_no_body(StatusCode::NOT_FOUND),
        }
    };

    Ok(res)
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        concat!(
            "<html>\n",
            "<head><title>Grohe Exporter (Version {version})</title></head>\n",
            "<body>\n",
            "<h1>Grohe Exporter</h1>\n",
            "<p><a href=\"{path}\">Metrics</a></p>\n",
            "<h2>More information:</h2>\n",
            "<p><a href=\"{project}\">{project}</a></p>\n",
            "</body>\n",
            "</html>\n",
        ),
        version = env!("CARGO_PKG_VERSION"),
        path = metrics_path,
        project = PROJECT_URL,
    )
}

fn http_status_body<B: Into<Body>>(code: StatusCode, content_type: &'static str, body: B) -> Response<Body> {
    let mut res = Response::new(body.into());
    *res.status_mut() = code;
    res.headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    res
}

fn http_status_no_body(code: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = code;
    res
}
