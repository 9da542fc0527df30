//! Per-core server metrics.
//!
//! Counters are plain `Cell`s: all updates happen between suspension
//! points on the owning core, so no atomics are involved.

use std::cell::Cell;

/// Kind of an exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// One exported sample.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub group: &'static str,
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    /// Per-core service id label, e.g. `cpv-http-server-0`.
    pub service: String,
    pub value: u64,
}

thread_local! {
    static SERVICE_ID: Cell<usize> = const { Cell::new(0) };
}

/// Counters of one http server instance.
#[derive(Debug)]
pub struct HttpServerMetrics {
    service: String,
    total_connections: Cell<u64>,
    current_connections: Cell<u64>,
    request_served: Cell<u64>,
    read_errors: Cell<u64>,
    write_errors: Cell<u64>,
}

impl HttpServerMetrics {
    pub fn new() -> HttpServerMetrics {
        let id = SERVICE_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        HttpServerMetrics {
            service: format!("cpv-http-server-{}", id),
            total_connections: Cell::new(0),
            current_connections: Cell::new(0),
            request_served: Cell::new(0),
            read_errors: Cell::new(0),
            write_errors: Cell::new(0),
        }
    }

    pub fn connection_accepted(&self) {
        self.total_connections.set(self.total_connections.get() + 1);
        self.current_connections
            .set(self.current_connections.get() + 1);
    }

    pub fn connection_closed(&self) {
        self.current_connections
            .set(self.current_connections.get().saturating_sub(1));
    }

    pub fn request_served(&self) {
        self.request_served.set(self.request_served.get() + 1);
    }

    pub fn read_error(&self) {
        self.read_errors.set(self.read_errors.get() + 1);
    }

    pub fn write_error(&self) {
        self.write_errors.set(self.write_errors.get() + 1);
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.get()
    }

    pub fn current_connections(&self) -> u64 {
        self.current_connections.get()
    }

    pub fn requests_served(&self) -> u64 {
        self.request_served.get()
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.get()
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.get()
    }

    /// Export all samples by name for the metrics collaborator.
    pub fn report(&self) -> Vec<MetricSample> {
        let sample = |name, kind, description, value| MetricSample {
            group: "cpv-http-server",
            name,
            kind,
            description,
            service: self.service.clone(),
            value,
        };
        vec![
            sample(
                "total_connections",
                MetricKind::Counter,
                "The total number of connections accepted",
                self.total_connections.get(),
            ),
            sample(
                "current_connections",
                MetricKind::Gauge,
                "The current number of open connections",
                self.current_connections.get(),
            ),
            sample(
                "request_served",
                MetricKind::Counter,
                "The total number of http request served",
                self.request_served.get(),
            ),
            sample(
                "read_errors",
                MetricKind::Counter,
                "The total number of errors while reading from client",
                self.read_errors.get(),
            ),
            sample(
                "write_errors",
                MetricKind::Counter,
                "The total number of errors while writing to client",
                self.write_errors.get(),
            ),
        ]
    }
}

impl Default for HttpServerMetrics {
    fn default() -> HttpServerMetrics {
        HttpServerMetrics::new()
    }
}
