//! Listener setup and server lifecycle.
//!
//! A server instance owns one core: it must run on a current-thread
//! runtime inside a `tokio::task::LocalSet`. Parallelism across cores is
//! achieved by running one instance per core and letting the OS spread
//! accepted connections.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use log::{info, warn};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::HttpServerConfiguration;
use crate::connection::{ConnectionShared, StopSignal, serve_connection};
use crate::container::ServiceContainer;
use crate::errors::{HttpError, HttpResult};
use crate::handler::HttpServerRequestHandler;
use crate::handler_404::HttpServerRequest404Handler;
use crate::handler_500::HttpServerRequest500Handler;
use crate::metrics::HttpServerMetrics;
use crate::netutils::parse_listen_address;

/// Builds an [`HttpServer`]: transport configuration plus the ordered
/// intermediate handlers.
pub struct HttpServerBuilder {
    config: HttpServerConfiguration,
    handlers: Vec<Rc<dyn HttpServerRequestHandler>>,
    container: ServiceContainer,
}

impl HttpServerBuilder {
    pub fn new() -> HttpServerBuilder {
        HttpServerBuilder {
            config: HttpServerConfiguration::default(),
            handlers: Vec::new(),
            container: ServiceContainer::new(),
        }
    }

    /// Replace the transport configuration.
    pub fn configuration(self, config: HttpServerConfiguration) -> Self {
        let mut this = self;
        this.config = config;
        this
    }

    /// Add a listen address, `"ip:port"` or `":port"`.
    pub fn listen(self, address: impl Into<String>) -> Self {
        let mut this = self;
        this.config = this.config.listen(address);
        this
    }

    /// Add an already resolved listen address.
    pub fn listen_on(self, address: SocketAddr) -> Self {
        let mut this = self;
        this.config = this.config.listen_on(address);
        this
    }

    /// Append an intermediate handler; registration order is invocation
    /// order.
    pub fn handler(self, handler: impl HttpServerRequestHandler) -> Self {
        self.handler_rc(Rc::new(handler))
    }

    pub fn handler_rc(self, handler: Rc<dyn HttpServerRequestHandler>) -> Self {
        let mut this = self;
        this.handlers.push(handler);
        this
    }

    /// Use the given per-core service container.
    pub fn container(self, container: ServiceContainer) -> Self {
        let mut this = self;
        this.container = container;
        this
    }

    /// Compose the pipeline (500 handler at the head, 404 at the tail)
    /// and produce the server.
    pub fn build(self) -> HttpServer {
        let mut pipeline: Vec<Rc<dyn HttpServerRequestHandler>> =
            Vec::with_capacity(self.handlers.len() + 2);
        pipeline.push(Rc::new(HttpServerRequest500Handler));
        pipeline.extend(self.handlers);
        pipeline.push(Rc::new(HttpServerRequest404Handler));
        HttpServer {
            shared: Rc::new(ConnectionShared {
                config: Rc::new(self.config),
                metrics: Rc::new(HttpServerMetrics::new()),
                pipeline: Rc::new(pipeline),
                container: self.container,
                stop: Rc::new(StopSignal::new()),
            }),
            tracker: Rc::new(ConnectionTracker::default()),
            state: RefCell::new(ServerState::default()),
        }
    }
}

impl Default for HttpServerBuilder {
    fn default() -> HttpServerBuilder {
        HttpServerBuilder::new()
    }
}

#[derive(Default)]
struct ServerState {
    started: bool,
    stopped: bool,
    local_addresses: Vec<SocketAddr>,
    accept_tasks: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct ConnectionTracker {
    active: Cell<usize>,
    drained: Notify,
}

impl ConnectionTracker {
    fn connection_started(&self) {
        self.active.set(self.active.get() + 1);
    }

    fn connection_finished(&self) {
        let remaining = self.active.get().saturating_sub(1);
        self.active.set(remaining);
        if remaining == 0 {
            self.drained.notify_waiters();
        }
    }
}

/// A per-core http server instance.
pub struct HttpServer {
    shared: Rc<ConnectionShared>,
    tracker: Rc<ConnectionTracker>,
    state: RefCell<ServerState>,
}

impl HttpServer {
    pub fn builder() -> HttpServerBuilder {
        HttpServerBuilder::new()
    }

    /// Bind all configured listeners and start accepting. Must run inside
    /// a `LocalSet` on a current-thread runtime.
    pub async fn start(&self) -> HttpResult<()> {
        {
            let state = self.state.borrow();
            if state.started {
                return Err(HttpError::Logic("server already started"));
            }
        }
        let config = &self.shared.config;
        if let Some(level) = config.log_level {
            log::set_max_level(level.to_level_filter());
        }
        let mut addresses = Vec::new();
        for address in &config.listen_addresses {
            addresses.push(parse_listen_address(address)?);
        }
        for address in &config.listen_socket_addresses {
            if address.is_ipv6() {
                return Err(HttpError::NotImplemented(
                    "ipv6 address is unsupported for now",
                ));
            }
            addresses.push(*address);
        }
        if addresses.is_empty() {
            return Err(HttpError::Format("no listen address configured".to_string()));
        }
        let mut state = self.state.borrow_mut();
        for address in addresses {
            let socket = TcpSocket::new_v4()?;
            socket.set_reuseaddr(true)?;
            socket.bind(address)?;
            let listener = socket.listen(config.listen_backlog)?;
            let local = listener.local_addr()?;
            info!("http server listening on {}", local);
            state.local_addresses.push(local);
            state.accept_tasks.push(tokio::task::spawn_local(accept_loop(
                self.shared.clone(),
                self.tracker.clone(),
                listener,
            )));
        }
        state.started = true;
        Ok(())
    }

    /// Addresses actually bound; useful when listening on port 0.
    pub fn local_addresses(&self) -> Vec<SocketAddr> {
        self.state.borrow().local_addresses.clone()
    }

    /// Refuse new accepts, cancel connections at their next suspension
    /// point, await every in-flight task, release the listeners.
    /// Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.shared.stop.trigger();
        let tasks: Vec<JoinHandle<()>> = self.state.borrow_mut().accept_tasks.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        while self.tracker.active.get() > 0 {
            self.tracker.drained.notified().await;
        }
        info!("http server stopped");
    }

    pub fn metrics(&self) -> Rc<HttpServerMetrics> {
        self.shared.metrics.clone()
    }

    pub fn container(&self) -> ServiceContainer {
        self.shared.container.clone()
    }
}

async fn accept_loop(
    shared: Rc<ConnectionShared>,
    tracker: Rc<ConnectionTracker>,
    listener: TcpListener,
) {
    loop {
        let accepted = tokio::select! {
            _ = shared.stop.wait() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                tracker.connection_started();
                let shared = shared.clone();
                let tracker = tracker.clone();
                tokio::task::spawn_local(async move {
                    serve_connection(shared, stream, peer).await;
                    tracker.connection_finished();
                });
            },
            Err(e) => {
                // transient accept failures (e.g. fd exhaustion); back off
                // instead of spinning
                warn!("accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
        }
    }
}
