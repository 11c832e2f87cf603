//! Streaming GPSD session
//!
//! This module provides a long-lived session with a GPSD server. A session
//! is connected and configured first, then started, after which a
//! background task keeps watch mode enabled, decodes every record whose
//! class has subscribers, and hands the decoded [`Report`] to those
//! subscribers. When GPSD closes the connection or the socket fails, the
//! task waits for the reconnect delay, dials again and carries on.
//!
//! The two states are two types:
//! - [`Session`]: connected, not streaming. Subscriptions and synchronous
//!   request/response helpers live here.
//! - [`SessionHandle`]: streaming. Commands can still be sent; `close`
//!   stops the task and waits for it.
//!
//! # Example
//!
//! ```no_run
//! use gpsd_session::client::Session;
//! use gpsd_session::protocol::v3::{Report, ReportClass};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::connect("127.0.0.1:2947").await?;
//!
//! session.subscribe(ReportClass::Tpv, |report| {
//!     if let Report::Tpv(tpv) = report {
//!         println!("mode {:?} at {:?}", tpv.mode, tpv.time);
//!     }
//! });
//!
//! let handle = session.start();
//! tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//! handle.close().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::{
    Result,
    error::GpsdError,
    protocol::v3::{self, Report, ReportClass},
};

use self::connection::{CommandWriter, Connection, LineReader, is_closed_socket};

mod connection;
mod metrics;
mod subscribers;

pub use self::metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use self::subscribers::{ReportCallback, Subscribers};

/// Default GPSD endpoint
pub const DEFAULT_ADDRESS: &str = "localhost:2947";

/// Default bound on establishing a TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default pause between a stream ending and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Watch-mode settings sent with `?WATCH=`
///
/// Use [`WatchOptions::json()`] for a JSON report stream (the session
/// default) and [`WatchOptions::disable()`] to leave watch mode.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    inner: v3::types::Watch,
}

impl WatchOptions {
    /// Creates options enabling watch mode with JSON reports
    pub fn json() -> Self {
        WatchOptions {
            inner: v3::types::Watch {
                enable: Some(true),
                json: Some(true),
                ..Default::default()
            },
        }
    }

    /// Creates options that turn watch mode off
    pub fn disable() -> Self {
        WatchOptions {
            inner: v3::types::Watch {
                enable: Some(false),
                ..Default::default()
            },
        }
    }

    /// Enables or disables PPS (Pulse Per Second) messages
    ///
    /// When enabled, the stream will include PPS timing messages
    /// if the GPS receiver supports precision timing.
    pub fn pps(mut self, enable: bool) -> Self {
        self.inner.pps = Some(enable);
        self
    }

    /// Enables or disables timing information
    ///
    /// When enabled, TPV reports carry `rtime`, `pps` and `sor`.
    pub fn timing(mut self, enable: bool) -> Self {
        self.inner.timing = Some(enable);
        self
    }

    /// Enables or disables scaled output
    pub fn scaled(mut self, enable: bool) -> Self {
        self.inner.scaled = Some(enable);
        self
    }

    /// Enables or disables splitting of AIS type 24 messages
    pub fn split24(mut self, enable: bool) -> Self {
        self.inner.split24 = Some(enable);
        self
    }

    /// Restricts the stream to one GPS device
    ///
    /// # Arguments
    /// * `device` - Path to the GPS device (e.g., "/dev/ttyUSB0")
    pub fn device<S: AsRef<str>>(mut self, device: S) -> Self {
        self.inner.device = Some(device.as_ref().into());
        self
    }

    fn to_request(&self) -> v3::RequestMessage {
        v3::RequestMessage::Watch(Some(self.inner.clone()))
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions::json()
    }
}

impl From<WatchOptions> for v3::types::Watch {
    fn from(opts: WatchOptions) -> Self {
        opts.inner
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// GPSD address as `host:port`
    pub address: String,

    /// Bound on each TCP connect, initial and reconnect alike
    pub connect_timeout: Duration,

    /// Pause after a stream ends before dialing again
    pub reconnect_delay: Duration,

    /// Watch settings the read loop enables on every connection
    pub watch: WatchOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            watch: WatchOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Create config for a custom address
    pub fn with_address<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}

/// A connected session that is not streaming yet
///
/// Register subscribers here, then call [`Session::start`]. The
/// `*_sync` helpers read straight from the connection and therefore only
/// exist before the read loop owns it.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    reader: LineReader,
    writer: CommandWriter,
    subscribers: Subscribers,
    metrics: Arc<SessionMetrics>,
}

impl Session {
    /// Connects to GPSD at `address` with default settings
    ///
    /// Consumes the banner GPSD sends on every new connection.
    ///
    /// # Example
    /// ```no_run
    /// # use gpsd_session::client::Session;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::connect(gpsd_session::client::DEFAULT_ADDRESS).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect<S: Into<String>>(address: S) -> Result<Self> {
        Self::connect_with(SessionConfig::with_address(address)).await
    }

    /// Connects to GPSD using a full configuration
    pub async fn connect_with(config: SessionConfig) -> Result<Self> {
        let conn = Connection::open(&config.address, config.connect_timeout).await?;
        let (reader, writer) = conn.into_split();
        debug!(address = %config.address, "gpsd session connected");

        Ok(Session {
            config,
            reader,
            writer: CommandWriter::new(writer),
            subscribers: Subscribers::default(),
            metrics: Arc::default(),
        })
    }

    /// Returns the configuration this session was connected with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers `callback` for reports of `class`
    ///
    /// Callbacks of one class run in registration order on the read-loop
    /// task and must not block.
    pub fn subscribe<F>(&mut self, class: ReportClass, callback: F)
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(class, Arc::new(callback));
    }

    /// Registers `callback` for every class subscribed to so far
    ///
    /// This is a snapshot: a class first subscribed to after this call does
    /// not deliver to `callback`. Subscribe to specific classes first.
    pub fn subscribe_all<F>(&mut self, callback: F)
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        self.subscribers.subscribe_all(Arc::new(callback));
    }

    /// Sends `?<name>;` without waiting for a response
    pub async fn send_command(&self, name: &str) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Other(name.into()))
            .await;
    }

    /// Sends `?POLL;`
    pub async fn poll(&self) {
        self.writer.send_best_effort(&v3::RequestMessage::Poll).await;
    }

    /// Sends `?VERSION;`
    pub async fn version(&self) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Version)
            .await;
    }

    /// Sends `?DEVICES;`
    pub async fn devices(&self) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Devices)
            .await;
    }

    /// Sends `?WATCH={...};`, or a bare `?WATCH;` to query the current policy
    pub async fn watch(&self, opts: Option<&WatchOptions>) {
        self.writer.send_best_effort(&watch_request(opts)).await;
    }

    /// Sends `?VERSION;` and returns the next line from GPSD
    pub async fn version_sync(&mut self) -> Result<String> {
        self.request_sync(&v3::RequestMessage::Version).await
    }

    /// Sends `?POLL;` and returns the next line from GPSD
    pub async fn poll_sync(&mut self) -> Result<String> {
        self.request_sync(&v3::RequestMessage::Poll).await
    }

    /// Sends `?WATCH...;` and returns the next line from GPSD
    ///
    /// GPSD answers a WATCH with a DEVICES record followed by a WATCH
    /// record; only the first of them is returned here.
    pub async fn watch_sync(&mut self, opts: Option<&WatchOptions>) -> Result<String> {
        self.request_sync(&watch_request(opts)).await
    }

    /// Sends `request` and reads the next raw line, trailing newline removed
    async fn request_sync(&mut self, request: &v3::RequestMessage) -> Result<String> {
        self.writer.send(request).await?;
        match self.reader.next_line().await? {
            Some(line) => Ok(String::from_utf8_lossy(line).trim_end().to_string()),
            None => Err(GpsdError::ProtocolError(
                "Connection closed by GPSD while awaiting response",
            )),
        }
    }

    /// Closes a session that was never started
    ///
    /// Watch mode may have been enabled through [`Session::watch_sync`], so
    /// a watch-disable command is sent first.
    pub async fn close(self) {
        self.writer
            .send_best_effort(&WatchOptions::disable().to_request())
            .await;
        self.writer.shutdown().await;
        debug!(address = %self.config.address, "gpsd session closed");
    }

    /// Starts streaming on a background task
    ///
    /// Requires a tokio runtime. The returned handle stops the task when
    /// closed or dropped.
    pub fn start(self) -> SessionHandle {
        let cancel = CancellationToken::new();
        let writer = self.writer.clone();
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(self.run(cancel.clone()));

        SessionHandle {
            writer,
            metrics,
            guard: cancel.drop_guard(),
            task,
        }
    }

    /// Runs the read loop on the current task until `cancel` fires
    ///
    /// Each pass enables watch mode, streams until the connection ends,
    /// waits the reconnect delay and dials again. Failures never end the
    /// loop; they are logged and counted in [`SessionMetrics`].
    pub async fn run(self, cancel: CancellationToken) {
        let Session {
            config,
            mut reader,
            writer,
            subscribers,
            metrics,
        } = self;

        info!(
            address = %config.address,
            classes = ?subscribers.classes().collect::<Vec<_>>(),
            "gpsd session started"
        );

        let enable = config.watch.to_request();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = writer.send_best_effort(&enable) => {}
            }
            stream(&mut reader, &subscribers, &metrics, &cancel).await;

            let Some(conn) = redial(&config, &metrics, &cancel).await else {
                break;
            };
            let (new_reader, new_writer) = conn.into_split();
            reader = new_reader;
            writer.replace(new_writer).await;
            metrics.reconnected();
            info!(address = %config.address, "reconnected to gpsd");
        }

        info!(address = %config.address, "gpsd session stopped");
    }
}

/// A running session
///
/// Dropping the handle cancels the read loop without waiting for it; use
/// [`SessionHandle::close`] for an orderly shutdown.
#[derive(Debug)]
pub struct SessionHandle {
    writer: CommandWriter,
    metrics: Arc<SessionMetrics>,
    guard: DropGuard,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    /// Sends `?<name>;` without waiting for a response
    pub async fn send_command(&self, name: &str) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Other(name.into()))
            .await;
    }

    /// Sends `?POLL;`; the response arrives through the subscribers
    pub async fn poll(&self) {
        self.writer.send_best_effort(&v3::RequestMessage::Poll).await;
    }

    /// Sends `?VERSION;`; the response arrives through the subscribers
    pub async fn version(&self) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Version)
            .await;
    }

    /// Sends `?DEVICES;`; the response arrives through the subscribers
    pub async fn devices(&self) {
        self.writer
            .send_best_effort(&v3::RequestMessage::Devices)
            .await;
    }

    /// Sends a WATCH command
    ///
    /// The read loop re-sends the configured watch options after every
    /// reconnect, so changes made here last only for the current connection.
    pub async fn watch(&self, opts: Option<&WatchOptions>) {
        self.writer.send_best_effort(&watch_request(opts)).await;
    }

    /// Snapshot of the read loop's counters
    pub fn metrics(&self) -> SessionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether the read loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops streaming and waits for the read loop to exit
    ///
    /// Cancels the loop, sends a watch-disable command, shuts the socket
    /// down and joins the task. An error means a subscriber panicked.
    ///
    /// Closing consumes the handle, so a session cannot be closed twice:
    ///
    /// ```compile_fail
    /// # async fn example(handle: gpsd_session::client::SessionHandle) {
    /// handle.close().await.ok();
    /// handle.close().await.ok();
    /// # }
    /// ```
    pub async fn close(self) -> Result<()> {
        let SessionHandle {
            writer,
            metrics: _,
            guard,
            task,
        } = self;

        // cancel first so the loop releases the writer if its send is stuck
        guard.disarm().cancel();
        writer
            .send_best_effort(&WatchOptions::disable().to_request())
            .await;
        writer.shutdown().await;

        task.await.map_err(|e| GpsdError::TaskError(Box::new(e)))
    }
}

/// Waits the reconnect delay and dials until a connection succeeds
///
/// Returns `None` once `cancel` fires.
async fn redial(
    config: &SessionConfig,
    metrics: &SessionMetrics,
    cancel: &CancellationToken,
) -> Option<Connection> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }

        let dialed = tokio::select! {
            _ = cancel.cancelled() => return None,
            dialed = Connection::open(&config.address, config.connect_timeout) => dialed,
        };
        match dialed {
            Ok(conn) => return Some(conn),
            Err(e) => {
                metrics.reconnect_failed();
                warn!(
                    address = %config.address,
                    error = %e,
                    retry_in = ?config.reconnect_delay,
                    "reconnect to gpsd failed"
                );
            }
        }
    }
}

fn watch_request(opts: Option<&WatchOptions>) -> v3::RequestMessage {
    match opts {
        Some(opts) => opts.to_request(),
        None => v3::RequestMessage::Watch(None),
    }
}

/// Reads records until the connection ends or `cancel` fires
async fn stream(
    reader: &mut LineReader,
    subscribers: &Subscribers,
    metrics: &SessionMetrics,
    cancel: &CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = reader.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                metrics.line_read();
                dispatch(line, subscribers, metrics);
            }
            Ok(None) => {
                debug!("gpsd closed the stream");
                return;
            }
            Err(e) if is_closed_socket(&e) => {
                debug!(error = %e, "gpsd socket closed");
                return;
            }
            Err(e) => {
                metrics.stream_error();
                warn!(error = %e, "stream reader error (is gpsd running?)");
                return;
            }
        }
    }
}

/// Classifies one record and, if anyone listens, decodes and delivers it
fn dispatch(line: &[u8], subscribers: &Subscribers, metrics: &SessionMetrics) {
    let class = match v3::classify(line) {
        Ok(Some(class)) => class,
        Ok(None) => {
            trace!("skipping record without a decodable class");
            return;
        }
        Err(e) => {
            metrics.classify_failure();
            warn!(error = %e, "failed to parse class type");
            return;
        }
    };

    if !subscribers.contains(class) {
        return;
    }

    metrics.report_decoded();
    match Report::decode(class, line) {
        Ok(report) => metrics.reports_delivered(subscribers.deliver(&report)),
        Err(e) => {
            metrics.decode_failure();
            warn!(%class, error = %e, "failed to decode report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();

        assert_eq!(config.address, "localhost:2947");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.watch, WatchOptions::json());
    }

    #[test]
    fn test_config_with_address() {
        let config = SessionConfig::with_address("gps.local:2947");

        assert_eq!(config.address, "gps.local:2947");
        assert_eq!(config.reconnect_delay, DEFAULT_RECONNECT_DELAY);
    }

    #[test]
    fn test_watch_options_builder() {
        let watch: v3::types::Watch = WatchOptions::json()
            .pps(true)
            .timing(false)
            .device("/dev/ttyACM0")
            .into();

        assert_eq!(watch.enable, Some(true));
        assert_eq!(watch.json, Some(true));
        assert_eq!(watch.pps, Some(true));
        assert_eq!(watch.timing, Some(false));
        assert_eq!(watch.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(watch.nmea, None);
    }

    #[test]
    fn test_watch_request_rendering() {
        use crate::protocol::GpsdJsonRequest;

        assert_eq!(watch_request(None).to_command().unwrap(), "?WATCH;");
        assert_eq!(
            watch_request(Some(&WatchOptions::disable()))
                .to_command()
                .unwrap(),
            r#"?WATCH={"enable":false};"#
        );
        assert_eq!(
            watch_request(Some(&WatchOptions::json().scaled(true).split24(true)))
                .to_command()
                .unwrap(),
            r#"?WATCH={"enable":true,"json":true,"scaled":true,"split24":true};"#
        );
    }

    const BANNER: &[u8] = b"{\"class\":\"VERSION\",\"release\":\"3.25\",\"rev\":\"3.25\",\"proto_major\":3,\"proto_minor\":15}\n";

    async fn serve_banner(listener: tokio::net::TcpListener) -> tokio::net::TcpStream {
        use tokio::io::AsyncWriteExt;

        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(BANNER).await.unwrap();
        socket
    }

    #[tokio::test]
    async fn test_run_stops_while_watch_enable_is_blocked() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(serve_banner(listener));

        let session = Session::connect(address).await.unwrap();
        let _socket = server.await.unwrap();
        let writer = session.writer.clone();
        let held = writer.hold().await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("read loop ignored cancellation")
            .unwrap();
        drop(held);
    }

    #[tokio::test]
    async fn test_redial_retries_until_gpsd_is_back() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let config = SessionConfig {
            reconnect_delay: Duration::from_millis(20),
            ..SessionConfig::with_address(address.to_string())
        };
        let metrics = Arc::new(SessionMetrics::default());
        let cancel = CancellationToken::new();
        let dialer = {
            let metrics = Arc::clone(&metrics);
            let cancel = cancel.clone();
            tokio::spawn(async move { redial(&config, &metrics, &cancel).await.is_some() })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(metrics.snapshot().reconnect_failures >= 2);

        let listener = tokio::net::TcpListener::bind(address).await.unwrap();
        let _socket = serve_banner(listener).await;
        let reconnected = tokio::time::timeout(Duration::from_secs(2), dialer)
            .await
            .expect("redial never connected")
            .unwrap();
        assert!(reconnected);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_redial_gives_up_on_cancel() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = SessionConfig {
            reconnect_delay: Duration::from_millis(20),
            ..SessionConfig::with_address(address)
        };
        let metrics = SessionMetrics::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(redial(&config, &metrics, &cancel).await.is_none());
        assert_eq!(metrics.snapshot().reconnect_failures, 0);
    }

    fn counting_subscribers(class: ReportClass) -> (Subscribers, Arc<Mutex<Vec<Report>>>) {
        let seen: Arc<Mutex<Vec<Report>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut subscribers = Subscribers::default();
        subscribers.subscribe(
            class,
            Arc::new(move |report: &Report| sink.lock().unwrap().push(report.clone())),
        );
        (subscribers, seen)
    }

    #[test]
    fn test_dispatch_skips_classes_without_subscribers() {
        let (subscribers, seen) = counting_subscribers(ReportClass::Tpv);
        let metrics = SessionMetrics::default();

        dispatch(br#"{"class":"SKY","satellites":[]}"#, &subscribers, &metrics);
        dispatch(br#"{"class":"WATCH","enable":true}"#, &subscribers, &metrics);
        dispatch(br#"{"class":"TPV","mode":3}"#, &subscribers, &metrics);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reports_decoded, 1);
        assert_eq!(snapshot.reports_delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_drops_malformed_records() {
        let (subscribers, seen) = counting_subscribers(ReportClass::Tpv);
        let metrics = SessionMetrics::default();

        dispatch(b"\n", &subscribers, &metrics);
        dispatch(b"not json at all\n", &subscribers, &metrics);
        dispatch(br#"{"class":"TPV","lat":"north"}"#, &subscribers, &metrics);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.classify_failures, 2);
        assert_eq!(snapshot.reports_decoded, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.reports_delivered, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_sky_scenario() {
        let (subscribers, seen) = counting_subscribers(ReportClass::Sky);
        let metrics = SessionMetrics::default();

        dispatch(
            br#"{"class":"SKY","satellites":[{"PRN":1,"az":10,"el":5,"ss":30,"used":true},{"PRN":2,"az":20,"el":15,"ss":0,"used":false}]}"#,
            &subscribers,
            &metrics,
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let Report::Sky(sky) = &seen[0] else {
            panic!("expected SKY");
        };
        assert_eq!(sky.satellites.len(), 2);
    }
}
