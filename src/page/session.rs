use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dom::dom_model::Dom;
use crate::dom::snapshot::DomSnapshot;
use crate::error::SessionError;
use crate::page::driver::{LoadSignal, PageDriver, PageFactory, SyntheticEvent, TargetRef};

// ============================================================================
// Wire format
// ============================================================================
//
// The driver script reads one JSON request per line on stdin and writes one
// JSON response per line on stdout. Every request carries a unique `id`; the
// matching response echoes it. Step-scoped requests also carry `step_id`.
//
//   -> {"id":"7","step_id":"s1","cmd":"dispatch","handle":"h42","events":[{"type":"click","bubbles":true}]}
//   <- {"id":"7","ok":true}
//
// On startup the driver writes `{"ok":true,"ready":true}` before accepting
// requests. Failed responses set `error` and, for element problems,
// `error_kind` to `stale` or `script`.

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriverCommand {
    /// Open a fresh browsing context with the closed-shadow hook installed
    /// before any page script.
    Open { url: String, install_shadow_hook: bool },
    WaitLoad { timeout_ms: u64 },
    Snapshot,
    Dispatch { handle: String, events: Vec<SyntheticEvent> },
    SetValue { handle: String, value: String },
    Close,
    Quit,
}

impl DriverCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DriverCommand::Open { .. } => "open",
            DriverCommand::WaitLoad { .. } => "wait_load",
            DriverCommand::Snapshot => "snapshot",
            DriverCommand::Dispatch { .. } => "dispatch",
            DriverCommand::SetValue { .. } => "set_value",
            DriverCommand::Close => "close",
            DriverCommand::Quit => "quit",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DriverRequest<'a> {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<&'a str>,
    #[serde(flatten)]
    pub command: &'a DriverCommand,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub loaded: Option<bool>,
    #[serde(default)]
    pub ready: Option<bool>,
}

impl DriverResponse {
    fn into_result(self, command: &str) -> Result<DriverResponse, SessionError> {
        if self.ok {
            return Ok(self);
        }
        let error = self.error.clone().unwrap_or_else(|| "unknown error".into());
        Err(match self.error_kind.as_deref() {
            Some("stale") => SessionError::StaleElement(error),
            Some("script") => SessionError::Script(error),
            _ => SessionError::Protocol {
                command: command.into(),
                error,
            },
        })
    }
}

// ============================================================================
// Session configuration
// ============================================================================

fn default_node() -> String {
    "node".into()
}

fn default_script() -> String {
    "driver/replay_driver.js".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_node")]
    pub node: String,

    #[serde(default = "default_script")]
    pub script: String,

    /// How long to wait for any single response.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node: default_node(),
            script: default_script(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

// ============================================================================
// Browser session
// ============================================================================

/// Extra time granted to a `wait_load` reply beyond the load timeout itself.
const LOAD_REPLY_MARGIN: Duration = Duration::from_secs(2);

/// Stack for the stdout reader; snapshots of deep pages nest far past the
/// parser's default depth.
const READER_STACK_BYTES: usize = 64 * 1024 * 1024;

/// A driver line that could not be read as a response. `id` is set when the
/// line was valid JSON carrying a top-level id.
#[derive(Debug, Clone, PartialEq)]
struct UnreadableLine {
    id: Option<String>,
    message: String,
}

type ResponseLine = Result<DriverResponse, UnreadableLine>;

#[derive(Deserialize)]
struct ResponseId {
    #[serde(default)]
    id: Option<String>,
}

fn parse_response_line(line: &str) -> ResponseLine {
    let mut de = serde_json::Deserializer::from_str(line);
    de.disable_recursion_limit();
    DriverResponse::deserialize(&mut de)
        .and_then(|resp| de.end().map(|_| resp))
        .map_err(|e| UnreadableLine {
            id: response_id(line),
            message: format!("unparseable driver output: {}", e),
        })
}

fn response_id(line: &str) -> Option<String> {
    let mut de = serde_json::Deserializer::from_str(line);
    de.disable_recursion_limit();
    ResponseId::deserialize(&mut de).ok()?.id
}

/// A persistent driver subprocess speaking NDJSON.
///
/// A background thread reads stdout and forwards parsed responses into a
/// channel, so every request can be awaited with a timeout. Responses whose
/// id does not match the outstanding request are discarded.
pub struct BrowserSession {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<ResponseLine>,
    request_timeout: Duration,
    next_id: u64,
    quit: bool,
}

impl BrowserSession {
    /// Spawn the driver script and wait for its ready signal.
    pub fn launch(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut child = Command::new(&config.node)
            .arg(&config.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SessionError::Spawn {
                script: config.script.clone(),
                message: e.to_string(),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Io("failed to capture driver stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Io("failed to capture driver stdout".into()))?;

        let (tx, rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("replay-driver-stdout".into())
            .stack_size(READER_STACK_BYTES)
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    let parsed = match line {
                        Ok(l) if l.trim().is_empty() => continue,
                        Ok(l) => parse_response_line(l.trim()),
                        Err(e) => Err(UnreadableLine {
                            id: None,
                            message: format!("driver stdout: {}", e),
                        }),
                    };
                    if tx.send(parsed).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = reader {
            let _ = child.kill();
            return Err(SessionError::Io(format!("failed to start driver reader: {}", e)));
        }

        let mut session = BrowserSession {
            child,
            stdin,
            responses: rx,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            next_id: 0,
            quit: false,
        };
        session.await_ready()?;
        Ok(session)
    }

    fn await_ready(&mut self) -> Result<(), SessionError> {
        let waited_ms = self.request_timeout.as_millis() as u64;
        match self.responses.recv_timeout(self.request_timeout) {
            Ok(Ok(r)) if r.ok && r.ready == Some(true) => Ok(()),
            Ok(Ok(_)) => Err(SessionError::Protocol {
                command: "launch".into(),
                error: "did not receive ready signal from driver".into(),
            }),
            Ok(Err(e)) => Err(SessionError::Io(e.message)),
            Err(RecvTimeoutError::Timeout) => Err(SessionError::Timeout {
                command: "launch".into(),
                request_id: "ready".into(),
                waited_ms,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Closed),
        }
    }

    /// Send one request and wait for the response carrying the same id.
    fn request(
        &mut self,
        command: &DriverCommand,
        step_id: Option<&str>,
    ) -> Result<DriverResponse, SessionError> {
        self.request_within(command, step_id, self.request_timeout)
    }

    /// Like `request`, with an explicit reply deadline.
    fn request_within(
        &mut self,
        command: &DriverCommand,
        step_id: Option<&str>,
        deadline: Duration,
    ) -> Result<DriverResponse, SessionError> {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let request = DriverRequest {
            id: id.clone(),
            step_id,
            command,
        };
        let json = serde_json::to_string(&request)
            .map_err(|e| SessionError::Io(format!("failed to encode request: {}", e)))?;

        writeln!(self.stdin, "{}", json)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| SessionError::Io(format!("failed to write to driver: {}", e)))?;

        let started = Instant::now();
        loop {
            let remaining = deadline.saturating_sub(started.elapsed());
            match self.responses.recv_timeout(remaining) {
                Ok(Ok(resp)) if resp.id.as_deref() == Some(id.as_str()) => {
                    return resp.into_result(command.name());
                }
                Ok(Ok(resp)) => {
                    debug!(expected = %id, got = ?resp.id, "discarding uncorrelated driver response");
                }
                Ok(Err(bad)) if bad.id.as_deref() == Some(id.as_str()) => {
                    return Err(match command {
                        DriverCommand::Snapshot => SessionError::Snapshot(bad.message),
                        _ => SessionError::Protocol {
                            command: command.name().into(),
                            error: bad.message,
                        },
                    });
                }
                Ok(Err(bad)) => warn!(error = %bad.message, "driver emitted an unreadable line"),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SessionError::Timeout {
                        command: command.name().into(),
                        request_id: step_id.map(str::to_string).unwrap_or(id),
                        waited_ms: deadline.as_millis() as u64,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Closed),
            }
        }
    }

    /// Best-effort shutdown of the driver process.
    pub fn quit(&mut self) {
        if self.quit {
            return;
        }
        self.quit = true;
        let _ = self.request(&DriverCommand::Quit, None);
        let _ = self.child.wait();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.quit();
    }
}

impl PageFactory for BrowserSession {
    fn open_page(&mut self, url: &str) -> Result<Box<dyn PageDriver + '_>, SessionError> {
        self.request(
            &DriverCommand::Open {
                url: url.to_string(),
                install_shadow_hook: true,
            },
            None,
        )?;
        Ok(Box::new(BrowserPage {
            session: self,
            closed: false,
        }))
    }
}

// ============================================================================
// Browser page
// ============================================================================

/// One browsing context of a `BrowserSession`. Closed on drop if the caller
/// did not close it.
pub struct BrowserPage<'a> {
    session: &'a mut BrowserSession,
    closed: bool,
}

impl BrowserPage<'_> {
    fn live(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn handle_of(target: &TargetRef) -> Result<String, SessionError> {
        target
            .handle
            .clone()
            .ok_or_else(|| SessionError::StaleElement(format!("node {} has no driver handle", target.node.0)))
    }
}

impl PageDriver for BrowserPage<'_> {
    fn wait_for_load(&mut self, timeout: Duration) -> Result<LoadSignal, SessionError> {
        self.live()?;
        // The driver itself waits up to `timeout`; allow its reply to arrive after that.
        let deadline = self.session.request_timeout.max(timeout + LOAD_REPLY_MARGIN);
        let resp = self.session.request_within(
            &DriverCommand::WaitLoad {
                timeout_ms: timeout.as_millis() as u64,
            },
            None,
            deadline,
        )?;
        match resp.loaded {
            Some(true) => Ok(LoadSignal::Loaded),
            Some(false) => Err(SessionError::Timeout {
                command: "wait_load".into(),
                request_id: resp.id.unwrap_or_default(),
                waited_ms: timeout.as_millis() as u64,
            }),
            None => Ok(LoadSignal::Unsupported),
        }
    }

    fn snapshot(&mut self) -> Result<Dom, SessionError> {
        self.live()?;
        let resp = self.session.request(&DriverCommand::Snapshot, None)?;
        let data = resp
            .data
            .ok_or_else(|| SessionError::Snapshot("snapshot response carried no data".into()))?;
        Ok(DomSnapshot::from_json(data)?.into_dom())
    }

    fn dispatch(&mut self, target: &TargetRef, events: &[SyntheticEvent]) -> Result<(), SessionError> {
        self.live()?;
        let command = DriverCommand::Dispatch {
            handle: Self::handle_of(target)?,
            events: events.to_vec(),
        };
        self.session.request(&command, Some(&target.step_id))?;
        Ok(())
    }

    fn set_native_value(&mut self, target: &TargetRef, value: &str) -> Result<(), SessionError> {
        self.live()?;
        let command = DriverCommand::SetValue {
            handle: Self::handle_of(target)?,
            value: value.to_string(),
        };
        self.session.request(&command, Some(&target.step_id))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.request(&DriverCommand::Close, None)?;
        Ok(())
    }
}

impl Drop for BrowserPage<'_> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}
