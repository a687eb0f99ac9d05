//! Loopback consent flow for the initial authorization grant
//!
//! A transient listener on the redirect port receives the provider's
//! redirect on `/auth/callback`. It runs on its own thread and reports back
//! over a one-shot channel; the caller waits at most `timeout` for it. The
//! listener is stopped and dropped on every exit path.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use url::Url;
use uuid::Uuid;

use super::auth::{Credential, OAuthClient, OAuthEndpoints};
use crate::error::{Error, Result};

/// Callback path registered as the redirect target
pub const CALLBACK_PATH: &str = "/auth/callback";

const CLOSE_TAB_PAGE: &str = "<html><body><script>window.close();</script></body></html>";

/// Authorization code as delivered to the callback; discarded once exchanged
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
    pub state: String,
}

type BrowserLauncher = Box<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Runs the consent flow: listen, open the browser, wait, exchange
pub struct LoopbackConsent<'a> {
    oauth: &'a OAuthClient,
    timeout: Duration,
    launcher: BrowserLauncher,
}

impl<'a> LoopbackConsent<'a> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    const POLL_INTERVAL: Duration = Duration::from_millis(25);

    pub fn new(oauth: &'a OAuthClient) -> Self {
        Self {
            oauth,
            timeout: Self::DEFAULT_TIMEOUT,
            launcher: Box::new(|url: &str| open::that(url)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the default-browser launcher
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Box::new(launcher);
        self
    }

    /// Obtain a credential through user consent
    pub fn acquire(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_port: u16,
    ) -> Result<Credential> {
        let grant = self.wait_for_grant(client_id, redirect_port)?;
        info!("Exchanging authorization code for tokens");
        self.oauth
            .exchange_code(client_id, client_secret, &grant.code, &grant.redirect_uri)
    }

    /// Listen on `redirect_port`, open the consent page, and wait for the code
    pub fn wait_for_grant(
        &self,
        client_id: &str,
        redirect_port: u16,
    ) -> Result<AuthorizationGrant> {
        let listener = TcpListener::bind(("127.0.0.1", redirect_port)).map_err(|e| {
            Error::Network(format!(
                "could not bind callback listener on port {}: {}",
                redirect_port, e
            ))
        })?;
        let port = listener.local_addr()?.port();
        listener.set_nonblocking(true)?;

        let redirect_uri = format!("http://localhost:{}{}", port, CALLBACK_PATH);
        let state = random_state();
        let consent_url = consent_url(self.oauth.endpoints(), client_id, &redirect_uri, &state)?;

        let (tx, rx) = mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = ListenerGuard {
            stop: Arc::clone(&stop),
            handle: Some(spawn_callback_listener(listener, state.clone(), tx, stop)),
        };

        info!("Opening browser for Gmail consent");
        if let Err(e) = (self.launcher)(consent_url.as_str()) {
            warn!("Failed to open browser: {}", e);
            eprintln!("Open this URL to authorize access: {}", consent_url);
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(code)) => Ok(AuthorizationGrant {
                code,
                redirect_uri,
                state,
            }),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(format!(
                "no OAuth callback within {}s",
                self.timeout.as_secs_f32()
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Auth("callback listener stopped unexpectedly".to_string()))
            }
        }
    }
}

/// Initial consent with the default browser launcher and timeout
pub fn acquire_initial_grant(
    oauth: &OAuthClient,
    client_id: &str,
    client_secret: &str,
    redirect_port: u16,
) -> Result<Credential> {
    LoopbackConsent::new(oauth).acquire(client_id, client_secret, redirect_port)
}

/// Stops the listener thread and waits for it, releasing the port
struct ListenerGuard {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

enum CallbackOutcome {
    /// Not the callback (favicon, probes); keep waiting
    Ignored,
    Done(Result<String>),
}

fn spawn_callback_listener(
    listener: TcpListener,
    expected_state: String,
    tx: SyncSender<Result<String>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => match handle_connection(stream, &expected_state) {
                    CallbackOutcome::Ignored => continue,
                    CallbackOutcome::Done(result) => {
                        let _ = tx.send(result);
                        return;
                    }
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(LoopbackConsent::POLL_INTERVAL)
                }
                Err(e) => {
                    let err = Error::Network(format!("callback listener failed: {}", e));
                    let _ = tx.send(Err(err));
                    return;
                }
            }
        }
    })
}

fn handle_connection(mut stream: TcpStream, expected_state: &str) -> CallbackOutcome {
    // Accepted sockets inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&stream);
        if reader.read_line(&mut request_line).is_err() {
            return CallbackOutcome::Ignored;
        }
        // Drain headers so closing the socket doesn't reset the browser
        let mut line = String::new();
        while reader.read_line(&mut line).is_ok_and(|n| n > 0) && !line.trim().is_empty() {
            line.clear();
        }
    }

    // Format: GET /auth/callback?code=...&state=... HTTP/1.1
    let Some(target) = request_line.split_whitespace().nth(1) else {
        respond(&mut stream, "400 Bad Request", "Malformed request");
        return CallbackOutcome::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        respond(&mut stream, "400 Bad Request", "Malformed request");
        return CallbackOutcome::Ignored;
    };

    if url.path() != CALLBACK_PATH {
        warn!("Ignoring request to unexpected path {}", url.path());
        respond(&mut stream, "404 Not Found", "Not found");
        return CallbackOutcome::Ignored;
    }

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        respond(&mut stream, "400 Bad Request", "Authorization was denied.");
        return CallbackOutcome::Done(Err(Error::Auth(format!(
            "provider returned error: {}",
            error
        ))));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        respond(&mut stream, "400 Bad Request", "State mismatch.");
        return CallbackOutcome::Done(Err(Error::Auth("callback state does not match".to_string())));
    }

    match params.get("code").filter(|c| !c.is_empty()) {
        Some(code) => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                CLOSE_TAB_PAGE.len(),
                CLOSE_TAB_PAGE
            );
            let _ = stream.write_all(response.as_bytes());
            CallbackOutcome::Done(Ok(code.clone()))
        }
        None => {
            respond(&mut stream, "400 Bad Request", "missing code parameter");
            CallbackOutcome::Done(Err(Error::Auth("missing code parameter".to_string())))
        }
    }
}

fn respond(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!("<html><body><h1>{}</h1></body></html>", message);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn consent_url(
    endpoints: &OAuthEndpoints,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<Url> {
    Url::parse_with_params(
        &endpoints.auth_url,
        [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", OAuthEndpoints::GMAIL_MODIFY_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid auth URL '{}': {}", endpoints.auth_url, e)))
}

/// Unguessable state nonce (random v4 UUID, 32 hex chars)
fn random_state() -> String {
    Uuid::new_v4().simple().to_string()
}
