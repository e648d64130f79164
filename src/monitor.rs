//! Out-of-band monitor plane (spec §4.G, component I).
//!
//! Grounded on `examples/original_source/src/helpers/monitor.c` for the
//! one-shot accept/respond/close shape, and on the teacher's `src/api.rs`
//! accept-loop structure (one task per connection, no shared mutable state
//! beyond what's behind `AppState`) translated from an axum HTTP surface to
//! a raw line-oriented TCP protocol per spec.md §6.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::AppState;

const MAX_COMMAND_LEN: usize = 1024;
const MAX_RESPONSE_LEN: usize = 8 * 1024;

pub async fn serve(listener: TcpListener, app: Arc<AppState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("monitor accept failed: {e}");
                continue;
            }
        };

        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &app).await {
                log::debug!("monitor connection from {peer} ended: {e}");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, app: &AppState) -> std::io::Result<()> {
    // A connection closed before sending a line still gets the metrics
    // snapshot, same as an explicit empty line (spec §6: "A connection with
    // no line receives a metrics dump and is closed").
    let response = match read_command_line(&mut stream).await? {
        Some(line) if line.is_empty() => app.metrics.render(),
        Some(line) => dispatch(&line, app),
        None => app.metrics.render(),
    };

    let response = cap_response(response);
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Reads up to one LF-terminated line (CR tolerated), or `Ok(None)` if the
/// peer closed without sending anything. A line over `MAX_COMMAND_LEN`
/// produces the spec's `ERROR: command too long` response, a sentinel
/// handled by the caller via a dedicated `Err` string, not as `io::Error`.
async fn read_command_line(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut raw = Vec::with_capacity(256);
    let mut byte = [0u8; 1];

    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return if raw.is_empty() { Ok(None) } else { Ok(Some(String::new())) };
        }

        if byte[0] == b'\n' {
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            return Ok(Some(String::from_utf8_lossy(&raw).into_owned()));
        }

        raw.push(byte[0]);
        if raw.len() > MAX_COMMAND_LEN {
            return Ok(Some("\0COMMAND_TOO_LONG".to_string()));
        }
    }
}

fn cap_response(mut response: String) -> String {
    if response.len() > MAX_RESPONSE_LEN {
        response.truncate(MAX_RESPONSE_LEN - "...more\n".len());
        response.push_str("...more\n");
    }
    response
}

fn dispatch(line: &str, app: &AppState) -> String {
    if line == "\0COMMAND_TOO_LONG" {
        return "ERROR: command too long\n".to_string();
    }

    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return app.metrics.render();
    };

    match command.to_ascii_uppercase().as_str() {
        "RESET" => {
            app.metrics.reset();
            "OK: metrics reset\n".to_string()
        }
        "ADDUSER" => {
            let name = parts.next();
            let password = parts.next();
            match (name, password) {
                (Some(name), Some(password)) => {
                    match app.users.add(name.to_string(), password.to_string()) {
                        Ok(()) => "OK: user added\n".to_string(),
                        Err(crate::users::AddUserError::BlankName) => {
                            "ERROR: invalid username\n".to_string()
                        }
                        Err(crate::users::AddUserError::Exists)
                        | Err(crate::users::AddUserError::Full) => {
                            "ERROR: user exists or table full\n".to_string()
                        }
                    }
                }
                _ => "ERROR: invalid username\n".to_string(),
            }
        }
        "DELUSER" => match parts.next() {
            Some(name) if app.users.remove(name) => "OK: user removed\n".to_string(),
            Some(_) => "ERROR: user not found\n".to_string(),
            None => "ERROR: unknown command\n".to_string(),
        },
        "LISTUSERS" => {
            let names = app.users.names();
            let mut out = format!("OK: {} users\n", names.len());
            for name in names {
                out.push_str(&name);
                out.push('\n');
            }
            out
        }
        "SNIFF" => {
            let protocol = parts.next().map(str::to_ascii_lowercase);
            let state = parts.next().map(str::to_ascii_lowercase);
            match (protocol.as_deref(), state.as_deref()) {
                (Some("pop3"), Some(state)) => match parse_toggle(state) {
                    Some(on) => {
                        app.sniff_pop3.store(on, Ordering::Relaxed);
                        format!("OK: sniffing pop3 {}\n", if on { "enabled" } else { "disabled" })
                    }
                    None => "ERROR: unknown command\n".to_string(),
                },
                (Some("http"), Some(state)) => match parse_toggle(state) {
                    Some(on) => {
                        app.sniff_http.store(on, Ordering::Relaxed);
                        format!("OK: sniffing http {}\n", if on { "enabled" } else { "disabled" })
                    }
                    None => "ERROR: unknown command\n".to_string(),
                },
                _ => "ERROR: unknown protocol\n".to_string(),
            }
        }
        _ => "ERROR: unknown command\n".to_string(),
    }
}

fn parse_toggle(state: &str) -> Option<bool> {
    match state {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metrics::Metrics;
    use crate::resolver::ResolverHandle;
    use crate::users::UserTable;
    use std::sync::atomic::AtomicBool;

    fn test_app() -> AppState {
        AppState {
            config: toml::from_str::<Config>("").unwrap(),
            users: UserTable::new(8),
            metrics: Arc::new(Metrics::default()),
            sniff_pop3: AtomicBool::new(false),
            sniff_http: AtomicBool::new(false),
            resolver: ResolverHandle::spawn(1),
        }
    }

    #[tokio::test]
    async fn reset_replies_ok_and_clears_metrics() {
        let app = test_app();
        app.metrics.session_opened();
        assert_eq!(dispatch("RESET", &app), "OK: metrics reset\n");
        assert_eq!(
            app.metrics
                .total_connections
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn adduser_twice_first_succeeds_second_fails() {
        let app = test_app();
        assert_eq!(dispatch("ADDUSER bob secret", &app), "OK: user added\n");
        assert_eq!(
            dispatch("ADDUSER bob secret", &app),
            "ERROR: user exists or table full\n"
        );
    }

    #[tokio::test]
    async fn adduser_blank_name_is_rejected() {
        let app = test_app();
        assert_eq!(dispatch("ADDUSER", &app), "ERROR: invalid username\n");
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let app = test_app();
        assert_eq!(dispatch("BOGUS", &app), "ERROR: unknown command\n");
    }

    #[tokio::test]
    async fn listusers_reports_count_and_names() {
        let app = test_app();
        app.users.add("alice".into(), "pw".into()).unwrap();
        assert_eq!(dispatch("LISTUSERS", &app), "OK: 1 users\nalice\n");
    }

    #[tokio::test]
    async fn deluser_removes_existing_user_only() {
        let app = test_app();
        app.users.add("alice".into(), "pw".into()).unwrap();
        assert_eq!(dispatch("DELUSER alice", &app), "OK: user removed\n");
        assert_eq!(dispatch("DELUSER alice", &app), "ERROR: user not found\n");
    }

    #[tokio::test]
    async fn sniff_toggle_updates_flag() {
        let app = test_app();
        assert_eq!(
            dispatch("SNIFF pop3 on", &app),
            "OK: sniffing pop3 enabled\n"
        );
        assert!(app.sniff_pop3.load(std::sync::atomic::Ordering::Relaxed));
        assert_eq!(dispatch("SNIFF carrier on", &app), "ERROR: unknown protocol\n");
    }

    #[tokio::test]
    async fn command_too_long_sentinel_is_reported() {
        let app = test_app();
        assert_eq!(
            dispatch("\0COMMAND_TOO_LONG", &app),
            "ERROR: command too long\n"
        );
    }
}
