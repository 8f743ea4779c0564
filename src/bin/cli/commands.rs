use cobalt_stomp::{Connection, Headers};
use tokio::sync::mpsc;

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command requests exit
    Quit,
    /// Informational output for the user
    Info(String),
    /// Error executing command
    Error(String),
}

/// Parse and execute a command
pub async fn execute_command(
    line: &str,
    conn: &Connection,
    sub_tx: &mpsc::Sender<String>,
    send_content_length: bool,
) -> CommandResult {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return CommandResult::Ok;
    }

    match parts[0] {
        "quit" | "exit" | "q" => CommandResult::Quit,

        "send" => {
            if parts.len() < 3 {
                return CommandResult::Error("Usage: send <destination> <message>".to_string());
            }
            let mut headers = Headers::new();
            headers.insert("content-type".to_string(), "text/plain".to_string());
            match conn
                .send_with_options(parts[1], parts[2], headers, send_content_length)
                .await
            {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("Send error: {}", e)),
            }
        }

        "sub" | "subscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: sub <destination>".to_string());
            }
            if sub_tx.send(parts[1].to_string()).await.is_err() {
                return CommandResult::Error("Failed to request subscription".to_string());
            }
            CommandResult::Ok
        }

        "state" => match conn.state().await {
            Ok(state) => {
                let heartbeat = state
                    .heartbeat_interval
                    .map(|d| format!("{} ms", d.as_millis()))
                    .unwrap_or_else(|| "off".to_string());
                CommandResult::Info(format!(
                    "phase: {:?}, reconnect attempts: {}, heartbeat: {}",
                    state.phase, state.reconnect_attempts, heartbeat
                ))
            }
            Err(e) => CommandResult::Error(format!("State error: {}", e)),
        },

        "about" => {
            print_about();
            CommandResult::Ok
        }

        "help" | "?" => {
            print_help();
            CommandResult::Ok
        }

        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type 'help' for commands.",
            parts[0]
        )),
    }
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>  - Send a message");
    println!("  sub <destination>             - Subscribe to a destination");
    println!("  state                         - Show connection state");
    println!("  about                         - Show version and license");
    println!("  quit                          - Disconnect and exit");
}

/// Print about information
pub fn print_about() {
    println!();
    println!("cobalt-stomp v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Licensed under the MIT License.");
    println!();
}
