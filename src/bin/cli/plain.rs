use chrono::Local;
use cobalt_stomp::{AckMode, ClientConfig, Connection, Frame, Headers, Heartbeat, Hooks};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::sync::mpsc;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help};
use super::exit_codes;

/// Session events forwarded from the observer hooks to the command loop.
enum SessionEvent {
    Connected,
    Disconnected(bool),
    BrokerError(String),
    Exhausted(u32),
}

/// Run the CLI in plain line mode
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    let config = build_config(cli)?;
    let ack: AckMode = cli
        .ack
        .parse()
        .map_err(|e| (format!("Invalid --ack: {}", e), exit_codes::USAGE_ERROR))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let hooks = {
        let on_connect = event_tx.clone();
        let on_disconnect = event_tx.clone();
        let on_error = event_tx.clone();
        let on_exhausted = event_tx;
        Hooks::new()
            .on_connect(move || {
                let _ = on_connect.send(SessionEvent::Connected);
            })
            .on_disconnect(move |graceful| {
                let _ = on_disconnect.send(SessionEvent::Disconnected(graceful));
            })
            .on_error(move |err| {
                let _ = on_error.send(SessionEvent::BrokerError(err.to_string()));
            })
            .on_reconnect_exhausted(move |attempts| {
                let _ = on_exhausted.send(SessionEvent::Exhausted(attempts));
            })
    };

    let conn = Connection::with_observer(config, hooks);

    for dest in &cli.subscribe {
        subscribe_destination(&conn, dest, ack).await?;
    }

    println!("Connecting to {}...", cli.address);
    conn.connect()
        .await
        .map_err(|e| (format!("Connection failed: {}", e), exit_codes::NETWORK_ERROR))?;

    // Channel for subscription requests from the command parser
    let (sub_tx, mut sub_rx) = mpsc::channel::<String>(16);
    let conn_sub = conn.clone();
    tokio::spawn(async move {
        while let Some(dest) = sub_rx.recv().await {
            if let Err((msg, _)) = subscribe_destination(&conn_sub, &dest, ack).await {
                eprintln!("{}", msg);
            }
        }
    });

    // Channel to receive user commands from stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();
    prompt();

    loop {
        tokio::select! {
            line = cmd_rx.recv() => {
                let Some(line) = line else { break };
                match execute_command(&line, &conn, &sub_tx, !cli.no_content_length).await {
                    CommandResult::Ok => {}
                    CommandResult::Quit => break,
                    CommandResult::Info(msg) => println!("{}", msg),
                    CommandResult::Error(msg) => eprintln!("{}", msg),
                }
                prompt();
            }
            event = event_rx.recv() => match event {
                Some(SessionEvent::Connected) => {
                    println!("\n[{}] Connected to {}.", timestamp(), cli.address);
                    prompt();
                }
                Some(SessionEvent::Disconnected(false)) => {
                    eprintln!("\n[{}] Connection lost, reconnecting...", timestamp());
                    prompt();
                }
                Some(SessionEvent::Disconnected(true)) => {}
                Some(SessionEvent::BrokerError(msg)) => {
                    eprintln!("\n[{}] [BROKER ERROR] {}", timestamp(), msg);
                    prompt();
                }
                Some(SessionEvent::Exhausted(attempts)) => {
                    return Err((
                        format!(
                            "Giving up on {} after {} reconnect attempts",
                            cli.address, attempts
                        ),
                        exit_codes::NETWORK_ERROR,
                    ));
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    println!("Disconnecting...");
    let _ = conn.disconnect().await;
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig, (String, u8)> {
    let (host, port) = parse_address(&cli.address)
        .ok_or_else(|| (format!("Invalid address: {}", cli.address), exit_codes::USAGE_ERROR))?;
    let (send_ms, receive_ms) = cobalt_stomp::parse_heartbeat_header(&cli.heartbeat);
    let heartbeat = Heartbeat::new(
        u32::try_from(send_ms).unwrap_or(u32::MAX),
        u32::try_from(receive_ms).unwrap_or(u32::MAX),
    );

    Ok(ClientConfig::new(host, port)
        .login(&cli.login)
        .passcode(&cli.passcode)
        .heartbeat(heartbeat)
        .reconnect_max_attempts(cli.reconnect_attempts)
        .reconnect_timeout(Duration::from_millis(cli.reconnect_delay)))
}

fn parse_address(address: &str) -> Option<(String, u16)> {
    match address.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((address.to_string(), cobalt_stomp::DEFAULT_PORT)),
    }
}

/// Register a subscription that prints each incoming message
async fn subscribe_destination(
    conn: &Connection,
    dest: &str,
    ack: AckMode,
) -> Result<(), (String, u8)> {
    let label = dest.to_string();
    let id = conn
        .subscribe(dest, ack, Headers::new(), move |frame, body| {
            print_message(&label, frame, body);
        })
        .await
        .map_err(|e| {
            (
                format!("Failed to subscribe to '{}': {}", dest, e),
                exit_codes::NETWORK_ERROR,
            )
        })?;

    println!("Subscribed to: {} (id {})", dest, id);
    Ok(())
}

fn print_message(dest: &str, frame: &Frame, body: Option<&str>) {
    println!("\n[{}] [{}] MESSAGE received:", timestamp(), dest);
    for (k, v) in &frame.headers {
        println!("  {}: {}", k, v);
    }
    if let Some(body) = body {
        println!("  Body: {}", body);
    }
    prompt();
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
