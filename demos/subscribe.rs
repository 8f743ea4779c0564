use cobalt_stomp::{AckMode, ClientConfig, Connection, Headers, Heartbeat, Hooks};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // This example expects a STOMP broker on localhost:61613 (e.g. ActiveMQ or
    // RabbitMQ with the stomp plugin).
    let config = ClientConfig::new("127.0.0.1", 61613)
        .login("guest")
        .passcode("guest")
        .heartbeat(Heartbeat::new(1000, 1000))
        .reconnect_max_attempts(5)
        .reconnect_timeout(Duration::from_millis(500));

    let hooks = Hooks::new()
        .on_connect(|| println!("connected"))
        .on_disconnect(|graceful| println!("disconnected (graceful: {})", graceful))
        .on_error(|err| eprintln!("{}", err))
        .on_reconnect_exhausted(|attempts| eprintln!("gave up after {} attempts", attempts));

    let conn = Connection::with_observer(config, hooks);

    // Registered before connecting: sent with the handshake and again after
    // every reconnect.
    conn.subscribe("/queue/test", AckMode::Auto, Headers::new(), |frame, body| {
        println!(
            "message {} on {}: {}",
            frame.get_header("message-id").unwrap_or("?"),
            frame.get_header("destination").unwrap_or("?"),
            body.unwrap_or("")
        );
    })
    .await?;

    conn.connect().await?;
    if !conn.state().await?.connected {
        eprintln!("broker not reachable yet, retrying in the background");
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    if let Err(e) = conn
        .send("/queue/test", "hello from cobalt-stomp", Headers::new())
        .await
    {
        eprintln!("send failed: {}", e);
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    conn.disconnect().await?;
    Ok(())
}
