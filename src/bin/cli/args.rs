use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP 1.1 client CLI")]
pub struct Cli {
    /// STOMP broker address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:61613")]
    pub address: String,

    /// Login username
    #[arg(short, long, default_value = "guest")]
    pub login: String,

    /// Passcode
    #[arg(short, long, default_value = "guest")]
    pub passcode: String,

    /// Heartbeat settings (client-send,client-receive in ms)
    #[arg(long, default_value = "10000,10000")]
    pub heartbeat: String,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Ack mode for subscriptions (auto, client, client-individual)
    #[arg(long, default_value = "auto")]
    pub ack: String,

    /// Reconnect attempts before giving up; negative retries forever
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub reconnect_attempts: i64,

    /// Delay between reconnect attempts in ms
    #[arg(long, default_value_t = 1000)]
    pub reconnect_delay: u64,

    /// Leave out content-length on SEND (JMS text messages)
    #[arg(long)]
    pub no_content_length: bool,
}
