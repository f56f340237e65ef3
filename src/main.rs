use std::{error::Error, time::Duration};

use clap::Parser;
use log::{error, info, LevelFilter, Metadata, Record};
use sourcon::{Client, Config};

struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Run rcon commands against a Source (or Minecraft) server.
#[derive(Parser, Debug)]
#[command(name = "sourcon", version)]
struct Args {
    /// Server host name or address
    #[arg(long, env = "RCON_HOST", default_value = "localhost")]
    host: String,

    /// Server rcon port
    #[arg(short, long, env = "RCON_PORT", default_value_t = 25575)]
    port: u16,

    /// Rcon password
    #[arg(long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Command timeout in milliseconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Connect timeout in milliseconds, defaults to the command timeout
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Commands to run, one after the other
    #[arg(required = true)]
    commands: Vec<String>,
}

impl Args {
    fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::new(self.host.clone(), self.port, self.password.clone());
        config.command_timeout = self.timeout.map(Duration::from_millis);
        config.connect_timeout = self.connect_timeout.map(Duration::from_millis);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _ = log::set_logger(&SimpleLogger).map(|()| log::set_max_level(args.level()));

    let mut client = Client::new(args.config());
    client.connect().await?;
    info!("connected to {}", client.config().addr());

    let mut outcome = Ok(());
    for command in &args.commands {
        match client.send(command).await {
            Ok(response) => print!("{}", response),
            Err(err) => {
                error!("{:?} failed: {}", command, err);
                outcome = Err(err.into());
                break;
            }
        }
    }

    client.disconnect().await;
    info!("bye");
    outcome
}
