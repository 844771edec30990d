//! `murmur` - plays reference call scenarios between in-process participants
//!
//! Every participant runs its own call coordinator; they share one
//! in-memory document store and use loopback media, so a full
//! offer/answer exchange happens without any network.

mod participant;
mod scenarios;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use murmur_call_core::CallConfig;
use murmur_infra_common::config::load_config_file;
use murmur_infra_common::logging::{LoggingConfig, log_welcome, parse_log_level, setup_logging};

#[derive(Parser, Debug)]
#[command(name = "murmur", version, about = "Peer-to-peer call signaling scenarios")]
struct Cli {
    /// Call settings (TOML or JSON) shared by every participant
    #[arg(short, long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one call scenario end to end
    Run {
        #[arg(value_enum)]
        scenario: Scenario,

        /// How long a connected call is held before hanging up
        #[arg(long, default_value_t = 300)]
        hold_ms: u64,

        /// Place an audio-only call
        #[arg(long)]
        audio: bool,
    },
    /// Print the effective call settings
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Scenario {
    /// Alice calls Bob, Bob answers, Alice hangs up
    Answer,
    /// Alice calls Bob while Bob is talking to Carol
    Busy,
    /// Alice calls Bob, Bob declines
    Decline,
}

impl Cli {
    fn call_template(&self) -> anyhow::Result<CallConfig> {
        let template = match &self.config {
            Some(path) => load_config_file::<CallConfig>(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CallConfig::default(),
        };
        Ok(template.apply_env()?)
    }

    async fn execute(self) -> anyhow::Result<()> {
        let level = parse_log_level(&self.log_level)?;
        let mut logging = LoggingConfig::new(level, "murmur");
        if self.json {
            logging = logging.with_json();
        }
        setup_logging(logging)?;
        log_welcome("murmur", env!("CARGO_PKG_VERSION"));

        let template = self.call_template()?;
        match self.command {
            Command::Run { scenario, hold_ms, audio } => {
                let options = scenarios::Options {
                    hold: std::time::Duration::from_millis(hold_ms),
                    audio_only: audio,
                };
                scenarios::run(scenario, &template, &options).await
            }
            Command::Config => {
                println!("calls collection : {}", template.calls_collection);
                println!("ring timeout     : {}s", template.ring_timeout_secs);
                println!("duration tick    : {}ms", template.duration_tick_ms);
                println!("event capacity   : {}", template.event_channel_capacity);
                for server in &template.ice_servers {
                    println!("ice server       : {}", server.urls.join(", "));
                }
                Ok(())
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
