//! CLI for vitalwatch: wearable fall detection and vitals telemetry.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vitalwatch")]
#[command(about = "vitalwatch: fall detection and vitals telemetry for a wrist-worn device")]
#[command(version = vitalwatch_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent and feed it sensor data until Ctrl+C.
    /// Pick the feed with --replay <CSV> or --simulate.
    Run {
        /// Config file (default: vitalwatch.json in the working directory)
        #[arg(long)]
        config: Option<String>,

        /// Vitals endpoint, e.g. http://10.0.0.2:5000/sensors
        #[arg(long)]
        server_url: Option<String>,

        /// Collector IPv4 address; sets the vitals endpoint to http://<ip>:5000/sensors
        #[arg(long, conflicts_with = "server_url")]
        server_ip: Option<String>,

        /// Five-digit patient identifier sent with every payload (e.g. 00001)
        #[arg(long)]
        patient_id: Option<String>,

        /// host:port of the push channel peer
        #[arg(long)]
        push_addr: Option<String>,

        /// Serve the local status API on 127.0.0.1:<port>
        #[arg(long)]
        status_port: Option<u16>,

        /// Replay a CSV of `timestamp_ms,kind,v1,v2,v3` rows (kind: accel, gyro, pulse)
        #[arg(long, conflicts_with = "simulate", required_unless_present = "simulate")]
        replay: Option<String>,

        /// Generate a synthetic feed instead of replaying a file
        #[arg(long)]
        simulate: bool,

        /// Inject a fall into the synthetic feed this many seconds after start
        #[arg(long, requires = "simulate")]
        fall_at: Option<f64>,

        /// Synthetic accelerometer/gyroscope rate in Hz
        #[arg(long, default_value = "50")]
        rate: f64,

        /// Stop after this long (e.g. 90s, 10m, 1h). Default: until Ctrl+C
        #[arg(long)]
        duration: Option<String>,

        /// Send the first vitals report right away instead of on the next 5-minute mark
        #[arg(long)]
        no_align: bool,
    },

    /// Show or edit the persisted agent configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Query the status API of a running agent
    Status {
        /// Base URL of the agent's status API
        #[arg(long, default_value = "http://127.0.0.1:8090")]
        url: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(long)]
        config: Option<String>,
    },

    /// Set one key (e.g. server_url, patient_id, detection.magnitude_threshold) and save
    Set {
        key: String,
        value: String,

        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            server_url,
            server_ip,
            patient_id,
            push_addr,
            status_port,
            replay,
            simulate,
            fall_at,
            rate,
            duration,
            no_align,
        } => commands::run::run(commands::run::RunOptions {
            config,
            server_url,
            server_ip,
            patient_id,
            push_addr,
            status_port,
            replay,
            simulate,
            fall_at,
            rate,
            duration,
            no_align,
        }),
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => commands::config::show(config.as_deref()),
            ConfigAction::Set { key, value, config } => {
                commands::config::set(config.as_deref(), &key, &value);
            }
        },
        Commands::Status { url, json } => commands::status::run(&url, json),
    }
}
