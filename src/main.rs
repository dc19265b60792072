//! mapfence - polygon registry daemon
//!
//! Reads commands from stdin, a Unix socket and MQTT, and runs them one at a
//! time against a single editor.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use tracing::info;

use mapfence::config::{Config, MqttConfig, DEFAULT_CONFIG_PATH};
use mapfence::control::{spawn_stdin_reader, Controller};
use mapfence::logging::init_logging;
use mapfence::mqtt::MqttClient;
use mapfence::{kml, Editor, Registry, Shell};

#[derive(Parser)]
#[command(name = "mapfence")]
#[command(about = "Keep a set of map polygons simple and non-overlapping", long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen for commands on this Unix socket
    #[arg(long)]
    socket: Option<PathBuf>,

    /// MQTT broker host; enables the MQTT command channel
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// MQTT topic prefix
    #[arg(long)]
    mqtt_topic: Option<String>,

    /// Decimal digits per coordinate in exported KML (minimum 6)
    #[arg(long)]
    precision: Option<usize>,

    /// Polygons to start with: a .kml document or a JSON snapshot
    #[arg(long)]
    load: Option<PathBuf>,

    /// Do not read commands from stdin
    #[arg(long)]
    no_stdin: bool,

    /// Log filter, e.g. "debug" or "mapfence=trace"
    #[arg(long)]
    log: Option<String>,
}

impl Args {
    /// Command line flags take precedence over the file
    fn apply(&self, config: &mut Config) {
        if let Some(socket) = &self.socket {
            config.socket_path = Some(socket.clone());
        }
        if self.mqtt_host.is_some() || self.mqtt_port.is_some() || self.mqtt_topic.is_some() {
            let mqtt = config.mqtt.get_or_insert_with(MqttConfig::default);
            if let Some(host) = &self.mqtt_host {
                mqtt.host = host.clone();
            }
            if let Some(port) = self.mqtt_port {
                mqtt.port = port;
            }
            if let Some(topic) = &self.mqtt_topic {
                mqtt.topic = topic.clone();
            }
        }
        if let Some(precision) = self.precision {
            config.coordinate_precision = precision;
        }
        if let Some(filter) = &self.log {
            config.log_filter = filter.clone();
        }
    }
}

fn load_initial(path: &Path) -> Result<Registry, String> {
    let is_kml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("kml"));
    if !is_kml {
        return Registry::load(path).map_err(|e| e.to_string());
    }
    let document = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let polygons = kml::import(&document).map_err(|e| e.to_string())?;
    Registry::from_polygons(polygons).map_err(|e| e.to_string())
}

fn run(args: Args) -> Result<(), String> {
    let mut config = Config::load(&args.config).map_err(|e| e.to_string())?;
    args.apply(&mut config);
    config.validate().map_err(|e| e.to_string())?;

    init_logging(&config.log_filter)?;

    let registry = match &args.load {
        Some(path) => {
            let registry = load_initial(path)?;
            info!(path = %path.display(), count = registry.len(), "Polygons loaded");
            registry
        }
        None => Registry::new(),
    };
    let editor = Editor::new(registry).with_precision(config.coordinate_precision);
    let mut shell = Shell::new(editor, config.snapshot_path.clone());

    let (tx, rx) = mpsc::channel();

    let _controller = match &config.socket_path {
        Some(path) => Some(Controller::new(path, tx.clone())?),
        None => None,
    };
    let mqtt = match &config.mqtt {
        Some(mqtt) => Some(MqttClient::new(mqtt, tx.clone())?),
        None => None,
    };

    let remote = config.socket_path.is_some() || config.mqtt.is_some();
    if args.no_stdin {
        if !remote {
            return Err("no command source: enable a socket or MQTT, or drop --no-stdin".into());
        }
    } else {
        spawn_stdin_reader(tx.clone(), !remote);
    }
    drop(tx);

    if let Some(mqtt) = &mqtt {
        mqtt.announce(&shell.editor().state().to_string());
    }
    info!("Ready");

    for request in rx {
        let outcome = shell.handle_line(&request.line);
        request.respond(&outcome.reply);
        if outcome.quit {
            break;
        }
    }

    if let Some(mqtt) = &mqtt {
        mqtt.announce("shutdown");
    }
    info!(count = shell.editor().registry().len(), "Shutting down");
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
