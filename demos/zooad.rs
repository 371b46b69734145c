//! # Example: zooad
//!
//! A small zoo administration daemon: an in-memory animal catalog and a mood
//! generator kept alive by a [`ServiceKeeper`], served over a line-based TCP protocol.
//!
//! ## Protocol
//! ```text
//! LIST                  → one "<id> <name> <species>" line per animal
//! GET <id>              → "<name> the <species> feels <mood>"
//! ADD <name> <species>  → "added <id>"
//! DEL <id>              → "deleted <id>"
//! ```
//!
//! Unknown ids answer "animal <id> not found".
//!
//! ## Configuration (environment)
//! | Variable              | Default           |
//! |-----------------------|-------------------|
//! | `LISTEN`              | `127.0.0.1:7171`  |
//! | `LOG_LEVEL`           | `debug`           |
//! | `LOG_FMT`             | `console`/`json`  |
//! | `TERMINATION_TIMEOUT` | `1000` (ms)       |
//! | `PING_PERIOD`         | `5000` (ms)       |
//! | `PING_TIMEOUT`        | `1500` (ms)       |
//! | `SHUTDOWN_TIMEOUT`    | `15000` (ms)      |
//!
//! ## Run
//! ```bash
//! LOG_FMT=json cargo run --example zooad
//! printf 'GET 1\n' | nc 127.0.0.1 7171
//! printf 'ADD Mort lemur\n' | nc 127.0.0.1 7171
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use appvisor::{
    AppConfig, AppError, Application, HoldOn, KeeperConfig, LogWriter, MainFn, Scope, Service,
    ServiceKeeper, ServiceRef, Subscribe,
};
use async_trait::async_trait;
use envconfig::Envconfig;
use rand::seq::IndexedRandom;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Envconfig, Clone)]
struct Config {
    #[envconfig(from = "LISTEN", default = "127.0.0.1:7171")]
    listen: String,

    #[envconfig(from = "LOG_LEVEL", default = "debug")]
    log_level: String,

    #[envconfig(from = "LOG_FMT", default = "console")]
    log_fmt: String,

    #[envconfig(from = "TERMINATION_TIMEOUT", default = "1000")]
    termination_timeout: EnvMsDuration,

    #[envconfig(from = "PING_PERIOD", default = "5000")]
    ping_period: EnvMsDuration,

    #[envconfig(from = "PING_TIMEOUT", default = "1500")]
    ping_timeout: EnvMsDuration,

    #[envconfig(from = "SHUTDOWN_TIMEOUT", default = "15000")]
    shutdown_timeout: EnvMsDuration,
}

#[derive(Debug, Clone, Copy)]
struct EnvMsDuration(Duration);

#[derive(Debug, PartialEq, Eq)]
struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;
        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

fn init_logger(cfg: &Config) -> Result<(), String> {
    let filter = EnvFilter::try_new(cfg.log_level.to_lowercase()).map_err(|e| e.to_string())?;
    match cfg.log_fmt.as_str() {
        "console" => tracing_subscriber::fmt().with_env_filter(filter).init(),
        "json" => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        other => return Err(format!("unknown output format {other}")),
    }
    Ok(())
}

const MOODS: &[&str] = &[
    "happy",
    "angry",
    "sad",
    "cheerful",
    "I love Sencha",
    "I need more *4 svad`bi*",
];

/// Hands out a random mood; nothing to open or close.
struct MoodService;

impl MoodService {
    fn mood(&self) -> &'static str {
        MOODS.choose(&mut rand::rng()).copied().unwrap_or("calm")
    }
}

#[async_trait]
impl Service for MoodService {
    fn name(&self) -> &str {
        "mood"
    }

    async fn init(&self, _scope: Scope) -> Result<(), AppError> {
        Ok(())
    }

    async fn ping(&self, _scope: Scope) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self, _scope: Scope) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Animal {
    name: String,
    species: String,
}

/// In-memory animal repository.
#[derive(Default)]
struct CatalogService {
    animals: RwLock<BTreeMap<u64, Animal>>,
    closed: AtomicBool,
}

impl CatalogService {
    fn get(&self, id: u64) -> Option<Animal> {
        self.animals.read().ok()?.get(&id).cloned()
    }

    fn list(&self) -> Vec<(u64, Animal)> {
        self.animals
            .read()
            .map(|m| m.iter().map(|(id, a)| (*id, a.clone())).collect())
            .unwrap_or_default()
    }

    /// Stores `animal` under the next free id.
    fn add(&self, animal: Animal) -> Result<u64, AppError> {
        let mut animals = self
            .animals
            .write()
            .map_err(|_| AppError::fail("catalog lock poisoned"))?;
        let id = animals.last_key_value().map_or(1, |(id, _)| id + 1);
        animals.insert(id, animal);
        Ok(id)
    }

    fn remove(&self, id: u64) -> Option<Animal> {
        self.animals.write().ok()?.remove(&id)
    }
}

#[async_trait]
impl Service for CatalogService {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn init(&self, _scope: Scope) -> Result<(), AppError> {
        let mut animals = self
            .animals
            .write()
            .map_err(|_| AppError::fail("catalog lock poisoned"))?;
        for (id, name, species) in [
            (1, "Gloria", "hippopotamus"),
            (2, "Marty", "zebra"),
            (3, "Melman", "giraffe"),
            (4, "Alex", "lion"),
        ] {
            animals.insert(
                id,
                Animal {
                    name: name.into(),
                    species: species.into(),
                },
            );
        }
        debug!(animals = animals.len(), "catalog loaded");
        Ok(())
    }

    async fn ping(&self, _scope: Scope) -> Result<(), AppError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::fail("catalog is closed"));
        }
        Ok(())
    }

    async fn close(&self, _scope: Scope) -> Result<(), AppError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn reply(line: &str, catalog: &CatalogService, moods: &MoodService) -> String {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["LIST"] => catalog
            .list()
            .into_iter()
            .map(|(id, a)| format!("{id} {} {}\n", a.name, a.species))
            .collect(),
        ["GET", id] => match id.parse::<u64>().ok().and_then(|id| catalog.get(id)) {
            Some(a) => format!("{} the {} feels {}\n", a.name, a.species, moods.mood()),
            None => format!("animal {id} not found\n"),
        },
        ["ADD", name, species] => {
            let animal = Animal {
                name: (*name).to_owned(),
                species: (*species).to_owned(),
            };
            match catalog.add(animal) {
                Ok(id) => format!("added {id}\n"),
                Err(e) => format!("error: {e}\n"),
            }
        }
        ["DEL", id] => match id.parse::<u64>().ok().and_then(|id| catalog.remove(id)) {
            Some(_) => format!("deleted {id}\n"),
            None => format!("animal {id} not found\n"),
        },
        _ => "unknown command\n".to_string(),
    }
}

async fn handle(
    stream: TcpStream,
    catalog: Arc<CatalogService>,
    moods: Arc<MoodService>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut line = String::new();
    BufReader::new(read).read_line(&mut line).await?;

    let answer = reply(&line, &catalog, &moods);
    write.write_all(answer.as_bytes()).await?;
    write.shutdown().await
}

#[tokio::main]
async fn main() {
    let cfg = match Config::init_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("can't init config: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logger(&cfg) {
        eprintln!("can't init logger: {e}");
        std::process::exit(1);
    }

    let catalog = Arc::new(CatalogService::default());
    let moods = Arc::new(MoodService);
    let services: Vec<ServiceRef> = vec![catalog.clone(), moods.clone()];
    let keeper = ServiceKeeper::new(
        services,
        KeeperConfig {
            ping_period: cfg.ping_period.0,
            ping_timeout: cfg.ping_timeout.0,
            shutdown_timeout: cfg.shutdown_timeout.0,
        },
    );

    let listen = cfg.listen.clone();
    let server = MainFn::arc("zooad", move |_scope: Scope, hold_on: HoldOn| {
        let listen = listen.clone();
        let catalog = catalog.clone();
        let moods = moods.clone();
        async move {
            let listener = TcpListener::bind(&listen)
                .await
                .map_err(|e| AppError::fail(format!("bind {listen}: {e}")))?;
            info!(addr = %listen, "listening");

            loop {
                tokio::select! {
                    _ = hold_on.wait() => return Ok::<_, AppError>(()),
                    accepted = listener.accept() => {
                        let (stream, peer) = accepted.map_err(AppError::fail)?;
                        let (catalog, moods) = (catalog.clone(), moods.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handle(stream, catalog, moods).await {
                                warn!(%peer, error = %e, "connection failed");
                            }
                        });
                    }
                }
            }
        }
    });

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let app = Application::builder(AppConfig {
        termination_timeout: cfg.termination_timeout.0,
        ..AppConfig::default()
    })
    .with_main(server)
    .with_resources(Arc::new(keeper))
    .with_subscribers(subs)
    .build();

    match app.run().await {
        Ok(()) => info!("shutdown"),
        Err(e) => {
            error!(error = %e, kind = e.as_label(), "application failed");
            std::process::exit(1);
        }
    }
}
