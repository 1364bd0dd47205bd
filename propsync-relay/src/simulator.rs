//! Periodic update simulator.
//!
//! Every tick re-reads the `properties` array of a JSON database file,
//! picks one listing at random, nudges its price and broadcasts it as a
//! `property_updated` envelope. The file is never written back.

use crate::RelayState;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use propsync_types::{EventKind, WireEnvelope};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Price changes are drawn from `-PRICE_JITTER..PRICE_JITTER`.
const PRICE_JITTER: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub db_path: PathBuf,
    /// Zero disables the simulator.
    pub interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db.json"),
            interval: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct Database {
    #[serde(default)]
    properties: Vec<Value>,
}

/// Reads the listings out of a database file.
pub async fn load_properties(path: &Path) -> Result<Vec<Value>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read database {}", path.display()))?;
    let db: Database = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse database {}", path.display()))?;
    Ok(db.properties)
}

/// Builds one simulated `property_updated` envelope.
///
/// Returns `None` when there is nothing to pick or the picked entry has no
/// numeric `price`. Integer prices stay integers.
pub fn simulated_update<R: Rng + ?Sized>(
    properties: &[Value],
    rng: &mut R,
    now: DateTime<Utc>,
) -> Option<WireEnvelope> {
    let mut property = properties.choose(rng)?.clone();
    let delta = rng.gen_range(-PRICE_JITTER..PRICE_JITTER);

    let fields = property.as_object_mut()?;
    let price = fields.get("price")?;
    let price = match price.as_i64() {
        Some(whole) => json!(whole + delta),
        None => json!(price.as_f64()? + delta as f64),
    };
    fields.insert("price".to_string(), price);
    fields.insert(
        "updatedAt".to_string(),
        json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    Some(WireEnvelope {
        kind: EventKind::PropertyUpdated.as_str().to_string(),
        property: Some(property),
        message: None,
    })
}

/// Runs one simulator tick. Returns the number of streams reached, or
/// `None` when there was nothing to broadcast.
pub async fn simulate_once(state: &RelayState, db_path: &Path) -> Result<Option<usize>> {
    let properties = load_properties(db_path).await?;
    let envelope = {
        let mut rng = rand::thread_rng();
        simulated_update(&properties, &mut rng, Utc::now())
    };
    let Some(envelope) = envelope else {
        debug!("No listing eligible for a simulated update");
        return Ok(None);
    };

    let payload = serde_json::to_string(&envelope)?;
    let clients = state.broadcast(payload);
    if let Some(property) = &envelope.property {
        info!(
            id = %property["id"],
            price = %property["price"],
            clients,
            "Broadcast simulated update"
        );
    }
    Ok(Some(clients))
}

/// Ticks forever at the configured interval. Failures are logged and the
/// next tick tries again.
pub async fn run_simulator(state: RelayState, config: SimulatorConfig) {
    if config.interval.is_zero() {
        info!("Update simulator disabled");
        return;
    }
    info!(
        "Update simulator every {:?} from {}",
        config.interval,
        config.db_path.display()
    );

    let mut ticker = tokio::time::interval(config.interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = simulate_once(&state, &config.db_path).await {
            warn!("Simulated update skipped: {:#}", e);
        }
    }
}
