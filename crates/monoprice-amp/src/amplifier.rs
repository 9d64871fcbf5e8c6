//! Zone registry.
//!
//! The amplifier and its expansion units answer on up to 18 addresses
//! (rows 1-3, columns 1-6). Which of them are populated is found by probing
//! every candidate once with a state query when the [`Amplifier`] is built.

use monoprice_metrics::metric_defs;
use monoprice_protocol::ZoneId;
use tracing::{debug, info};

use crate::config::AmpConfig;
use crate::engine::Engine;
use crate::error::{AmpError, AmpResult};
use crate::transport::SerialPortIO;
use crate::zone::Zone;

/// A connected amplifier stack and its populated zones.
#[derive(Debug)]
pub struct Amplifier {
    engine: Engine,
    config: AmpConfig,
    zones: Vec<Zone>,
}

impl Amplifier {
    /// Start the engine on `io` and discover the populated zones.
    pub async fn connect<T: SerialPortIO + 'static>(io: T, config: AmpConfig) -> AmpResult<Self> {
        config.validate()?;
        let engine = Engine::spawn(io, &config);
        Self::with_engine(engine, config).await
    }

    /// Discover zones through an already running engine.
    pub async fn with_engine(engine: Engine, config: AmpConfig) -> AmpResult<Self> {
        let mut amp = Self {
            engine,
            config,
            zones: Vec::new(),
        };
        amp.rediscover().await?;
        Ok(amp)
    }

    /// Populated zones in ascending address order.
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Look up a discovered zone.
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones
            .binary_search_by_key(&id, |z| z.id())
            .ok()
            .map(|idx| &self.zones[idx])
    }

    /// Probe all addresses again. The previous list is kept if probing fails.
    pub async fn rediscover(&mut self) -> AmpResult<&[Zone]> {
        let ids = discover(&self.engine, &self.config).await?;
        self.zones = ids
            .into_iter()
            .map(|id| Zone::new(id, self.engine.clone(), self.config.state_retry_limit))
            .collect();
        Ok(&self.zones)
    }

    /// Stop the engine once queued work has finished.
    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}

/// Probe every candidate address in ascending order.
///
/// A zone that answers its state query exists; [`AmpError::InvalidZone`]
/// means the address is empty. A read timeout also counts as empty when
/// `probe_timeout_as_absent` is set. Any other error aborts the probe.
pub async fn discover(engine: &Engine, config: &AmpConfig) -> AmpResult<Vec<ZoneId>> {
    let mut found = Vec::new();

    for id in ZoneId::candidates() {
        match engine.query(id).await {
            Ok(_) => {
                debug!(zone = %id, "zone present");
                found.push(id);
            }
            Err(AmpError::InvalidZone(_)) => {
                debug!(zone = %id, "no zone");
            }
            Err(AmpError::ReadTimeout) if config.probe_timeout_as_absent => {
                debug!(zone = %id, "no answer, treating as absent");
            }
            Err(err) => return Err(err),
        }
    }

    info!(zones = ?found.iter().map(|z| z.get()).collect::<Vec<_>>(), "discovery complete");
    metrics::gauge!(metric_defs::ZONES_DISCOVERED.name).set(found.len() as f64);
    Ok(found)
}
