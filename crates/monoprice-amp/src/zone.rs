//! Per-zone handle.

use std::future::Future;

use monoprice_protocol::{Argument, Command, Request, State, ZoneId};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::{AmpError, AmpResult};

/// What a caller can do with one zone.
///
/// Adapters (CLI, HTTP) are written against this trait so they can be
/// exercised with a fake zone.
pub trait ZoneControl {
    /// Address of the zone.
    fn id(&self) -> ZoneId;

    /// Current status record.
    fn state(&self) -> impl Future<Output = AmpResult<State>> + Send;

    /// Change one attribute.
    fn send_command(
        &self,
        command: Command,
        argument: Argument,
    ) -> impl Future<Output = AmpResult<()>> + Send;
}

/// A populated zone found by discovery.
#[derive(Debug, Clone)]
pub struct Zone {
    id: ZoneId,
    engine: Engine,
    state_retry_limit: u32,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, engine: Engine, state_retry_limit: u32) -> Self {
        Self {
            id,
            engine,
            state_retry_limit,
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Query the zone's status record.
    ///
    /// A populated zone occasionally fails to answer; the query is repeated
    /// on [`AmpError::InvalidZone`] and reported as
    /// [`AmpError::UnknownState`] once the retry limit is spent. Other
    /// errors are returned immediately.
    pub async fn state(&self) -> AmpResult<State> {
        for attempt in 1..=self.state_retry_limit {
            match self.engine.query(self.id).await {
                Ok(state) => return Ok(state),
                Err(AmpError::InvalidZone(_)) => {
                    debug!(zone = %self.id, attempt, "no state reply");
                }
                Err(err) => return Err(err),
            }
        }
        Err(AmpError::UnknownState(self.id))
    }

    /// Send one set command. The argument is checked before anything is
    /// queued.
    pub async fn send_command(&self, command: Command, argument: Argument) -> AmpResult<()> {
        let request = Request::set(self.id, command, argument)?;
        self.engine.submit(request).await.map(|_| ())
    }

    /// Apply a saved status record to this zone.
    ///
    /// Sends power, mute, volume, treble, bass, balance and source in that
    /// order and stops at the first failure. All arguments are validated
    /// before the first command goes out. The record's own zone field is
    /// ignored.
    pub async fn restore(&self, state: &State) -> AmpResult<()> {
        let steps = [
            (Command::Power, Argument::Bool(state.power)),
            (Command::Mute, Argument::Bool(state.mute)),
            (Command::Volume, Argument::Level(state.volume)),
            (Command::Treble, Argument::Level(state.treble)),
            (Command::Bass, Argument::Level(state.bass)),
            (Command::Balance, Argument::Level(state.balance)),
            (Command::Source, Argument::Level(state.source)),
        ];

        let requests = steps
            .into_iter()
            .map(|(command, argument)| Request::set(self.id, command, argument))
            .collect::<Result<Vec<_>, _>>()?;

        for request in requests {
            self.engine.submit(request).await?;
        }
        info!(zone = %self.id, "state restored");
        Ok(())
    }

    pub async fn set_power(&self, on: bool) -> AmpResult<()> {
        self.send_command(Command::Power, Argument::Bool(on)).await
    }

    pub async fn set_mute(&self, on: bool) -> AmpResult<()> {
        self.send_command(Command::Mute, Argument::Bool(on)).await
    }

    pub async fn set_do_not_disturb(&self, on: bool) -> AmpResult<()> {
        self.send_command(Command::DoNotDisturb, Argument::Bool(on)).await
    }

    /// Volume, 0 to 38.
    pub async fn set_volume(&self, level: u8) -> AmpResult<()> {
        self.send_command(Command::Volume, Argument::Level(level)).await
    }

    /// Treble, 0 to 14 (7 is flat).
    pub async fn set_treble(&self, level: u8) -> AmpResult<()> {
        self.send_command(Command::Treble, Argument::Level(level)).await
    }

    /// Bass, 0 to 14 (7 is flat).
    pub async fn set_bass(&self, level: u8) -> AmpResult<()> {
        self.send_command(Command::Bass, Argument::Level(level)).await
    }

    /// Balance, 0 to 20 (10 is centered).
    pub async fn set_balance(&self, level: u8) -> AmpResult<()> {
        self.send_command(Command::Balance, Argument::Level(level)).await
    }

    /// Input source, 1 to 6.
    pub async fn set_source(&self, source: u8) -> AmpResult<()> {
        self.send_command(Command::Source, Argument::Level(source)).await
    }
}

impl ZoneControl for Zone {
    fn id(&self) -> ZoneId {
        self.id
    }

    fn state(&self) -> impl Future<Output = AmpResult<State>> + Send {
        Zone::state(self)
    }

    fn send_command(
        &self,
        command: Command,
        argument: Argument,
    ) -> impl Future<Output = AmpResult<()>> + Send {
        Zone::send_command(self, command, argument)
    }
}

/// Query every zone in order, collecting per-zone results.
pub async fn collect_states<Z: ZoneControl>(zones: &[Z]) -> Vec<(ZoneId, AmpResult<State>)> {
    let mut states = Vec::with_capacity(zones.len());
    for zone in zones {
        states.push((zone.id(), zone.state().await));
    }
    states
}
