//! Simulated amplifier for integration tests.
//!
//! The device end of a `tokio::io::duplex` pipe behaves like the real unit:
//! it echoes every command, answers queries for populated zones with their
//! status record and applies set commands. A per-test script can override
//! the reply to any command.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use monoprice_protocol::{State, ZoneId};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

/// One thing the device does in reply to a command.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write raw bytes.
    Send(String),
    /// Pause before the next step.
    Sleep(Duration),
    /// Close the device end of the pipe.
    Close,
}

/// Test-side view of the simulated amplifier.
#[derive(Clone)]
pub struct Device {
    log: Arc<Mutex<Vec<String>>>,
    states: Arc<Mutex<BTreeMap<u8, State>>>,
}

impl Device {
    /// Commands received so far, without terminators.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Commands received after the first `skip`.
    pub fn commands_after(&self, skip: usize) -> Vec<String> {
        self.commands().into_iter().skip(skip).collect()
    }

    pub fn state(&self, zone: u8) -> State {
        self.states.lock().unwrap()[&zone]
    }

    pub fn add_zone(&self, zone: u8) {
        self.states.lock().unwrap().insert(zone, sample_state(zone));
    }

    pub fn remove_zone(&self, zone: u8) {
        self.states.lock().unwrap().remove(&zone);
    }
}

/// Status record used for every simulated zone.
pub fn sample_state(zone: u8) -> State {
    let mut state: State = "1100010000131112100401".parse().unwrap();
    state.zone = ZoneId::new(zone).unwrap();
    state
}

pub fn zone(id: u8) -> ZoneId {
    ZoneId::new(id).unwrap()
}

/// Echo, as the amplifier sends it.
pub fn echo(command: &str) -> Step {
    Step::Send(format!("{}\r\n#", command))
}

/// A data line for `state`.
pub fn data(state: &State) -> Step {
    Step::Send(format!(">{}\r\r\n#", state.encode()))
}

/// A line carrying nothing but framing.
pub fn empty_line() -> Step {
    Step::Send("\r\n#".to_string())
}

pub fn command_error() -> Step {
    Step::Send("Command Error.\r\n#".to_string())
}

/// Start a simulated amplifier with the given populated zones.
pub fn spawn_amp(zones: &[u8]) -> (DuplexStream, Device) {
    spawn_scripted(zones, |_| None)
}

/// Like [`spawn_amp`], but `script` may replace the reply to any command by
/// returning `Some(steps)`.
pub fn spawn_scripted<F>(zones: &[u8], mut script: F) -> (DuplexStream, Device)
where
    F: FnMut(&str) -> Option<Vec<Step>> + Send + 'static,
{
    let (host, mut dev) = duplex(4096);
    let device = Device {
        log: Arc::new(Mutex::new(Vec::new())),
        states: Arc::new(Mutex::new(
            zones.iter().map(|&z| (z, sample_state(z))).collect(),
        )),
    };

    let log = device.log.clone();
    let states = device.states.clone();
    tokio::spawn(async move {
        let mut pending = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = match dev.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            pending.extend_from_slice(&buf[..n]);

            while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
                let raw: Vec<u8> = pending.drain(..=pos).collect();
                let command = String::from_utf8_lossy(&raw[..pos]).into_owned();
                log.lock().unwrap().push(command.clone());

                let steps = script(&command).unwrap_or_else(|| default_reply(&command, &states));
                for step in steps {
                    match step {
                        Step::Send(text) => {
                            if dev.write_all(text.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        Step::Sleep(d) => tokio::time::sleep(d).await,
                        Step::Close => return,
                    }
                }
            }
        }
    });

    (host, device)
}

fn default_reply(command: &str, states: &Mutex<BTreeMap<u8, State>>) -> Vec<Step> {
    let mut states = states.lock().unwrap();
    let zone = command.get(1..3).and_then(|z| z.parse::<u8>().ok());

    if let Some(rest) = command.strip_prefix('?') {
        return match zone.and_then(|z| states.get(&z)) {
            Some(state) if rest.len() == 2 => vec![echo(command), data(state)],
            _ => vec![echo(command), Step::Send(format!("Zone {} not present\r\n#", rest))],
        };
    }

    if command.starts_with('<') {
        let mnemonic = command.get(3..5).unwrap_or("");
        let value = command.get(5..).and_then(|v| v.parse::<u8>().ok());
        let applied = match (zone.and_then(|z| states.get_mut(&z)), value) {
            (Some(state), Some(v)) => apply(state, mnemonic, v),
            (Some(_), None) => matches!(mnemonic, "PA" | "LS") && command.len() == 5,
            _ => false,
        };
        return if applied {
            vec![echo(command)]
        } else {
            vec![echo(command), command_error()]
        };
    }

    vec![echo(command), command_error()]
}

fn apply(state: &mut State, mnemonic: &str, value: u8) -> bool {
    match mnemonic {
        "PR" => state.power = value == 1,
        "MU" => state.mute = value == 1,
        "DT" => state.do_not_disturb = value == 1,
        "VO" => state.volume = value,
        "TR" => state.treble = value,
        "BS" => state.bass = value,
        "BL" => state.balance = value,
        "CH" => state.source = value,
        _ => return false,
    }
    true
}
