//! Integration tests for zone handles.

mod common;

use common::{command_error, echo, sample_state, spawn_amp, spawn_scripted, zone, Device, Step};
use monoprice_amp::{collect_states, AmpConfig, AmpError, Amplifier, StatusClass, ZoneControl};
use monoprice_protocol::{Argument, Command, ProtocolError, State};

async fn connect(device_zones: &[u8]) -> (Amplifier, Device, usize) {
    let (io, device) = spawn_amp(device_zones);
    let amp = Amplifier::connect(io, AmpConfig::default()).await.unwrap();
    let probes = device.commands().len();
    (amp, device, probes)
}

// ============================================================================
// State
// ============================================================================

#[tokio::test]
async fn test_state() {
    let (amp, _device, _) = connect(&[11, 12]).await;

    let zone = amp.zone(zone(12)).expect("zone 12 discovered");
    assert_eq!(zone.state().await.unwrap(), sample_state(12));
}

#[tokio::test]
async fn test_persistent_invalid_zone_becomes_unknown_state() {
    let (amp, device, probes) = connect(&[11]).await;
    device.remove_zone(11);

    let err = amp.zones()[0].state().await.unwrap_err();
    assert!(matches!(err, AmpError::UnknownState(z) if z == zone(11)));
    assert_eq!(err.status_class(), StatusClass::ServiceUnavailable);
    assert_eq!(device.commands_after(probes), vec!["?11", "?11", "?11"]);
}

#[tokio::test]
async fn test_state_retries_after_missed_reply() {
    let mut queries = 0;
    let (io, device) = spawn_scripted(&[11], move |cmd| {
        if cmd != "?11" {
            return None;
        }
        queries += 1;
        // First query is discovery; the next one is missed.
        (queries == 2).then(|| vec![echo(cmd), Step::Send("?\r\n#".into())])
    });
    let amp = Amplifier::connect(io, AmpConfig::default()).await.unwrap();
    let probes = device.commands().len();

    let state = amp.zones()[0].state().await.expect("second query should answer");
    assert_eq!(state, sample_state(11));
    assert_eq!(device.commands_after(probes), vec!["?11", "?11"]);
}

#[tokio::test]
async fn test_state_does_not_retry_other_errors() {
    let mut queries = 0;
    let (io, device) = spawn_scripted(&[11], move |cmd| {
        if cmd != "?11" {
            return None;
        }
        queries += 1;
        (queries > 1).then(|| vec![echo(cmd), command_error()])
    });
    let amp = Amplifier::connect(io, AmpConfig::default()).await.unwrap();
    let probes = device.commands().len();

    let err = amp.zones()[0].state().await.unwrap_err();
    assert!(matches!(err, AmpError::CommandError { .. }));
    assert_eq!(device.commands_after(probes).len(), 1);
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_typed_setters() {
    let (amp, device, probes) = connect(&[11]).await;
    let zone = &amp.zones()[0];

    zone.set_power(false).await.unwrap();
    zone.set_mute(true).await.unwrap();
    zone.set_do_not_disturb(true).await.unwrap();
    zone.set_volume(38).await.unwrap();
    zone.set_treble(0).await.unwrap();
    zone.set_bass(14).await.unwrap();
    zone.set_balance(20).await.unwrap();
    zone.set_source(6).await.unwrap();

    assert_eq!(
        device.commands_after(probes),
        vec!["<11PR00", "<11MU01", "<11DT01", "<11VO38", "<11TR00", "<11BS14", "<11BL20", "<11CH06"]
    );

    let state = device.state(11);
    assert!(!state.power);
    assert!(state.mute);
    assert!(state.do_not_disturb);
    assert_eq!((state.volume, state.treble, state.bass), (38, 0, 14));
    assert_eq!((state.balance, state.source), (20, 6));
}

#[tokio::test]
async fn test_out_of_range_setters_write_nothing() {
    let (amp, device, probes) = connect(&[11]).await;
    let zone = &amp.zones()[0];

    for result in [
        zone.set_volume(39).await,
        zone.set_treble(15).await,
        zone.set_bass(200).await,
        zone.set_balance(21).await,
        zone.set_source(0).await,
        zone.set_source(7).await,
    ] {
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            AmpError::Protocol(ProtocolError::InvalidArgument { .. })
        ));
    }
    assert!(device.commands_after(probes).is_empty());
}

#[tokio::test]
async fn test_send_command_rejection() {
    let (io, _device) = spawn_scripted(&[11], |cmd| {
        cmd.starts_with("<11CH").then(|| vec![echo(cmd), command_error()])
    });
    let amp = Amplifier::connect(io, AmpConfig::default()).await.unwrap();

    let err = amp.zones()[0]
        .send_command(Command::Source, Argument::Level(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AmpError::CommandError { .. }));
}

// ============================================================================
// Restore
// ============================================================================

fn saved_state() -> State {
    State {
        zone: zone(21),
        pa: false,
        power: true,
        mute: false,
        do_not_disturb: false,
        volume: 25,
        treble: 9,
        bass: 5,
        balance: 12,
        source: 3,
        keypad: true,
    }
}

#[tokio::test]
async fn test_restore_sends_fields_in_order() {
    let (amp, device, probes) = connect(&[11]).await;

    amp.zones()[0].restore(&saved_state()).await.unwrap();

    assert_eq!(
        device.commands_after(probes),
        vec!["<11PR01", "<11MU00", "<11VO25", "<11TR09", "<11BS05", "<11BL12", "<11CH03"]
    );
    let state = device.state(11);
    assert_eq!(state.volume, 25);
    assert_eq!(state.source, 3);
}

#[tokio::test]
async fn test_restore_stops_at_first_failure() {
    let (io, device) = spawn_scripted(&[11], |cmd| {
        cmd.starts_with("<11VO").then(|| vec![echo(cmd), command_error()])
    });
    let amp = Amplifier::connect(io, AmpConfig::default()).await.unwrap();
    let probes = device.commands().len();

    let err = amp.zones()[0].restore(&saved_state()).await.unwrap_err();
    assert!(matches!(err, AmpError::CommandError { command } if command == "<11VO25"));
    assert_eq!(
        device.commands_after(probes),
        vec!["<11PR01", "<11MU00", "<11VO25"]
    );
}

#[tokio::test]
async fn test_restore_validates_before_writing() {
    let (amp, device, probes) = connect(&[11]).await;
    let mut state = saved_state();
    state.source = 0;

    let err = amp.zones()[0].restore(&state).await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::BadRequest);
    assert!(device.commands_after(probes).is_empty());
}

// ============================================================================
// Trait consumers
// ============================================================================

async fn total_volume<Z: ZoneControl>(zones: &[Z]) -> u32 {
    let mut total = 0;
    for zone in zones {
        total += u32::from(zone.state().await.unwrap().volume);
    }
    total
}

#[tokio::test]
async fn test_zones_through_trait() {
    let (amp, _device, _) = connect(&[11, 12, 21]).await;

    assert_eq!(total_volume(amp.zones()).await, 3 * 13);

    ZoneControl::send_command(&amp.zones()[1], Command::Volume, Argument::Level(1))
        .await
        .unwrap();
    let states = collect_states(amp.zones()).await;
    let volumes: Vec<u8> = states.into_iter().map(|(_, s)| s.unwrap().volume).collect();
    assert_eq!(volumes, vec![13, 1, 13]);
}
