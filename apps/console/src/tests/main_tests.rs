use super::*;

fn state_changed(state: ConnectionState) -> SessionEvent {
    SessionEvent::StateChanged { state, error: None }
}

#[test]
fn queued_connect_transitions_are_not_replayed() {
    let (tx, mut rx) = broadcast::channel(8);
    tx.send(state_changed(ConnectionState::Connecting)).expect("send");
    tx.send(state_changed(ConnectionState::Connected)).expect("send");

    discard_queued(&mut rx);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    tx.send(state_changed(ConnectionState::Idle)).expect("send");
    assert_eq!(
        rx.try_recv().expect("later event"),
        state_changed(ConnectionState::Idle)
    );
}

#[test]
fn discarding_survives_a_lagged_receiver() {
    let (tx, mut rx) = broadcast::channel(1);
    for state in [
        ConnectionState::Connecting,
        ConnectionState::Connected,
        ConnectionState::Idle,
    ] {
        tx.send(state_changed(state)).expect("send");
    }

    discard_queued(&mut rx);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
