use curtain::clock::ManualClock;
use curtain::config::{LoadingConfig, ScreenDefinition};
use curtain::host::{HeadlessHost, HostCall};
use curtain::manager::LoadingManager;
use std::collections::HashMap;

fn gate_config() -> LoadingConfig {
    let mut screens = HashMap::new();
    screens.insert("travel".to_string(), ScreenDefinition::new("TravelOverlay"));
    let mut save = ScreenDefinition::new("SaveSpinner");
    save.z_order = 50;
    save.hold_secs = 0.0;
    save.block_input = false;
    screens.insert("save".to_string(), save);
    LoadingConfig { screens, ..LoadingConfig::default() }
}

fn manager_with(config: LoadingConfig) -> (LoadingManager, HeadlessHost, ManualClock) {
    let host = HeadlessHost::new();
    let clock = ManualClock::new();
    let manager = LoadingManager::new(config, Box::new(host.clone()), Box::new(clock.clone()));
    (manager, host, clock)
}

#[test]
fn gates_span_overlapping_screens() {
    let (mut manager, host, clock) = manager_with(gate_config());

    manager.add_process("a", "save", "Saving").expect("add a");
    manager.add_process("b", "travel", "Travelling").expect("add b");
    manager.tick(0.5);
    assert_eq!(
        host.take_calls(),
        vec![
            HostCall::Create {
                tag: "save".to_string(),
                widget: "SaveSpinner".to_string(),
                z_order: 50,
                handle: 1,
            },
            HostCall::PerformanceSaving { engaged: true },
            HostCall::Create {
                tag: "travel".to_string(),
                widget: "TravelOverlay".to_string(),
                z_order: 100,
                handle: 2,
            },
            HostCall::InputBlock { engaged: true },
        ],
        "performance saving engages once even with two holders"
    );

    clock.set(1.0);
    manager.remove_process("a").expect("remove a");
    manager.tick(0.5);
    assert_eq!(
        host.take_calls(),
        vec![HostCall::Destroy { handle: 1 }],
        "travel still holds performance saving, so no release"
    );
    assert!(manager.saving_performance());
    assert!(manager.input_blocked());

    clock.set(2.0);
    manager.remove_process("b").expect("remove b");
    clock.set(4.0);
    manager.tick(0.5);
    assert_eq!(
        host.take_calls(),
        vec![
            HostCall::InputBlock { engaged: false },
            HostCall::PerformanceSaving { engaged: false },
            HostCall::Destroy { handle: 2 },
        ]
    );
    assert!(!manager.saving_performance());
    assert!(!manager.input_blocked());
}

#[test]
fn revival_holds_gates_without_extra_edges() {
    let (mut manager, host, clock) = manager_with(gate_config());
    let mut all_calls = Vec::new();

    manager.add_process("a", "travel", "first leg").expect("add a");
    manager.tick(0.5);
    all_calls.extend(host.take_calls());

    clock.set(1.0);
    manager.remove_process("a").expect("remove a");
    manager.add_process("b", "travel", "second leg").expect("revival add");
    clock.set(3.5);
    manager.tick(0.5);
    all_calls.extend(host.take_calls());

    manager.remove_process("b").expect("remove b");
    clock.set(5.5);
    manager.tick(0.5);
    all_calls.extend(host.take_calls());

    let input_edges: Vec<bool> = all_calls
        .iter()
        .filter_map(|call| match call {
            HostCall::InputBlock { engaged } => Some(*engaged),
            _ => None,
        })
        .collect();
    assert_eq!(input_edges, vec![true, false], "one engage and one release across the revival");

    let saving_edges: Vec<bool> = all_calls
        .iter()
        .filter_map(|call| match call {
            HostCall::PerformanceSaving { engaged } => Some(*engaged),
            _ => None,
        })
        .collect();
    assert_eq!(saving_edges, vec![true, false]);
}

#[test]
fn shutdown_releases_each_gate_exactly_once() {
    let (mut manager, host, _clock) = manager_with(gate_config());

    manager.add_process("a", "save", "Saving").expect("add a");
    manager.add_process("b", "travel", "Travelling").expect("add b");
    manager.tick(0.5);
    host.take_calls();

    manager.shutdown();
    assert_eq!(
        host.take_calls(),
        vec![
            HostCall::InputBlock { engaged: false },
            HostCall::PerformanceSaving { engaged: false },
            HostCall::Destroy { handle: 1 },
            HostCall::Destroy { handle: 2 },
        ],
        "saving had two holders but releases once"
    );
    assert!(!manager.input_blocked());
    assert!(!manager.saving_performance());
}
