//! # Simulated Household Example
//!
//! Runs a SyncEngine with a background worker against an in-memory
//! household and walks through the group operations:
//!
//! 1. A group volume command shifts every member by the same delta
//! 2. A member volume change is mirrored into the group volume
//! 3. A group mute command mutes every member
//! 4. A group switch request joins a standalone speaker
//!
//! ## Usage
//!
//! ```bash
//! GROUP_SYNC_LOG_MODE=development cargo run --example simulated_household
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use group_sync::prelude::*;
use group_sync::{init_logging_from_env, spawn_sync_worker};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let hub = MemoryHub::new();
    let kitchen = hub.add_speaker("RINCON_000E58A0B1C2", "Kitchen", 50);
    let dining = hub.add_speaker("RINCON_000E58A0B1C3", "Dining", 30);
    let office = hub.add_speaker("RINCON_000E58A0B1C4", "Office", 40);
    let den = hub.add_speaker("RINCON_000E58A0B1C5", "Den", 10);
    hub.group(&kitchen, &[&dining, &office]);

    let config = EngineConfig {
        worker_poll_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let engine = Arc::new(SyncEngine::new(config, hub.collaborators())?);
    let worker = spawn_sync_worker(Arc::clone(&engine));
    let members = [&kitchen, &dining, &office, &den];

    println!("Initial state");
    print_volumes(&hub, &members);

    println!("\nGroup volume of Kitchen set to 45");
    hub.command(&ProxyKind::GroupVolume.control_for(&kitchen), ControlValue::from(45u8));
    settle();
    print_volumes(&hub, &members);

    println!("\nDining turned up to 65 on the device");
    hub.device_update(&dining, Channel::Volume, ControlValue::from(65u8));
    settle();
    println!(
        "  group volume of Kitchen: {}",
        value(&hub, &ProxyKind::GroupVolume.control_for(&kitchen))
    );

    println!("\nGroup mute of Kitchen switched ON");
    hub.command(&ProxyKind::GroupMute.control_for(&kitchen), ControlValue::Switch(true));
    settle();
    for node in members {
        println!(
            "  {} muted: {}",
            node,
            hub.channel_value(node, Channel::Mute).unwrap_or_default()
        );
    }

    println!("\nDen requested to join Kitchen");
    let request = GroupSwitchConfig::default().join(den.clone());
    hub.command(
        &ProxyKind::GroupSwitch.control_for(&kitchen),
        ControlValue::from(request.to_payload()?),
    );
    settle();
    for (control, command) in hub.commands() {
        if Some(&control) == hub.channel_control(&kitchen, Channel::Add).as_ref() {
            println!("  device command {} <- {}", control, command);
        }
    }

    // Act as the device: Den now follows Kitchen
    hub.group(&kitchen, &[&dining, &office, &den]);
    settle();

    println!("\nPublished projections:");
    let feed = value(&hub, &engine.config().feed_control);
    let projections: serde_json::Value = serde_json::from_str(&feed)?;
    println!("{}", serde_json::to_string_pretty(&projections)?);

    worker.stop();
    let removed = engine.shutdown();
    println!("\nRemoved {} engine-owned control points", removed);
    Ok(())
}

fn settle() {
    thread::sleep(Duration::from_millis(200));
}

fn value(hub: &MemoryHub, control: &ControlPointId) -> String {
    hub.value(control).unwrap_or_default().to_string()
}

fn print_volumes(hub: &MemoryHub, nodes: &[&NodeId]) {
    for node in nodes {
        let zone = hub.channel_value(node, Channel::ZoneName).unwrap_or_default();
        let volume = hub.channel_value(node, Channel::Volume).unwrap_or_default();
        println!("  {:<8} volume {}", zone, volume);
    }
}
