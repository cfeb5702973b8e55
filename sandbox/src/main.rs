// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tessera_sdk::core::AttributeStore;
use tessera_sdk::prelude::*;
use tokio::task::LocalSet;

const FRAME_DT: f64 = 1.0 / 30.0;

/// Total simulated time, advanced by `onTick`.
#[derive(Default)]
struct Clock {
    elapsed: Cell<f64>,
}

fn clock() -> SingletonDescriptor {
    SingletonDescriptor::new("Clock", Clock::default())
        .load_order(0)
        .on_init(|_, _| async {
            log::info!("Clock: ready");
            Ok(())
        })
        .on_tick(|this, dt| async move {
            this.elapsed.set(this.elapsed.get() + dt);
            Ok(())
        })
        .build()
}

/// Keeps goals per team; other systems report goals through `onGoal`.
#[derive(Default)]
struct Scoreboard {
    goals: RefCell<Vec<String>>,
}

fn scoreboard() -> SingletonDescriptor {
    SingletonDescriptor::new("Scoreboard", Scoreboard::default())
        .on_init(|_, peers| async move {
            let clock = peers
                .get::<Clock>("Clock")
                .context("Scoreboard needs the Clock")?;
            log::info!("Scoreboard: clock at {:.2}s", clock.elapsed.get());
            Ok(())
        })
        .on("onGoal", |this, args| async move {
            for team in args.iter().filter_map(AttributeValue::as_text) {
                this.goals.borrow_mut().push(team.to_string());
            }
            Ok(())
        })
        .build()
}

fn greeter() -> SingletonDescriptor {
    SingletonDescriptor::new("Greeter", ())
        .on_start(|_| async {
            log::info!("Greeter: hello from a statically discovered singleton");
            Ok(())
        })
        .build()
}

inventory::submit! {
    SingletonEntry { name: "Greeter", build: greeter }
}

/// Rotates its entity by `speed` radians per second.
struct Spinner;

impl Component for Spinner {
    fn on_start(&mut self, instance: &Instance, _: &dyn SingletonLookup) -> HookResult {
        log::info!("Spinner: attached to {}", instance.entity());
        Ok(())
    }

    fn on_post_simulation(&mut self, instance: &Instance, dt: f64) -> HookResult {
        let attributes = instance.attributes();
        let speed = attributes.number("speed")?.unwrap_or(0.0);
        let angle = attributes.number("angle")?.unwrap_or(0.0);
        attributes.set("angle", angle + speed * dt)?;
        Ok(())
    }

    fn destroy(&mut self, instance: &Instance) -> HookResult {
        log::info!("Spinner: detached from {}", instance.entity());
        Ok(())
    }
}

fn spinner() -> ComponentDescriptor {
    ComponentDescriptor::new("Spinner", |_: &Instance| Ok(Spinner))
        .with_default("speed", 1.0)
        .with_default("angle", 0.0)
        .on_phase(FramePhase::PostSimulation)
}

inventory::submit! {
    ComponentEntry { tag: "Spinner", build: spinner }
}

fn load_config() -> Result<RuntimeConfig> {
    match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(path),
        None => Ok(RuntimeConfig {
            profile_hooks: true,
            ..RuntimeConfig::for_role(ExecutionRole::Client)
        }),
    }
}

async fn run(config: RuntimeConfig) -> Result<()> {
    let host = Rc::new(MemoryHost::new(config.role));
    let tessera = Tessera::new(config, host.clone());

    tessera.register_singleton(clock())?;
    tessera.register_singleton(scoreboard())?;
    tessera.add_singleton_source(Rc::new(StaticSingletons));
    tessera.register_discovered(&StaticComponents)?;

    let arena = host.spawn();
    let wheel = host.spawn_child(arena);
    host.add_tag(wheel, "Spinner");

    let report = tessera.startup().await?;
    log::info!(
        "Sandbox: startup finished, {} init / {} start hook(s), {} failure(s)",
        report.init.launched,
        report.start.launched,
        report.failure_count()
    );

    let fan = host.spawn_child(arena);
    host.add_tag(fan, "Spinner");
    for _ in 0..30 {
        host.run_frame(FRAME_DT).await;
    }

    let board = tessera.get_singleton("Scoreboard")?;
    if let Some(goal) = board.invoke_custom("onGoal", vec!["red".into(), "blue".into()]) {
        if let Err(error) = goal.await {
            log::warn!("Sandbox: onGoal failed: {error:#}");
        }
    }

    host.remove_tag(fan, "Spinner");
    tessera.tick_telemetry();

    if let Some(clock) = tessera.singleton::<Clock>("Clock") {
        log::info!("Sandbox: simulated {:.2}s", clock.elapsed.get());
    }
    if let Some(scores) = board.instance::<Scoreboard>() {
        log::info!("Sandbox: goals {:?}", scores.goals.borrow());
    }
    log::info!(
        "Sandbox: wheel angle {:?}, {} spinner(s) active",
        host.get_attribute(wheel, "angle"),
        tessera.components().active_count("Spinner")
    );

    tessera.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.log_filter);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the runtime")?;
    LocalSet::new().block_on(&runtime, run(config))
}
