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

//! End-to-end runtime tests: singletons and components together on the
//! in-memory host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tessera_core::AttributeStore;
use tessera_sdk::prelude::*;
use tokio::task::LocalSet;

type Journal = Rc<RefCell<Vec<String>>>;

fn runtime(role: ExecutionRole) -> (Rc<MemoryHost>, Tessera) {
    runtime_with(RuntimeConfig::for_role(role))
}

fn runtime_with(config: RuntimeConfig) -> (Rc<MemoryHost>, Tessera) {
    let host = Rc::new(MemoryHost::new(config.role));
    let tessera = Tessera::new(config, host.clone());
    (host, tessera)
}

struct Score {
    started: Cell<bool>,
}

fn score_singleton(journal: &Journal) -> SingletonDescriptor {
    let journal = Rc::clone(journal);
    SingletonDescriptor::new(
        "Score",
        Score {
            started: Cell::new(false),
        },
    )
    .on_start(move |this| {
        let journal = Rc::clone(&journal);
        async move {
            this.started.set(true);
            journal.borrow_mut().push("Score:start".into());
            Ok(())
        }
    })
    .build()
}

struct Coin {
    journal: Journal,
}

impl Component for Coin {
    fn on_start(&mut self, instance: &Instance, singletons: &dyn SingletonLookup) -> HookResult {
        let score = singletons
            .get::<Score>("Score")
            .ok_or_else(|| anyhow::anyhow!("Score missing"))?;
        self.journal.borrow_mut().push(format!(
            "Coin:{}:start(score started={})",
            instance.entity().index,
            score.started.get()
        ));
        Ok(())
    }

    fn on_attribute_changed(
        &mut self,
        instance: &Instance,
        key: &str,
        value: Option<&AttributeValue>,
    ) -> HookResult {
        if key == "collected" && value == Some(&AttributeValue::Bool(true)) {
            self.journal
                .borrow_mut()
                .push(format!("Coin:{}:collected", instance.entity().index));
        }
        Ok(())
    }

    fn on_post_simulation(&mut self, instance: &Instance, dt: f64) -> HookResult {
        let spin = instance.attributes().number("spin")?.unwrap_or(0.0);
        instance.attributes().set("spin", spin + dt)?;
        Ok(())
    }

    fn destroy(&mut self, instance: &Instance) -> HookResult {
        self.journal
            .borrow_mut()
            .push(format!("Coin:{}:destroy", instance.entity().index));
        Ok(())
    }
}

fn coin_component(journal: &Journal) -> ComponentDescriptor {
    let journal = Rc::clone(journal);
    ComponentDescriptor::new("Coin", move |_: &Instance| {
        Ok(Coin {
            journal: Rc::clone(&journal),
        })
    })
    .with_default("spin", 0.0)
    .on_phase(FramePhase::PostSimulation)
}

#[tokio::test]
async fn test_components_start_after_singletons() {
    let (host, tessera) = runtime(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    let coin = host.spawn();
    host.add_tag(coin, "Coin");
    tessera.register_component(coin_component(&journal)).unwrap();
    tessera.register_singleton(score_singleton(&journal)).unwrap();

    LocalSet::new()
        .run_until(async {
            let report = tessera.startup().await.unwrap();
            assert!(report.is_clean());
        })
        .await;

    assert_eq!(tessera.state(), RuntimeState::Running);
    assert_eq!(
        *journal.borrow(),
        vec![
            "Score:start".to_string(),
            format!("Coin:{}:start(score started=true)", coin.index),
        ]
    );
}

#[tokio::test]
async fn test_frames_drive_singletons_and_components() {
    let (host, tessera) = runtime(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    let ticks = Rc::new(Cell::new(0));
    tessera.register_component(coin_component(&journal)).unwrap();
    tessera.register_singleton(score_singleton(&journal)).unwrap();
    tessera
        .register_singleton(
            SingletonDescriptor::new("Ticker", Rc::clone(&ticks)).on_tick(|this, _| async move {
                this.set(this.get() + 1);
                Ok(())
            }),
        )
        .unwrap();
    let coin = host.spawn();

    LocalSet::new()
        .run_until(async {
            tessera.startup().await.unwrap();
            host.add_tag(coin, "Coin");
            host.run_frame(0.5).await;
            host.run_frame(0.5).await;
        })
        .await;

    assert_eq!(ticks.get(), 2);
    assert_eq!(host.get_attribute(coin, "spin"), Some(AttributeValue::Number(1.0)));

    host.set_attribute(coin, "collected", true.into());
    assert!(journal
        .borrow()
        .contains(&format!("Coin:{}:collected", coin.index)));
}

#[tokio::test]
async fn test_second_startup_is_rejected() {
    let (_host, tessera) = runtime(ExecutionRole::Server);
    LocalSet::new()
        .run_until(async {
            tessera.startup().await.unwrap();
            assert_eq!(
                tessera.startup().await.unwrap_err(),
                RuntimeError::AlreadyStarted
            );
        })
        .await;
}

#[tokio::test]
async fn test_shutdown_tears_down_instances() {
    let (host, tessera) = runtime(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    tessera.register_component(coin_component(&journal)).unwrap();
    tessera.register_singleton(score_singleton(&journal)).unwrap();
    let coin = host.spawn();
    host.add_tag(coin, "Coin");

    LocalSet::new()
        .run_until(async {
            tessera.startup().await.unwrap();
        })
        .await;
    assert_eq!(tessera.components().active_count("Coin"), 1);

    tessera.shutdown();
    tessera.shutdown();

    assert_eq!(tessera.state(), RuntimeState::Stopped);
    assert_eq!(tessera.components().active_count("Coin"), 0);
    assert_eq!(
        journal.borrow().last().cloned(),
        Some(format!("Coin:{}:destroy", coin.index))
    );

    let other = host.spawn();
    host.add_tag(other, "Coin");
    assert_eq!(tessera.components().active_count("Coin"), 0);
}

#[test]
fn test_lazy_singleton_and_role_mismatch() {
    let (_host, tessera) = runtime(ExecutionRole::Client);
    tessera.add_singleton_source(Rc::new(
        SingletonTable::new()
            .with("Settings", || {
                SingletonDescriptor::new("Settings", RefCell::new("medium".to_string())).build()
            })
            .with("Matchmaker", || {
                SingletonDescriptor::new("Matchmaker", ())
                    .realm(ExecutionRole::Server)
                    .build()
            }),
    ));

    let quality = tessera.singleton::<RefCell<String>>("Settings").unwrap();
    assert_eq!(*quality.borrow(), "medium");
    assert!(tessera.singletons().contains("Settings"));

    assert!(matches!(
        tessera.get_singleton("Matchmaker").unwrap_err(),
        ConfigError::RoleMismatch {
            required: ExecutionRole::Server,
            actual: ExecutionRole::Client,
            ..
        }
    ));
    assert_eq!(
        tessera.get_singleton("Ghost").unwrap_err(),
        ConfigError::UnknownSingleton("Ghost".into())
    );
}

#[tokio::test]
async fn test_profiling_aggregates_frame_hooks() {
    let config = RuntimeConfig {
        profile_hooks: true,
        ..RuntimeConfig::for_role(ExecutionRole::Client)
    };
    let (host, tessera) = runtime_with(config);
    tessera
        .register_singleton(
            SingletonDescriptor::new("Camera", ())
                .on_render(|_, _| async { Ok(()) })
                .on_tick(|_, _| async { Err(anyhow::anyhow!("lost target")) }),
        )
        .unwrap();

    LocalSet::new()
        .run_until(async {
            tessera.startup().await.unwrap();
            for _ in 0..4 {
                host.run_frame(1.0 / 60.0).await;
            }
        })
        .await;

    assert_eq!(tessera.tick_telemetry(), 8);
    let telemetry = tessera.telemetry().unwrap();
    let render = telemetry.stats("Camera::onRender").unwrap();
    assert_eq!((render.calls, render.failures), (4, 0));
    let tick = telemetry.stats("Camera::onTick").unwrap();
    assert_eq!((tick.calls, tick.failures), (4, 4));
}

#[test]
fn test_registration_errors_surface_immediately() {
    let (_host, tessera) = runtime(ExecutionRole::Server);
    tessera
        .register_component(ComponentDescriptor::passive("Door"))
        .unwrap();

    assert_eq!(
        tessera
            .register_component(ComponentDescriptor::passive("Door"))
            .unwrap_err(),
        ConfigError::DuplicateComponent("Door".into())
    );
    assert!(matches!(
        tessera
            .register_singleton(SingletonDescriptor::new("Hud", ()).on_render(|_, _| async { Ok(()) }))
            .unwrap_err(),
        ConfigError::RoleRestrictedHook { .. }
    ));
}
