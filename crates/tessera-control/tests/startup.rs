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

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tessera_control::{
    LifecycleOrchestrator, SingletonDescriptor, SingletonListeners, SingletonRegistry,
    SingletonTable,
};
use tessera_core::telemetry::ProfileSink;
use tessera_core::{ExecutionRole, FramePhase, MetadataStore};
use tessera_infra::MemoryHost;
use tokio::task::LocalSet;

type Journal = Rc<RefCell<Vec<String>>>;

fn setup(role: ExecutionRole) -> (Rc<MemoryHost>, SingletonRegistry) {
    let host = Rc::new(MemoryHost::new(role));
    let registry = SingletonRegistry::new(
        role,
        Rc::new(MetadataStore::new()),
        Rc::new(SingletonListeners::new()),
    );
    (host, registry)
}

fn staged(name: &str, journal: &Journal, init_delay_ms: u64) -> SingletonDescriptor {
    let owner = name.to_string();
    let init_journal = Rc::clone(journal);
    let start_journal = Rc::clone(journal);
    let init_name = owner.clone();
    SingletonDescriptor::new(owner, ())
        .on_init(move |_, _| {
            let journal = Rc::clone(&init_journal);
            let name = init_name.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(init_delay_ms)).await;
                journal.borrow_mut().push(format!("init:{name}"));
                Ok(())
            }
        })
        .on_start({
            let name = name.to_string();
            move |_| {
                let journal = Rc::clone(&start_journal);
                let name = name.clone();
                async move {
                    journal.borrow_mut().push(format!("start:{name}"));
                    Ok(())
                }
            }
        })
        .build()
}

#[tokio::test]
async fn test_every_init_completes_before_any_start() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    registry.register(staged("Slow", &journal, 30)).unwrap();
    registry.register(staged("Fast", &journal, 0)).unwrap();
    registry.register(staged("Medium", &journal, 10)).unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry, host);

    LocalSet::new()
        .run_until(async {
            let report = orchestrator.startup().await.unwrap();
            assert!(report.is_clean());
            assert_eq!(report.init.launched, 3);
            assert_eq!(report.start.launched, 3);
        })
        .await;

    let entries = journal.borrow();
    assert_eq!(entries.len(), 6);
    let last_init = entries.iter().rposition(|e| e.starts_with("init:")).unwrap();
    let first_start = entries.iter().position(|e| e.starts_with("start:")).unwrap();
    assert!(last_init < first_start, "journal: {entries:?}");
    assert_eq!(entries[..3], ["init:Fast", "init:Medium", "init:Slow"]);
}

#[tokio::test]
async fn test_init_launches_in_load_order() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    for (name, order) in [
        ("Unordered", None),
        ("Third", Some(3)),
        ("First", Some(-1)),
        ("Second", Some(3)),
    ] {
        let journal = Rc::clone(&journal);
        let mut descriptor = SingletonDescriptor::new(name, ()).on_init(move |_, _| {
            journal.borrow_mut().push(name.to_string());
            async { Ok(()) }
        });
        if let Some(order) = order {
            descriptor = descriptor.load_order(order);
        }
        registry.register(descriptor).unwrap();
    }
    let orchestrator = LifecycleOrchestrator::new(registry, host);

    LocalSet::new()
        .run_until(async { orchestrator.startup().await.unwrap() })
        .await;

    assert_eq!(*journal.borrow(), vec!["First", "Third", "Second", "Unordered"]);
}

#[tokio::test]
async fn test_failing_hooks_do_not_affect_siblings() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal: Journal = Rc::default();
    registry
        .register(
            SingletonDescriptor::new("Broken", ())
                .on_init(|_, _| async { Err(anyhow::anyhow!("database offline")) })
                .on_start(|_| async { Ok(()) }),
        )
        .unwrap();
    registry
        .register(
            SingletonDescriptor::new("Panicky", ())
                .on_init(|_, _| async { Ok(()) })
                .on_start(|_| async { panic!("start exploded") }),
        )
        .unwrap();
    registry.register(staged("Healthy", &journal, 0)).unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry, host);

    let report = LocalSet::new()
        .run_until(async { orchestrator.startup().await.unwrap() })
        .await;

    assert_eq!(report.init.failures.len(), 1);
    assert_eq!(report.init.failures[0].identity, "Broken");
    assert!(report.init.failures[0].message.contains("database offline"));
    assert_eq!(report.start.failures.len(), 1);
    assert_eq!(report.start.failures[0].identity, "Panicky");
    assert!(report.start.failures[0].message.contains("start exploded"));
    assert_eq!(report.start.succeeded(), 2);
    assert_eq!(*journal.borrow(), vec!["init:Healthy", "start:Healthy"]);
}

#[tokio::test]
async fn test_frame_hooks_run_each_frame_on_a_reused_context() {
    let (host, registry) = setup(ExecutionRole::Client);
    let elapsed = Rc::new(Cell::new(0.0_f64));
    let renders = Rc::new(Cell::new(0));
    registry
        .register(
            SingletonDescriptor::new("Clock", Rc::clone(&elapsed))
                .on_tick(|this, dt| async move {
                    this.set(this.get() + dt);
                    Ok(())
                })
                .on_render({
                    let renders = Rc::clone(&renders);
                    move |_, _| {
                        renders.set(renders.get() + 1);
                        async { Ok(()) }
                    }
                }),
        )
        .unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry, host.clone());

    LocalSet::new()
        .run_until(async {
            let report = orchestrator.startup().await.unwrap();
            assert_eq!(report.frame_bindings, 2);
            for _ in 0..3 {
                host.run_frame(0.5).await;
            }
        })
        .await;

    assert_eq!(elapsed.get(), 1.5);
    assert_eq!(renders.get(), 3);
    let tick = orchestrator
        .bindings()
        .into_iter()
        .find(|binding| binding.phase == FramePhase::PostSimulation)
        .unwrap();
    assert_eq!(tick.singleton, "Clock");
    assert_eq!(tick.contexts_spawned, 1);
}

#[tokio::test]
async fn test_frame_hook_runs_inside_signal_delivery() {
    let (host, registry) = setup(ExecutionRole::Server);
    let hits = Rc::new(Cell::new(0));
    registry
        .register(
            SingletonDescriptor::new("Clock", Rc::clone(&hits)).on_tick(|this, _| async move {
                this.set(this.get() + 1);
                Ok(())
            }),
        )
        .unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry, host.clone());

    LocalSet::new()
        .run_until(async {
            orchestrator.startup().await.unwrap();
            for expected in 1..=3 {
                assert!(host.frames().fire(FramePhase::PostSimulation, 0.1));
                assert_eq!(hits.get(), expected);
            }
        })
        .await;

    let bindings = orchestrator.bindings();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].contexts_spawned, 1);
}

#[tokio::test]
async fn test_singleton_hooks_run_before_the_step_returns() {
    let (host, registry) = setup(ExecutionRole::Client);
    let journal: Journal = Rc::default();
    for (name, phase) in [("Physics", "physics"), ("Camera", "render")] {
        let journal = Rc::clone(&journal);
        let descriptor = SingletonDescriptor::new(name, ());
        let descriptor = if phase == "physics" {
            descriptor.on_physics(move |_, _| {
                journal.borrow_mut().push(format!("{name}:{phase}"));
                async { Ok(()) }
            })
        } else {
            descriptor.on_render(move |_, _| {
                journal.borrow_mut().push(format!("{name}:{phase}"));
                async { Ok(()) }
            })
        };
        registry.register(descriptor).unwrap();
    }
    let orchestrator = LifecycleOrchestrator::new(registry, host.clone());

    LocalSet::new()
        .run_until(async {
            orchestrator.startup().await.unwrap();
            host.step(0.016);
            assert_eq!(*journal.borrow(), vec!["Physics:physics", "Camera:render"]);
            host.step(0.016);
            assert_eq!(journal.borrow().len(), 4);
        })
        .await;

    assert!(orchestrator
        .bindings()
        .iter()
        .all(|binding| binding.contexts_spawned == 1));
}

#[tokio::test]
async fn test_frame_hook_failure_is_contained() {
    let (host, registry) = setup(ExecutionRole::Server);
    let ticks = Rc::new(Cell::new(0));
    registry
        .register(
            SingletonDescriptor::new("Flaky", Rc::clone(&ticks)).on_tick(|this, _| async move {
                this.set(this.get() + 1);
                if this.get() == 1 {
                    panic!("first tick fails");
                }
                Ok(())
            }),
        )
        .unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry, host.clone());

    LocalSet::new()
        .run_until(async {
            orchestrator.startup().await.unwrap();
            host.run_frame(1.0).await;
            host.run_frame(1.0).await;
        })
        .await;

    assert_eq!(ticks.get(), 2);
}

#[tokio::test]
async fn test_init_resolves_peers_lazily() {
    let (host, registry) = setup(ExecutionRole::Server);
    registry.add_source(Rc::new(SingletonTable::new().with("Inventory", || {
        SingletonDescriptor::new("Inventory", Cell::new(12_u32)).build()
    })));
    let seen = Rc::new(Cell::new(0_u32));
    registry
        .register(
            SingletonDescriptor::new("Shop", Rc::clone(&seen)).on_init(|this, peers| async move {
                let inventory = peers
                    .get::<Cell<u32>>("Inventory")
                    .ok_or_else(|| anyhow::anyhow!("no inventory"))?;
                this.set(inventory.get());
                Ok(())
            }),
        )
        .unwrap();
    let orchestrator = LifecycleOrchestrator::new(registry.clone(), host);

    let report = LocalSet::new()
        .run_until(async { orchestrator.startup().await.unwrap() })
        .await;

    assert!(report.is_clean());
    assert_eq!(seen.get(), 12);
    assert!(registry.contains("Inventory"));
}

#[tokio::test]
async fn test_late_subscriber_receives_existing_producers_at_startup() {
    let (host, registry) = setup(ExecutionRole::Server);
    registry
        .register(SingletonDescriptor::new("Lobby", ()).on("onPlayerJoined", |_, _| async { Ok(()) }))
        .unwrap();
    let heard: Journal = Rc::default();
    {
        let heard = Rc::clone(&heard);
        registry
            .listeners()
            .subscribe("onPlayerJoined", move |producer, topic| {
                heard
                    .borrow_mut()
                    .push(format!("{}:{topic}", producer.name()));
            });
    }
    assert!(heard.borrow().is_empty());

    let orchestrator = LifecycleOrchestrator::new(registry.clone(), host);
    LocalSet::new()
        .run_until(async { orchestrator.startup().await.unwrap() })
        .await;
    assert_eq!(*heard.borrow(), vec!["Lobby:onPlayerJoined"]);

    registry
        .register(SingletonDescriptor::new("Arena", ()).on("onPlayerJoined", |_, _| async { Ok(()) }))
        .unwrap();
    assert_eq!(heard.borrow().len(), 2);
}

#[tokio::test]
async fn test_singleton_registered_after_startup_still_ticks() {
    let (host, registry) = setup(ExecutionRole::Server);
    let orchestrator = LifecycleOrchestrator::new(registry.clone(), host.clone());
    let ticks = Rc::new(Cell::new(0));

    LocalSet::new()
        .run_until(async {
            let report = orchestrator.startup().await.unwrap();
            assert_eq!(report.frame_bindings, 0);

            let init_ran = Rc::new(Cell::new(false));
            registry
                .register(
                    SingletonDescriptor::new("Late", Rc::clone(&ticks))
                        .on_init({
                            let init_ran = Rc::clone(&init_ran);
                            move |_, _| {
                                init_ran.set(true);
                                async { Ok(()) }
                            }
                        })
                        .on_physics(|this, _| async move {
                            this.set(this.get() + 1);
                            Ok(())
                        }),
                )
                .unwrap();
            host.run_frame(0.1).await;
            assert!(!init_ran.get());
        })
        .await;

    assert_eq!(ticks.get(), 1);
}

#[tokio::test]
async fn test_profiler_receives_frame_samples() {
    let (host, registry) = setup(ExecutionRole::Server);
    registry
        .register(SingletonDescriptor::new("Clock", ()).on_tick(|_, _| async { Ok(()) }))
        .unwrap();
    let (sink, samples) = ProfileSink::bounded(16);
    let orchestrator = LifecycleOrchestrator::new(registry, host.clone()).with_profiler(sink);

    LocalSet::new()
        .run_until(async {
            orchestrator.startup().await.unwrap();
            host.run_frame(0.25).await;
        })
        .await;

    let labels: Vec<String> = samples.try_iter().map(|sample| sample.label).collect();
    assert_eq!(labels, vec!["Clock::onTick".to_string()]);
}
