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

//! Attachment engine tests against the in-memory host.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tessera_core::{
    AttributeStore, AttributeValue, ConfigError, EmptyLookup, ExecutionRole, FramePhase,
    HookResult, MetadataStore, RuntimeError, SingletonLookup, TagIndex,
};
use tessera_data::{Component, ComponentDescriptor, ComponentRegistry, Instance};
use tessera_infra::MemoryHost;

type Journal = Rc<RefCell<Vec<String>>>;

fn setup(role: ExecutionRole) -> (Rc<MemoryHost>, ComponentRegistry) {
    let host = Rc::new(MemoryHost::new(role));
    let registry = ComponentRegistry::new(host.clone(), role, Rc::new(MetadataStore::new()), true);
    (host, registry)
}

fn start(registry: &ComponentRegistry) {
    registry.start(Rc::new(EmptyLookup)).unwrap();
}

struct Recorder {
    journal: Journal,
}

impl Recorder {
    fn note(&self, instance: &Instance, what: &str) {
        self.journal
            .borrow_mut()
            .push(format!("{}:{}:{what}", instance.tag(), instance.entity().index));
    }
}

impl Component for Recorder {
    fn on_start(&mut self, instance: &Instance, _: &dyn SingletonLookup) -> HookResult {
        self.note(instance, "start");
        Ok(())
    }

    fn on_attribute_changed(
        &mut self,
        instance: &Instance,
        key: &str,
        value: Option<&AttributeValue>,
    ) -> HookResult {
        let shown = value.map(|v| v.to_string()).unwrap_or_default();
        self.note(instance, &format!("{key}={shown}"));
        Ok(())
    }

    fn on_post_simulation(&mut self, instance: &Instance, _dt: f64) -> HookResult {
        self.note(instance, "tick");
        Ok(())
    }

    fn destroy(&mut self, instance: &Instance) -> HookResult {
        self.note(instance, "destroy");
        Ok(())
    }
}

fn recorder(tag: &str, journal: &Journal) -> ComponentDescriptor {
    let journal = Rc::clone(journal);
    ComponentDescriptor::new(tag, move |_| {
        Ok(Recorder {
            journal: Rc::clone(&journal),
        })
    })
}

#[test]
fn test_existing_entities_attach_on_start_in_discovery_order() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    let a = host.spawn();
    let b = host.spawn();
    host.add_tag(b, "Door");
    host.add_tag(a, "Door");

    registry.register(recorder("Door", &journal)).unwrap();
    assert_eq!(registry.active_count("Door"), 0);

    start(&registry);

    assert_eq!(registry.instances_of("Door"), vec![b, a]);
    assert_eq!(*journal.borrow(), vec!["Door:1:start", "Door:0:start"]);
}

#[test]
fn test_reattach_while_active_is_a_noop() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry.register(recorder("Door", &journal)).unwrap();
    start(&registry);

    let door = host.spawn();
    host.add_tag(door, "Door");
    assert!(registry.attach("Door", door));
    assert!(registry.attach("Door", door));

    assert_eq!(registry.active_count("Door"), 1);
    assert_eq!(*journal.borrow(), vec!["Door:0:start"]);
}

#[test]
fn test_guard_rejection_never_activates() {
    let (host, registry) = setup(ExecutionRole::Server);
    let built = Rc::new(Cell::new(0));
    let b = Rc::clone(&built);
    registry
        .register(
            ComponentDescriptor::new("Turret", move |_| {
                b.set(b.get() + 1);
                Ok(tessera_data::Passive)
            })
            .with_guard(|entity, host| host.has_tag(entity, "Armed")),
        )
        .unwrap();
    start(&registry);

    let unarmed = host.spawn();
    host.add_tag(unarmed, "Turret");
    assert_eq!(registry.active_count("Turret"), 0);
    assert_eq!(built.get(), 0);

    let armed = host.spawn();
    host.add_tag(armed, "Armed");
    host.add_tag(armed, "Turret");
    assert_eq!(registry.instances_of("Turret"), vec![armed]);
    assert_eq!(built.get(), 1);
}

#[test]
fn test_ancestor_scopes_restrict_attachment() {
    let (host, registry) = setup(ExecutionRole::Server);
    let workspace = host.spawn();
    let storage = host.spawn();
    let inside = host.spawn_child(workspace);
    let deep = host.spawn_child(inside);
    let outside = host.spawn_child(storage);

    registry
        .register(
            ComponentDescriptor::passive("Pickup")
                .with_ancestor(workspace)
                .ignore_flags(),
        )
        .unwrap();
    start(&registry);

    for entity in [inside, deep, outside] {
        host.add_tag(entity, "Pickup");
    }
    assert_eq!(registry.instances_of("Pickup"), vec![inside, deep]);
}

#[test]
fn test_defaults_fill_missing_attributes_only() {
    let (host, registry) = setup(ExecutionRole::Server);
    let entity = host.spawn();
    host.set_attribute(entity, "speed", 4.into());

    registry
        .register(
            ComponentDescriptor::passive("Mover")
                .with_default("speed", 1)
                .with_default("label", "crate"),
        )
        .unwrap();
    start(&registry);
    host.add_tag(entity, "Mover");

    assert_eq!(host.get_attribute(entity, "speed"), Some(4.into()));
    assert_eq!(host.get_attribute(entity, "label"), Some("crate".into()));

    let instance = registry.instance("Mover", entity).unwrap();
    assert_eq!(instance.attributes().number("speed").unwrap(), Some(4.0));
}

#[test]
fn test_attribute_round_trip() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry
        .register(recorder("Lamp", &journal).with_default("lit", false))
        .unwrap();
    start(&registry);

    let lamp = host.spawn();
    host.add_tag(lamp, "Lamp");
    let instance = registry.instance("Lamp", lamp).unwrap();

    instance.attributes().set("lit", true).unwrap();
    assert_eq!(host.get_attribute(lamp, "lit"), Some(true.into()));

    host.set_attribute(lamp, "lit", false.into());
    assert_eq!(instance.attributes().get("lit").unwrap(), Some(false.into()));

    assert_eq!(
        *journal.borrow(),
        vec!["Lamp:0:start", "Lamp:0:lit=true", "Lamp:0:lit=false"]
    );
}

#[test]
fn test_keys_added_from_outside_after_attach_are_mirrored() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry.register(recorder("Door", &journal)).unwrap();
    start(&registry);

    let door = host.spawn();
    host.add_tag(door, "Door");
    let instance = registry.instance("Door", door).unwrap();
    assert_eq!(instance.attributes().get("open").unwrap(), None);

    host.set_attribute(door, "open", true.into());
    assert_eq!(instance.attributes().get("open").unwrap(), Some(true.into()));
    host.set_attribute(door, "open", false.into());
    host.remove_attribute(door, "open");
    assert_eq!(instance.attributes().get("open").unwrap(), None);

    assert_eq!(
        *journal.borrow(),
        vec!["Door:0:start", "Door:0:open=true", "Door:0:open=false", "Door:0:open="]
    );

    assert!(host.remove_tag(door, "Door"));
    assert_eq!(host.attribute_signal_count(), 0);
}

#[test]
fn test_teardown_releases_subscriptions_and_is_idempotent() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry
        .register(recorder("Lamp", &journal).with_default("lit", false))
        .unwrap();
    start(&registry);

    let lamp = host.spawn();
    host.add_tag(lamp, "Lamp");
    let instance = registry.instance("Lamp", lamp).unwrap();

    assert!(host.remove_tag(lamp, "Lamp"));
    assert!(!registry.detach("Lamp", lamp));
    host.set_attribute(lamp, "lit", true.into());

    assert_eq!(*journal.borrow(), vec!["Lamp:0:start", "Lamp:0:destroy"]);
    assert_eq!(registry.active_count("Lamp"), 0);
    assert!(instance.attributes().get("lit").is_err());
    assert!(instance.attributes().set("lit", false).is_err());
}

#[test]
fn test_frame_hooks_only_for_declared_phases_and_isolated() {
    struct Faulty;
    impl Component for Faulty {
        fn on_post_simulation(&mut self, _: &Instance, _: f64) -> HookResult {
            Err(anyhow::anyhow!("jammed"))
        }
    }

    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry
        .register(
            ComponentDescriptor::new("Faulty", |_| Ok(Faulty))
                .on_phase(FramePhase::PostSimulation)
                .with_load_order(0),
        )
        .unwrap();
    registry
        .register(recorder("Ticker", &journal).on_phase(FramePhase::PostSimulation))
        .unwrap();
    registry.register(recorder("Silent", &journal)).unwrap();
    start(&registry);

    let entity = host.spawn();
    for tag in ["Faulty", "Ticker", "Silent"] {
        host.add_tag(entity, tag);
    }
    journal.borrow_mut().clear();

    host.step(0.016);
    host.step(0.016);

    assert_eq!(*journal.borrow(), vec!["Ticker:0:tick", "Ticker:0:tick"]);
    assert_eq!(registry.active_count("Faulty"), 1);
}

#[test]
fn test_components_enumerate_by_load_order() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    let entity = host.spawn();
    for tag in ["Late", "Early", "Unordered"] {
        host.add_tag(entity, tag);
    }

    registry.register(recorder("Unordered", &journal)).unwrap();
    registry
        .register(recorder("Late", &journal).with_load_order(5))
        .unwrap();
    registry
        .register(recorder("Early", &journal).with_load_order(1))
        .unwrap();
    start(&registry);

    assert_eq!(registry.tags(), vec!["Early", "Late", "Unordered"]);
    assert_eq!(
        *journal.borrow(),
        vec!["Early:0:start", "Late:0:start", "Unordered:0:start"]
    );
}

#[test]
fn test_registration_after_start_attaches_immediately() {
    let (host, registry) = setup(ExecutionRole::Server);
    start(&registry);
    let entity = host.spawn();
    host.add_tag(entity, "Late");

    registry.register(ComponentDescriptor::passive("Late")).unwrap();
    assert_eq!(registry.instances_of("Late"), vec![entity]);
}

#[test]
fn test_configuration_errors() {
    let (_host, registry) = setup(ExecutionRole::Server);
    registry.register(ComponentDescriptor::passive("Door")).unwrap();

    assert_eq!(
        registry.register(ComponentDescriptor::passive("Door").ignore_flags()),
        Err(ConfigError::DuplicateComponent("Door".into()))
    );
    assert_eq!(
        registry.register(ComponentDescriptor::passive("")),
        Err(ConfigError::EmptyIdentity { kind: "component" })
    );
    assert!(matches!(
        registry.register(ComponentDescriptor::passive("Hud").on_phase(FramePhase::PreRender)),
        Err(ConfigError::RoleRestrictedHook { .. })
    ));
}

#[test]
fn test_render_phase_allowed_on_client() {
    let (_host, registry) = setup(ExecutionRole::Client);
    assert!(registry
        .register(ComponentDescriptor::passive("Hud").on_phase(FramePhase::PreRender))
        .is_ok());
}

#[test]
fn test_double_start_fails() {
    let (_host, registry) = setup(ExecutionRole::Server);
    start(&registry);
    assert_eq!(
        registry.start(Rc::new(EmptyLookup)),
        Err(RuntimeError::AlreadyStarted)
    );
}

#[test]
fn test_on_start_sees_singletons() {
    struct Table;
    impl SingletonLookup for Table {
        fn find(&self, name: &str) -> Option<Rc<dyn Any>> {
            (name == "Score").then(|| Rc::new(Cell::new(3_u32)) as Rc<dyn Any>)
        }
        fn names(&self) -> Vec<String> {
            vec!["Score".into()]
        }
    }

    struct Reader(Rc<Cell<u32>>);
    impl Component for Reader {
        fn on_start(&mut self, _: &Instance, singletons: &dyn SingletonLookup) -> HookResult {
            let score = singletons
                .get::<Cell<u32>>("Score")
                .ok_or_else(|| anyhow::anyhow!("no score"))?;
            self.0.set(score.get());
            Ok(())
        }
    }

    let (host, registry) = setup(ExecutionRole::Server);
    let seen = Rc::new(Cell::new(0));
    let s = Rc::clone(&seen);
    registry
        .register(ComponentDescriptor::new("Reader", move |_| Ok(Reader(Rc::clone(&s)))))
        .unwrap();
    registry.start(Rc::new(Table)).unwrap();
    let entity = host.spawn();
    host.add_tag(entity, "Reader");

    assert_eq!(seen.get(), 3);
}

#[test]
fn test_shutdown_tears_everything_down() {
    let (host, registry) = setup(ExecutionRole::Server);
    let journal = Journal::default();
    registry.register(recorder("Door", &journal)).unwrap();
    start(&registry);
    let door = host.spawn();
    host.add_tag(door, "Door");

    registry.shutdown();
    assert!(!registry.is_running());
    assert_eq!(registry.active_count("Door"), 0);

    let other = host.spawn();
    host.add_tag(other, "Door");
    assert_eq!(registry.active_count("Door"), 0);
    assert_eq!(*journal.borrow(), vec!["Door:0:start", "Door:0:destroy"]);
}

#[test]
fn test_failed_constructor_leaves_entity_unattached() {
    let (host, registry) = setup(ExecutionRole::Server);
    registry
        .register(ComponentDescriptor::new("Broken", |_| -> anyhow::Result<tessera_data::Passive> {
            Err(anyhow::anyhow!("no parts"))
        }))
        .unwrap();
    start(&registry);
    let entity = host.spawn();
    host.add_tag(entity, "Broken");

    assert_eq!(registry.active_count("Broken"), 0);
    assert_eq!(host.attribute_changed(entity, "anything").connection_count(), 0);
}
