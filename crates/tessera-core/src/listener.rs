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

//! The deferred listener registry: a broadcast hub for lifecycle topics.
//!
//! Subscribers and producers of a topic may arrive in any order. Every
//! subscriber sees every producer of its topic exactly once:
//!
//! - a producer published while subscribers exist is delivered to them
//!   synchronously, inside [`ListenerRegistry::publish`];
//! - a subscriber added after producers already exist has those producers
//!   queued and delivered on the next scheduling tick, i.e. the next call to
//!   [`ListenerRegistry::flush`], never inline inside `subscribe`.
//!
//! Producers are always recorded, so later subscribers still catch up. There
//! is no unsubscribe.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Callback invoked with a producer and the topic it produced.
pub type Subscriber<P> = Rc<dyn Fn(&P, &str)>;

struct Topic<P> {
    subscribers: Vec<Subscriber<P>>,
    producers: Vec<P>,
}

impl<P> Default for Topic<P> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            producers: Vec::new(),
        }
    }
}

struct Delivery<P> {
    subscriber: Subscriber<P>,
    producer: P,
    topic: String,
}

/// Central broadcast hub reconciling topic subscribers with topic producers.
pub struct ListenerRegistry<P: Clone + 'static> {
    topics: RefCell<HashMap<String, Topic<P>>>,
    deferred: RefCell<VecDeque<Delivery<P>>>,
}

impl<P: Clone + 'static> ListenerRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            topics: RefCell::new(HashMap::new()),
            deferred: RefCell::new(VecDeque::new()),
        }
    }

    /// Registers interest in `topic`.
    ///
    /// Producers that already exist are queued for delivery on the next
    /// [`flush`](Self::flush). Future producers are delivered as they publish.
    pub fn subscribe(&self, topic: &str, callback: impl Fn(&P, &str) + 'static) {
        let subscriber: Subscriber<P> = Rc::new(callback);
        let mut topics = self.topics.borrow_mut();
        let entry = topics.entry(topic.to_string()).or_default();

        if !entry.producers.is_empty() {
            let mut deferred = self.deferred.borrow_mut();
            for producer in &entry.producers {
                deferred.push_back(Delivery {
                    subscriber: Rc::clone(&subscriber),
                    producer: producer.clone(),
                    topic: topic.to_string(),
                });
            }
            log::trace!(
                "ListenerRegistry: deferred {} existing producer(s) of '{}'",
                entry.producers.len(),
                topic
            );
        }

        entry.subscribers.push(subscriber);
    }

    /// Announces that `producer` provides `topic`.
    ///
    /// Current subscribers are called synchronously, in subscription order.
    pub fn publish(&self, producer: P, topic: &str) {
        let subscribers: Vec<Subscriber<P>> = {
            let mut topics = self.topics.borrow_mut();
            let entry = topics.entry(topic.to_string()).or_default();
            entry.producers.push(producer.clone());
            entry.subscribers.clone()
        };

        if subscribers.is_empty() {
            log::trace!("ListenerRegistry: buffered producer for '{topic}'");
        }

        for subscriber in subscribers {
            subscriber(&producer, topic);
        }
    }

    /// Delivers every queued producer to its late subscriber.
    ///
    /// Deliveries queued while flushing are delivered in the same call.
    /// Returns how many deliveries were made.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            // The queue borrow is released before the callback runs so the
            // callback may subscribe or publish.
            let next = self.deferred.borrow_mut().pop_front();
            let Some(delivery) = next else {
                break;
            };
            (delivery.subscriber)(&delivery.producer, &delivery.topic);
            delivered += 1;
        }
        delivered
    }

    /// Number of deliveries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Producers recorded for `topic`, in publish order.
    pub fn producers(&self, topic: &str) -> Vec<P> {
        self.topics
            .borrow()
            .get(topic)
            .map(|entry| entry.producers.clone())
            .unwrap_or_default()
    }

    /// Number of subscribers registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .borrow()
            .get(topic)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Every topic seen so far, sorted by name.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<P: Clone + 'static> Default for ListenerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<(String, String)>>>, impl Fn(&String, &str) + Clone) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        (seen, move |producer: &String, topic: &str| {
            s.borrow_mut().push((producer.clone(), topic.to_string()))
        })
    }

    #[test]
    fn test_subscriber_before_producer_gets_sync_delivery() {
        let registry = ListenerRegistry::<String>::new();
        let (seen, callback) = recorder();

        registry.subscribe("onPlayerJoined", callback);
        assert!(seen.borrow().is_empty());

        registry.publish("Scoreboard".to_string(), "onPlayerJoined");
        assert_eq!(
            *seen.borrow(),
            vec![("Scoreboard".to_string(), "onPlayerJoined".to_string())]
        );
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_subscriber_after_producer_is_deferred_to_flush() {
        let registry = ListenerRegistry::<String>::new();
        let (seen, callback) = recorder();

        registry.publish("A".to_string(), "onTick");
        registry.publish("B".to_string(), "onTick");
        registry.subscribe("onTick", callback);

        assert!(seen.borrow().is_empty(), "delivery must not be inline");
        assert_eq!(registry.pending(), 2);

        assert_eq!(registry.flush(), 2);
        let names: Vec<String> = seen.borrow().iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(registry.flush(), 0);
    }

    #[test]
    fn test_each_subscriber_sees_each_producer_once() {
        let registry = ListenerRegistry::<String>::new();
        let (seen, callback) = recorder();

        registry.publish("Early".to_string(), "onX");
        registry.subscribe("onX", callback);
        registry.publish("Late".to_string(), "onX");
        registry.flush();

        let mut names: Vec<String> = seen.borrow().iter().map(|(p, _)| p.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["Early", "Late"]);
    }

    #[test]
    fn test_topics_are_independent() {
        let registry = ListenerRegistry::<String>::new();
        let (seen, callback) = recorder();

        registry.subscribe("onA", callback);
        registry.publish("X".to_string(), "onB");
        registry.flush();

        assert!(seen.borrow().is_empty());
        assert_eq!(registry.producers("onB"), vec!["X".to_string()]);
        assert_eq!(registry.subscriber_count("onA"), 1);
        assert_eq!(registry.topics(), vec!["onA".to_string(), "onB".to_string()]);
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        let registry = Rc::new(ListenerRegistry::<String>::new());
        registry.publish("First".to_string(), "onOuter");

        let inner = Rc::clone(&registry);
        registry.subscribe("onOuter", move |producer, _| {
            inner.publish(format!("{producer}-child"), "onInner");
        });
        registry.flush();

        assert_eq!(registry.producers("onInner"), vec!["First-child".to_string()]);
    }
}
