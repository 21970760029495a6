use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// A state change that listeners can be told about
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// The entity that changed, e.g. a configuration name
    pub entity: String,
    /// The attribute within the entity, e.g. an item identifier
    pub attribute: String,
    /// The value after the change
    pub value: Value,
}

type Callback = dyn Fn(&ChangeEvent) + Send + Sync;

/// Keeps a subscription's callback alive. Dropping the handle is the only
/// way to unsubscribe; the hub itself never extends a callback's lifetime.
pub struct Subscription {
    _callback: Arc<Callback>,
}

#[derive(PartialEq, Eq, Hash)]
struct Topic {
    entity: String,
    /// `None` subscribes to every attribute of the entity
    attribute: Option<String>,
}

/// Publish/subscribe hub for change events.
///
/// Subscribers are held weakly: a dropped [`Subscription`] disappears from
/// the hub on the next publish to its topic. Callbacks run outside the hub
/// lock, so a listener may subscribe or publish reentrantly.
#[derive(Default)]
pub struct ChangeHub {
    topics: Mutex<HashMap<Topic, Vec<Weak<Callback>>>>,
}

impl ChangeHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of one attribute, or of every attribute of the
    /// entity when `attribute` is `None`.
    ///
    /// The subscription lasts as long as the returned handle.
    pub fn subscribe(
        &self,
        entity: impl Into<String>,
        attribute: Option<&str>,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let callback: Arc<Callback> = Arc::new(callback);
        let topic = Topic {
            entity: entity.into(),
            attribute: attribute.map(str::to_string),
        };
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic)
            .or_default()
            .push(Arc::downgrade(&callback));
        Subscription {
            _callback: callback,
        }
    }

    /// Deliver an event to the attribute's subscribers and to the entity's
    /// wildcard subscribers. Dead subscriptions are pruned on the way.
    pub fn publish(&self, event: &ChangeEvent) {
        let mut live = Vec::new();
        {
            let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
            for attribute in [Some(event.attribute.clone()), None] {
                let topic = Topic {
                    entity: event.entity.clone(),
                    attribute,
                };
                if let Some(subscribers) = topics.get_mut(&topic) {
                    subscribers.retain(|weak| match weak.upgrade() {
                        Some(callback) => {
                            live.push(callback);
                            true
                        }
                        None => false,
                    });
                    if subscribers.is_empty() {
                        topics.remove(&topic);
                    }
                }
            }
        }
        // Outside the lock: listeners may call back into the hub.
        for callback in live {
            callback(event);
        }
    }

    /// Number of live subscriptions to one topic
    #[cfg(test)]
    fn subscriber_count(&self, entity: &str, attribute: Option<&str>) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .get(&Topic {
                entity: entity.to_string(),
                attribute: attribute.map(str::to_string),
            })
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|weak| weak.strong_count() > 0)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(attribute: &str, value: Value) -> ChangeEvent {
        ChangeEvent {
            entity: "preferences".to_string(),
            attribute: attribute.to_string(),
            value,
        }
    }

    #[test]
    fn test_attribute_subscription_receives_matching_events() {
        let hub = ChangeHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = hub.subscribe("preferences", Some("language"), move |event| {
            sink.lock().unwrap().push(event.value.clone());
        });

        hub.publish(&event("language", json!("common")));
        hub.publish(&event("volume", json!(11)));

        assert_eq!(*seen.lock().unwrap(), vec![json!("common")]);
    }

    #[test]
    fn test_wildcard_subscription_receives_all_attributes() {
        let hub = ChangeHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = hub.subscribe("preferences", None, move |event| {
            sink.lock().unwrap().push(event.attribute.clone());
        });

        hub.publish(&event("language", json!("common")));
        hub.publish(&event("volume", json!(11)));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["language".to_string(), "volume".to_string()]
        );
    }

    #[test]
    fn test_dropped_subscription_stops_delivery() {
        let hub = ChangeHub::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let subscription = hub.subscribe("preferences", Some("language"), move |_| {
            *sink.lock().unwrap() += 1;
        });

        hub.publish(&event("language", json!("first")));
        drop(subscription);
        hub.publish(&event("language", json!("second")));

        assert_eq!(*seen.lock().unwrap(), 1);
        // The dead entry is pruned and the empty topic removed.
        assert_eq!(hub.subscriber_count("preferences", Some("language")), 0);
    }

    #[test]
    fn test_other_entity_not_notified() {
        let hub = ChangeHub::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let _subscription = hub.subscribe("other", None, move |_| {
            *sink.lock().unwrap() += 1;
        });

        hub.publish(&event("language", json!("common")));
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_reentrant_subscribe_from_callback() {
        let hub = Arc::new(ChangeHub::new());
        let inner_hub = Arc::clone(&hub);
        let held = Arc::new(Mutex::new(Vec::new()));
        let held_sink = Arc::clone(&held);
        let _subscription = hub.subscribe("preferences", None, move |_| {
            // Would deadlock if callbacks ran under the hub lock.
            let extra = inner_hub.subscribe("preferences", Some("late"), |_| {});
            held_sink.lock().unwrap().push(extra);
        });

        hub.publish(&event("language", json!("common")));
        assert_eq!(hub.subscriber_count("preferences", Some("late")), 1);
    }
}
