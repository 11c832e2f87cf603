use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::v3::{Report, ReportClass};

/// A subscriber callback
///
/// Callbacks run on the session's read-loop task, one after another, so
/// they must return quickly and hand heavier work to a channel or task of
/// their own.
pub type ReportCallback = Arc<dyn Fn(&Report) + Send + Sync>;

/// Class-keyed callback registry
///
/// Callbacks for one class fire in the order they were registered. There
/// is no removal; the registry lives as long as its session.
#[derive(Default, Clone)]
pub struct Subscribers {
    callbacks: HashMap<ReportClass, Vec<ReportCallback>>,
}

impl Subscribers {
    /// Appends `callback` to the list for `class`
    pub fn subscribe(&mut self, class: ReportClass, callback: ReportCallback) {
        self.callbacks.entry(class).or_default().push(callback);
    }

    /// Appends `callback` to every class that already has a subscriber
    ///
    /// Classes first subscribed to after this call do not receive it.
    pub fn subscribe_all(&mut self, callback: ReportCallback) {
        for callbacks in self.callbacks.values_mut() {
            callbacks.push(Arc::clone(&callback));
        }
    }

    /// Whether anything would receive a report of this class
    pub fn contains(&self, class: ReportClass) -> bool {
        self.callbacks
            .get(&class)
            .is_some_and(|callbacks| !callbacks.is_empty())
    }

    /// Invokes every callback registered for the report's class, in order
    ///
    /// Returns how many callbacks ran.
    pub fn deliver(&self, report: &Report) -> usize {
        let Some(callbacks) = self.callbacks.get(&report.class()) else {
            return 0;
        };
        for callback in callbacks {
            callback(report);
        }
        callbacks.len()
    }

    /// Classes with at least one subscriber
    pub fn classes(&self) -> impl Iterator<Item = ReportClass> + '_ {
        self.callbacks.keys().copied()
    }
}

impl core::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (class, callbacks) in &self.callbacks {
            map.entry(class, &callbacks.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::protocol::v3::response::{Error, Tpv};

    fn tpv() -> Report {
        Report::decode(ReportClass::Tpv, br#"{"class":"TPV","mode":2}"#).unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> ReportCallback {
        let log = Arc::clone(log);
        Arc::new(move |_report: &Report| log.lock().unwrap().push(name))
    }

    #[test]
    fn test_deliver_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subscribers = Subscribers::default();
        subscribers.subscribe(ReportClass::Tpv, recorder(&log, "A"));
        subscribers.subscribe(ReportClass::Tpv, recorder(&log, "B"));
        subscribers.subscribe(ReportClass::Tpv, recorder(&log, "C"));

        assert_eq!(subscribers.deliver(&tpv()), 3);
        assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
    }

    #[test]
    fn test_deliver_only_to_matching_class() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subscribers = Subscribers::default();
        subscribers.subscribe(ReportClass::Sky, recorder(&log, "sky"));

        assert_eq!(subscribers.deliver(&tpv()), 0);
        assert!(log.lock().unwrap().is_empty());
        assert!(subscribers.contains(ReportClass::Sky));
        assert!(!subscribers.contains(ReportClass::Tpv));
    }

    #[test]
    fn test_callback_sees_decoded_report() {
        let seen: Arc<Mutex<Option<Tpv>>> = Arc::default();
        let mut subscribers = Subscribers::default();
        let sink = Arc::clone(&seen);
        subscribers.subscribe(
            ReportClass::Tpv,
            Arc::new(move |report: &Report| {
                if let Report::Tpv(tpv) = report {
                    *sink.lock().unwrap() = Some(tpv.clone());
                }
            }),
        );

        subscribers.deliver(&tpv());
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_ref().map(|tpv| tpv.mode),
            Some(crate::protocol::v3::types::FixMode::Fix2D)
        );
    }

    #[test]
    fn test_subscribe_all_attaches_to_existing_classes_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subscribers = Subscribers::default();
        subscribers.subscribe_all(recorder(&log, "early"));
        subscribers.subscribe(ReportClass::Tpv, recorder(&log, "tpv"));
        subscribers.subscribe_all(recorder(&log, "all"));
        subscribers.subscribe(ReportClass::Error, recorder(&log, "error"));

        subscribers.deliver(&tpv());
        subscribers.deliver(&Report::Error(Error {
            message: "boom".into(),
        }));

        assert_eq!(*log.lock().unwrap(), ["tpv", "all", "error"]);
    }

    #[test]
    fn test_classes_lists_subscribed_classes() {
        let mut subscribers = Subscribers::default();
        subscribers.subscribe(ReportClass::Pps, Arc::new(|_: &Report| {}));
        subscribers.subscribe(ReportClass::Gst, Arc::new(|_: &Report| {}));

        let mut classes: Vec<_> = subscribers.classes().collect();
        classes.sort();
        assert_eq!(classes, [ReportClass::Gst, ReportClass::Pps]);
        assert_eq!(format!("{subscribers:?}").matches(": 1").count(), 2);
    }
}
