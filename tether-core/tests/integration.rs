//! Integration Tests for the Instance Binder
//!
//! These tests drive binders the way a host renderer does: render passes
//! call `bind`, committed effects call `register_interest` and
//! `release_interest`, and microtask checkpoints run between tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_core::binder::{Factory, Interest, Lifecycle, RecordState, Scalar};
use tether_core::reactive::{Scope, Signal};
use tether_core::scheduler::Microtasks;
use tether_core::{teardown_all, BinderConfig, BoxError, Deferral, Error, InstanceBinder};

#[derive(Default)]
struct Tally {
    constructed: AtomicUsize,
    mounted: AtomicUsize,
    disposed: AtomicUsize,
}

impl Tally {
    fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    fn mounted(&self) -> usize {
        self.mounted.load(Ordering::SeqCst)
    }

    fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// A molecule factory: every instance is a scope counting its own
/// transitions into `tally`.
fn molecule(tally: &Arc<Tally>) -> Factory<Scope, Scalar<i32>> {
    let tally = Arc::clone(tally);
    Factory::infallible(move |Scalar(_)| {
        tally.constructed.fetch_add(1, Ordering::SeqCst);
        let scope = Scope::new();

        let on_mount = Arc::clone(&tally);
        scope.on_mount(move || {
            on_mount.mounted.fetch_add(1, Ordering::SeqCst);
        });
        let on_dispose = Arc::clone(&tally);
        scope.on_dispose(move || {
            on_dispose.disposed.fetch_add(1, Ordering::SeqCst);
        });

        scope
    })
}

/// One call site inside a simulated host.
///
/// The host re-runs the effect whenever the rendered instance changes,
/// exactly as a dependency-keyed effect would.
struct CallSite<I: Lifecycle + 'static> {
    binder: InstanceBinder<I, Scalar<i32>>,
    rendered: Option<Arc<I>>,
    effect: Option<Interest<I>>,
}

impl<I: Lifecycle + 'static> CallSite<I> {
    fn new(config: BinderConfig) -> Self {
        Self {
            binder: InstanceBinder::with_config(config),
            rendered: None,
            effect: None,
        }
    }

    fn render(&mut self, factory: &Factory<I, Scalar<i32>>, arg: i32) -> Arc<I> {
        let instance = self.binder.bind(factory, Scalar(arg)).unwrap();
        self.rendered = Some(Arc::clone(&instance));
        instance
    }

    /// Commit the last render: clean up the previous effect if its
    /// dependency changed, then run setup.
    fn commit(&mut self) {
        let rendered = self.rendered.clone().unwrap();
        if let Some(effect) = self.effect.as_ref() {
            if Arc::ptr_eq(effect.instance(), &rendered) {
                return;
            }
        }
        self.cleanup();
        self.effect = Some(self.binder.register_interest(&rendered).unwrap());
    }

    /// Debug mode: setup, cleanup and setup again for a fresh commit.
    fn commit_replayed(&mut self) {
        self.commit();
        self.cleanup();
        self.commit();
    }

    fn cleanup(&mut self) {
        if let Some(effect) = self.effect.take() {
            self.binder.release_interest(effect).unwrap();
        }
    }

    fn unmount(&mut self) {
        self.cleanup();
        self.rendered = None;
    }
}

fn untracked() -> BinderConfig {
    BinderConfig::default().with_tracking(false)
}

#[test]
fn remount_then_unmount_disposes_each_instance_once() {
    let tally = Arc::new(Tally::default());
    let factory = molecule(&tally);
    let mut site = CallSite::new(untracked());

    let first = site.render(&factory, 1);
    site.commit();
    let again = site.render(&factory, 1);
    site.commit();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(tally.constructed(), 1);

    let second = site.render(&factory, 2);
    // The superseded instance is gone before the new one is returned.
    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    site.commit();
    assert_eq!(tally.mounted(), 2);

    site.unmount();
    assert!(!second.is_disposed());
    Microtasks::run_until_idle().unwrap();

    assert!(second.is_disposed());
    assert_eq!(tally.constructed(), 2);
    assert_eq!(tally.disposed(), 2);
}

#[test]
fn debug_replay_keeps_the_instance() {
    let tally = Arc::new(Tally::default());
    let factory = molecule(&tally);
    let mut site = CallSite::new(untracked());

    let instance = site.render(&factory, 1);
    site.commit_replayed();
    Microtasks::run_until_idle().unwrap();

    assert!(!instance.is_disposed());
    assert!(instance.is_mounted());
    assert_eq!(tally.mounted(), 1);
    assert_eq!(site.binder.subscriber_count(), 1);

    site.unmount();
    Microtasks::run_until_idle().unwrap();
    assert_eq!(tally.disposed(), 1);
}

#[test]
fn rapid_toggling_disposes_exactly_once() {
    let tally = Arc::new(Tally::default());
    let factory = molecule(&tally);
    let mut site = CallSite::new(untracked());

    let instance = site.render(&factory, 1);
    for _ in 0..5 {
        site.commit();
        site.cleanup();
    }
    assert_eq!(Microtasks::pending(), 5);

    Microtasks::run_until_idle().unwrap();
    assert!(instance.is_disposed());
    assert_eq!(tally.disposed(), 1);
    assert_eq!(tally.mounted(), 1);
}

#[test]
fn molecule_watch_survives_replay_with_one_subscription() {
    let count = Signal::new(0);
    let seen = Arc::new(AtomicUsize::new(0));

    let source = count.clone();
    let observer = Arc::clone(&seen);
    let factory: Factory<Scope, Scalar<i32>> = Factory::infallible(move |Scalar(_)| {
        let scope = Scope::new();
        let observer = Arc::clone(&observer);
        scope.watch(&source, move |_| {
            observer.fetch_add(1, Ordering::SeqCst);
        });
        scope
    });

    let mut site = CallSite::new(untracked());
    let instance = site.render(&factory, 0);

    // Changes during render are not observed.
    count.set(1);
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    site.commit_replayed();
    Microtasks::run_until_idle().unwrap();
    assert_eq!(count.subscriber_count(), 1);

    count.set(2);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    site.unmount();
    Microtasks::run_until_idle().unwrap();
    assert!(instance.is_disposed());
    assert_eq!(count.subscriber_count(), 0);
}

#[test]
fn immediate_deferral_skips_the_checkpoint() {
    let tally = Arc::new(Tally::default());
    let factory = molecule(&tally);
    let mut site = CallSite::new(untracked().with_deferral(Deferral::Immediate));

    site.render(&factory, 1);
    site.commit();
    site.unmount();

    assert_eq!(tally.disposed(), 1);
    assert_eq!(Microtasks::pending(), 0);
}

#[test]
fn teardown_all_retires_every_tracked_binder() {
    let tally = Arc::new(Tally::default());
    let factory = molecule(&tally);
    let mut left = CallSite::new(BinderConfig::default().with_label("left"));
    let mut right = CallSite::new(BinderConfig::default().with_label("right"));

    left.render(&factory, 1);
    left.commit();
    right.render(&factory, 2);
    right.commit();
    right.cleanup();
    assert_eq!(tether_core::binder::tracked_count(), 2);

    assert_eq!(teardown_all().unwrap(), 2);
    assert_eq!(tally.disposed(), 2);
    assert_eq!(tether_core::binder::tracked_count(), 0);

    // The deferred disposal queued by `right` finds nothing left to do.
    Microtasks::run_until_idle().unwrap();
    assert_eq!(tally.disposed(), 2);
}

#[test]
fn mount_failures_surface_from_register_interest() {
    struct Fragile {
        tally: Arc<Tally>,
    }

    impl Lifecycle for Fragile {
        fn mount(&self) -> Result<(), BoxError> {
            Err("no host attached".into())
        }

        fn unmount(&self) -> Result<(), BoxError> {
            panic!("unmount delivered for an instance that never mounted");
        }

        fn dispose(&self) -> Result<(), BoxError> {
            self.tally.disposed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let tally = Arc::new(Tally::default());
    let owned = Arc::clone(&tally);
    let factory: Factory<Fragile, Scalar<i32>> = Factory::infallible(move |_| Fragile {
        tally: Arc::clone(&owned),
    });
    let binder = InstanceBinder::with_config(untracked());
    let instance = binder.bind(&factory, Scalar(0)).unwrap();

    let err = binder.register_interest(&instance).unwrap_err();
    assert!(matches!(err, Error::Mount(_)));
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("no host attached"));

    // The failed registration holds nothing, and the record drains.
    assert_eq!(binder.subscriber_count(), 0);
    assert_eq!(binder.state(), Some(RecordState::Draining));
    assert_eq!(tally.disposed(), 0);

    Microtasks::run_until_idle().unwrap();
    assert_eq!(tally.disposed(), 1);
    assert_eq!(binder.state(), Some(RecordState::Disposed));
}

#[test]
fn config_loads_from_json() {
    let config = BinderConfig::from_json(r#"{ "deferral": "immediate", "label": "sidebar" }"#).unwrap();
    assert_eq!(config.deferral, Deferral::Immediate);
    assert!(config.track);
    assert_eq!(config.label.as_deref(), Some("sidebar"));

    let err = BinderConfig::from_json(r#"{ "deferral": "later" }"#).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
