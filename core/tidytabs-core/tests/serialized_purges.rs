//! Purge passes never overlap, however the triggers arrive.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;
use tidytabs_core::{
    InMemoryHost, ManualClock, TabEvent, TidyService, TidySettings, WindowId, WindowSpec,
};

fn busy_session() -> (Arc<InMemoryHost>, Arc<ManualClock>, Arc<TidyService>) {
    let settings = TidySettings {
        tab_timeout_minutes: 10,
        tab_close_threshold: 2,
        max_open_tabs: 4,
        purge_on_save: true,
        purge_on_open: true,
    };
    let host = Arc::new(InMemoryHost::new(settings));
    for id in 1..=12 {
        host.open_window(WindowSpec::document(id, format!("/repo/{}.rs", id)));
    }
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = Arc::new(TidyService::start(host.clone(), clock.clone()).unwrap());
    host.set_listing_delay(Some(StdDuration::from_millis(5)));
    (host, clock, service)
}

#[test]
fn concurrent_triggers_run_one_pass_at_a_time() {
    let (host, clock, service) = busy_session();
    clock.advance(Duration::minutes(30));

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let event = match n % 3 {
                    0 => TabEvent::BuildBegin,
                    1 => TabEvent::DocumentSaved {
                        path: format!("/repo/{}.rs", n),
                    },
                    _ => TabEvent::TidyCommand,
                };
                service.handle_event(event);
                if n == 0 {
                    service.tidy_now();
                }
                service.handle_event(TabEvent::ForegroundRegained);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    service.flush();

    assert_eq!(host.max_concurrent_listings(), 1);
    assert_eq!(host.open_windows().len(), 2);
    assert_eq!(service.stats().windows_closed, 10);
}

#[test]
fn bursts_of_triggers_close_each_window_once() {
    let (host, clock, service) = busy_session();
    clock.advance(Duration::minutes(30));

    for _ in 0..10 {
        service.handle_event(TabEvent::BuildBegin);
    }
    service.flush();

    let mut closed = host.closed();
    let total = closed.len();
    closed.sort();
    closed.dedup();
    assert_eq!(closed.len(), total);
    assert_eq!(total, 10);
    assert!(host.is_open(WindowId(11)) || host.is_open(WindowId(12)));
}
