use std::{thread, time::Duration};

mod timer {
    include!("../src/utils/timer.rs");
}
use timer::{FrameClock, UpdateTimer};

#[test]
fn zero_budget_never_runs_out() {
    let mut timer = UpdateTimer::new();
    timer.start();
    thread::sleep(Duration::from_millis(5));
    assert!(timer.within_budget(0.0));
}

#[test]
fn budget_expires_after_sleep() {
    let mut timer = UpdateTimer::new();
    timer.start();
    thread::sleep(Duration::from_millis(10));
    assert!(!timer.within_budget(0.001));
    assert!(timer.within_budget(60.0));
}

#[test]
fn stop_freezes_elapsed_time() {
    let mut timer = UpdateTimer::new();
    timer.start();
    thread::sleep(Duration::from_millis(5));
    timer.stop();
    let stopped = timer.elapsed_duration();
    thread::sleep(Duration::from_millis(5));
    assert_eq!(stopped, timer.elapsed_duration());
}

#[test]
fn frame_clock_is_strictly_increasing() {
    let mut clock = FrameClock::new();
    clock.advance();
    let first = clock.frame_time_us();
    clock.advance();
    assert!(clock.frame_time_us() > first);
    assert_eq!(clock.frame(), 2);
}
