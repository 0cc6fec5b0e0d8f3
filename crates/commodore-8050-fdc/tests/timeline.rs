//! Timeline consistency: the committed result must not depend on how often
//! the scheduler fired between host writes.

use commodore_8050_fdc::{BitPll, Fdc8050, FdcConfig, FluxDrive, LivePhase, Unit};
use emu_core::Ticks;

const REVOLUTION: u64 = 16 * 250;
const END: u64 = 3_000;

#[derive(Debug, Clone, Copy)]
enum Event {
    Mtr(Unit, bool),
    Stp(Unit, u8),
    RwSel(bool),
    ModeSel(bool),
    DrvSel(bool),
    OddHd(bool),
    Ds(u8),
    Pi(u8),
}

const SCRIPT: &[(u64, Event)] = &[
    (5, Event::Mtr(Unit::Drive0, false)),
    (123, Event::Stp(Unit::Drive0, 1)),
    (150, Event::Pi(0x5A)),
    (260, Event::RwSel(false)),
    (411, Event::ModeSel(true)),
    (555, Event::ModeSel(false)),
    (700, Event::Ds(2)),
    (901, Event::RwSel(true)),
    (1003, Event::OddHd(true)),
    (1200, Event::Stp(Unit::Drive0, 3)),
    (1350, Event::DrvSel(true)),
    (1500, Event::Mtr(Unit::Drive1, false)),
    (1800, Event::DrvSel(false)),
    (2100, Event::Mtr(Unit::Drive0, true)),
    (2400, Event::Mtr(Unit::Drive1, true)),
    (2600, Event::Mtr(Unit::Drive0, false)),
    (2777, Event::Ds(0)),
];

/// Deterministic pseudo-random flux, one transition per cell at most.
fn noise_track(seed: u32) -> Vec<u64> {
    let mut state = seed;
    (0..REVOLUTION / 16)
        .filter_map(|cell| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let bits = state >> 16;
            (bits & 1 != 0).then(|| cell * 16 + 4 + u64::from((bits >> 1) & 7))
        })
        .collect()
}

fn controller() -> Fdc8050 {
    let config = FdcConfig {
        clock_hz: 1_000_000,
        lookahead_us: 400,
    };
    let mut fdc = Fdc8050::with_config(&config);
    for (unit, seed) in [(Unit::Drive0, 1), (Unit::Drive1, 7)] {
        let mut drive = FluxDrive::new(77, Ticks::new(REVOLUTION));
        for cylinder in 0..4 {
            drive.insert_track(cylinder, false, noise_track(seed + u32::from(cylinder)));
            drive.insert_track(cylinder, true, noise_track(seed + 100 + u32::from(cylinder)));
        }
        fdc.attach_drive(Ticks::ZERO, unit, drive);
    }
    fdc
}

fn blank_controller() -> Fdc8050 {
    let config = FdcConfig {
        clock_hz: 1_000_000,
        lookahead_us: 400,
    };
    let mut fdc = Fdc8050::with_config(&config);
    fdc.attach_drive(Ticks::ZERO, Unit::Drive0, FluxDrive::new(77, Ticks::new(REVOLUTION)));
    fdc.attach_drive(Ticks::ZERO, Unit::Drive1, FluxDrive::new(77, Ticks::new(REVOLUTION)));
    fdc
}

fn apply(fdc: &mut Fdc8050, now: Ticks, event: Event) {
    match event {
        Event::Mtr(unit, state) => fdc.set_mtr(now, unit, state),
        Event::Stp(unit, phase) => fdc.set_stp(now, unit, phase),
        Event::RwSel(state) => fdc.set_rw_sel(now, state),
        Event::ModeSel(state) => fdc.set_mode_sel(now, state),
        Event::DrvSel(state) => fdc.set_drv_sel(now, state),
        Event::OddHd(state) => fdc.set_odd_hd(now, state),
        Event::Ds(ds) => fdc.set_ds(now, ds),
        Event::Pi(data) => fdc.write(now, data),
    }
}

#[derive(Clone, Copy)]
enum Schedule {
    /// Only host writes, maximum speculation and rollback.
    EventsOnly,
    /// Service `next_wakeup()` as a scheduler would.
    Wakeups,
    /// Fire the timer on every tick.
    EveryTick,
}

fn run(schedule: Schedule) -> Fdc8050 {
    let mut fdc = controller();
    let mut now = 0;
    for &(at, event) in SCRIPT {
        match schedule {
            Schedule::EventsOnly => {}
            Schedule::Wakeups => {
                while let Some(when) = fdc.next_wakeup().filter(|w| w.get() <= at) {
                    fdc.timer_fired(when);
                }
            }
            Schedule::EveryTick => {
                while now < at {
                    now += 1;
                    fdc.timer_fired(Ticks::new(now));
                }
            }
        }
        apply(&mut fdc, Ticks::new(at), event);
    }
    fdc.timer_fired(Ticks::new(END));
    fdc
}

#[test]
fn rollback_matches_fine_grained_stepping() {
    let reference = run(Schedule::EveryTick);
    for schedule in [Schedule::EventsOnly, Schedule::Wakeups] {
        let fdc = run(schedule);
        assert_eq!(fdc.checkpoint(), reference.checkpoint());
        assert_eq!(fdc.lines(), reference.lines());
        assert_eq!(fdc.registers(), reference.registers());
        for unit in [Unit::Drive0, Unit::Drive1] {
            assert_eq!(fdc.drive(unit), reference.drive(unit));
        }
    }
    // The script must actually have exercised the data path.
    let live = reference.checkpoint().live;
    assert_eq!(live.state, LivePhase::Running);
    assert!(live.tm <= Ticks::new(END) && live.tm > Ticks::new(END - 20));
    assert!(!reference.lines().events().is_empty());
    assert_ne!(
        reference.drive(Unit::Drive0).map(|d| d.track(1, true).to_vec()),
        Some(noise_track(1 + 100 + 1))
    );
}

#[test]
fn both_motors_off_means_idle() {
    let mut fdc = controller();
    fdc.set_rw_sel(Ticks::ZERO, false);
    fdc.set_mtr(Ticks::new(10), Unit::Drive0, false);
    fdc.set_mtr(Ticks::new(20), Unit::Drive1, false);
    fdc.timer_fired(Ticks::new(300));
    assert!(fdc.checkpoint().pll.is_writing());

    fdc.set_mtr(Ticks::new(400), Unit::Drive0, true);
    assert_eq!(fdc.checkpoint().live.state, LivePhase::Running);

    fdc.set_mtr(Ticks::new(450), Unit::Drive1, true);
    let checkpoint = fdc.checkpoint();
    assert_eq!(checkpoint.live.state, LivePhase::Idle);
    assert!(checkpoint.live.tm.is_never());
    assert!(checkpoint.live.ready && checkpoint.live.sync && checkpoint.live.error);
    assert!(!checkpoint.pll.is_writing());
    assert_eq!(fdc.next_wakeup(), None);

    // Nothing moves while idle.
    fdc.timer_fired(Ticks::new(5_000));
    assert_eq!(fdc.checkpoint().live.state, LivePhase::Idle);
}

#[test]
fn motor_transitions_start_and_stop_once() {
    let mut fdc = blank_controller();
    fdc.set_mtr(Ticks::new(0), Unit::Drive1, false);
    fdc.timer_fired(Ticks::new(800));
    let before = fdc.checkpoint().live.cell_counter;
    assert_eq!(before, 50);

    // Second motor on: the timeline keeps counting instead of restarting.
    fdc.set_mtr(Ticks::new(800), Unit::Drive0, false);
    fdc.set_mtr(Ticks::new(800), Unit::Drive0, false);
    fdc.timer_fired(Ticks::new(1_600));
    assert_eq!(fdc.checkpoint().live.cell_counter, 100);

    // Drive 0 off with drive 1 still on: keep running.
    fdc.set_mtr(Ticks::new(1_600), Unit::Drive0, true);
    assert_eq!(fdc.checkpoint().live.state, LivePhase::Running);

    // Last motor off: one abort, one set of line notifications.
    fdc.set_mtr(Ticks::new(1_700), Unit::Drive1, true);
    let at_abort = fdc
        .lines()
        .events()
        .iter()
        .filter(|e| e.at == Ticks::new(1_700))
        .count();
    assert_eq!(at_abort, 3);
    assert_eq!(fdc.checkpoint().live.state, LivePhase::Idle);
}
