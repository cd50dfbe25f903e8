use std::{cell::RefCell, rc::Rc};

use formation_timeline_core::{
    ClockKind, DeviceBehaviour, ManualTime, PlayState, PlaybackController, ProjectState,
    RenderEvent, TickOutcome, TimelineConfig, Viewport, VirtualTrack,
};

const TWO_FORMATIONS: &str = r##"{
    "project": { "id": "p1", "title": "Two formations" },
    "formations": [
        {
            "id": "a", "name": "A", "order": 1,
            "durationSeconds": 2, "transitionInSeconds": 0,
            "markers": [{ "id": "m1", "label": "D1", "x": 0, "y": 0, "color": "#ef4444" }]
        },
        {
            "id": "b", "name": "B", "order": 2,
            "durationSeconds": 1.5, "transitionInSeconds": 1,
            "markers": [{ "id": "m1", "label": "D1", "x": 100, "y": 50, "color": "#ef4444" }]
        }
    ]
}"##;

fn controller() -> PlaybackController {
    let state = ProjectState::from_json(TWO_FORMATIONS).unwrap();
    PlaybackController::from_project(state, TimelineConfig::default())
}

fn silent_track(seconds: f64, time: &ManualTime) -> Box<VirtualTrack<ManualTime>> {
    Box::new(VirtualTrack::silent(seconds, time.clone()))
}

fn current(controller: &PlaybackController) -> &RenderEvent {
    controller.current_event().expect("an event was dispatched")
}

#[test]
fn wall_clock_playback_walks_through_every_window() {
    let mut controller = controller();
    let ticket = controller.play(1_000.0).unwrap();
    assert_eq!(controller.clock_kind(), Some(ClockKind::Wall));

    assert_eq!(
        controller.tick(ticket, 1_000.0),
        TickOutcome::Rendered { global_ms: 0.0 }
    );
    assert!(matches!(current(&controller), RenderEvent::Pause(p) if p.formation.formation_id == "a"));

    controller.tick(ticket, 3_500.0);
    match current(&controller) {
        RenderEvent::Transition(t) => {
            assert_eq!(t.from.formation_id, "a");
            assert_eq!(t.to.formation_id, "b");
            assert!((t.blend - 0.5).abs() < 1e-9);
        }
        other => panic!("expected a transition, got {other:?}"),
    }

    controller.tick(ticket, 5_000.0);
    assert!(matches!(current(&controller), RenderEvent::Pause(p) if p.formation.formation_id == "b"));

    assert_eq!(
        controller.tick(ticket, 5_600.0),
        TickOutcome::Finished { global_ms: 4_500.0 }
    );
    assert_eq!(controller.state(), PlayState::Stopped);
    assert!(matches!(current(&controller), RenderEvent::Pause(p) if p.formation.formation_id == "b"));
    assert_eq!(controller.tick(ticket, 5_700.0), TickOutcome::Stale);
}

#[test]
fn formation_indices_never_go_backwards_during_playback() {
    let mut controller = controller();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    controller.subscribe(move |event: &RenderEvent| sink.borrow_mut().push(event.formation_index()));

    let ticket = controller.play(0.0).unwrap();
    let mut now = 0.0;
    while let TickOutcome::Rendered { .. } = controller.tick(ticket, now) {
        now += 16.0;
    }

    let seen = seen.borrow();
    assert!(seen.len() > 200);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(seen.last(), Some(&1));
}

#[test]
fn audio_longer_than_the_choreography_holds_the_last_formation() {
    let time = ManualTime::new(0.0);
    let mut controller = controller();
    controller.load_audio(silent_track(10.0, &time));
    assert_eq!(controller.session().total_duration_ms(), 10_000.0);

    let ticket = controller.play(0.0).unwrap();
    assert_eq!(controller.clock_kind(), Some(ClockKind::Audio));

    time.set(9.0);
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Rendered { global_ms: 9_000.0 }
    );
    assert!(matches!(current(&controller), RenderEvent::Pause(p) if p.formation.formation_id == "b"));

    time.set(10.0);
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Finished { global_ms: 10_000.0 }
    );
    assert_eq!(controller.state(), PlayState::Stopped);
}

#[test]
fn audio_running_out_early_stops_at_the_last_reading() {
    let time = ManualTime::new(0.0);
    let mut controller = controller();
    controller.load_audio(silent_track(3.0, &time));
    let ticket = controller.play(0.0).unwrap();

    time.set(3.0);
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Finished { global_ms: 3_000.0 }
    );
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.global_ms(), 3_000.0);
}

#[test]
fn playing_past_the_audio_buffer_uses_the_frame_clock() {
    let time = ManualTime::new(0.0);
    let mut controller = controller();
    controller.load_audio(silent_track(1.0, &time));
    controller.seek(2_000.0);

    let ticket = controller.play(0.0).unwrap();
    assert_eq!(controller.clock_kind(), Some(ClockKind::Wall));
    controller.tick(ticket, 10.0);
    assert_eq!(
        controller.tick(ticket, 510.0),
        TickOutcome::Rendered { global_ms: 2_500.0 }
    );
}

#[test]
fn scrub_clamps_to_the_end_without_changing_state() {
    let mut controller = controller();
    controller.set_viewport(Viewport::new(0.0, 300.0));

    assert_eq!(controller.scrub(10_000.0, 0.0), 4_500.0);
    assert_eq!(controller.global_ms(), controller.session().total_duration_ms());
    assert_eq!(controller.state(), PlayState::Stopped);
}

#[test]
fn seeking_while_playing_keeps_the_ticket() {
    let mut controller = controller();
    let ticket = controller.play(0.0).unwrap();
    controller.tick(ticket, 0.0);
    controller.tick(ticket, 400.0);

    controller.seek(3_000.0);
    assert!(controller.is_playing());
    assert_eq!(
        controller.tick(ticket, 500.0),
        TickOutcome::Rendered { global_ms: 3_000.0 }
    );
    assert_eq!(
        controller.tick(ticket, 800.0),
        TickOutcome::Rendered { global_ms: 3_300.0 }
    );
}

#[test]
fn denied_resume_falls_back_to_the_frame_clock() {
    let time = ManualTime::new(0.0);
    let track = VirtualTrack::silent(10.0, time.clone())
        .with_device(DeviceBehaviour::Denied("blocked by the browser".to_string()));
    let mut controller = controller();
    controller.load_audio(Box::new(track));

    let ticket = controller.play(0.0).unwrap();
    assert!(controller.is_playing());
    assert_eq!(controller.clock_kind(), Some(ClockKind::Wall));
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Rendered { global_ms: 0.0 }
    );
}

#[test]
fn resume_that_never_completes_times_out() {
    let time = ManualTime::new(0.0);
    let track = VirtualTrack::silent(10.0, time.clone()).with_device(DeviceBehaviour::NeverResumes);
    let mut controller = controller();
    controller.load_audio(Box::new(track));

    let ticket = controller.play(0.0).unwrap();
    assert!(controller.is_starting());
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.clock_kind(), None);
    assert_eq!(controller.play(10.0), Some(ticket));

    assert_eq!(controller.tick(ticket, 500.0), TickOutcome::AwaitingDevice);
    assert_eq!(
        controller.tick(ticket, 1_500.0),
        TickOutcome::Rendered { global_ms: 0.0 }
    );
    assert!(controller.is_playing());
    assert_eq!(controller.clock_kind(), Some(ClockKind::Wall));
}

#[test]
fn delayed_resume_starts_on_the_audio_clock() {
    let time = ManualTime::new(0.0);
    let track =
        VirtualTrack::silent(10.0, time.clone()).with_device(DeviceBehaviour::ResumesAfter(0.5));
    let mut controller = controller();
    controller.load_audio(Box::new(track));

    let ticket = controller.play(0.0).unwrap();
    assert_eq!(controller.tick(ticket, 100.0), TickOutcome::AwaitingDevice);

    time.set(0.5);
    assert_eq!(
        controller.tick(ticket, 600.0),
        TickOutcome::Rendered { global_ms: 0.0 }
    );
    assert_eq!(controller.clock_kind(), Some(ClockKind::Audio));

    time.set(2.5);
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Rendered { global_ms: 2_000.0 }
    );
}

#[test]
fn pausing_a_pending_start_cancels_it() {
    let time = ManualTime::new(0.0);
    let track = VirtualTrack::silent(10.0, time.clone()).with_device(DeviceBehaviour::NeverResumes);
    let mut controller = controller();
    controller.load_audio(Box::new(track));

    let ticket = controller.play(0.0).unwrap();
    controller.pause(100.0);
    assert!(!controller.is_starting());
    assert_eq!(controller.tick(ticket, 2_000.0), TickOutcome::Stale);
    assert_eq!(controller.state(), PlayState::Stopped);
}

#[test]
fn frames_from_a_previous_run_are_ignored() {
    let mut controller = controller();
    let first = controller.play(0.0).unwrap();
    controller.pause(100.0);
    let second = controller.play(200.0).unwrap();
    assert_ne!(first, second);

    assert_eq!(controller.tick(first, 300.0), TickOutcome::Stale);
    assert_eq!(
        controller.tick(second, 300.0),
        TickOutcome::Rendered { global_ms: 0.0 }
    );
}

#[test]
fn play_from_zero_starts_at_the_active_formation() {
    let mut controller = controller();
    controller.select_formation("b").unwrap();
    assert_eq!(controller.global_ms(), 3_000.0);
    controller.seek(0.0);

    controller.play(0.0).unwrap();
    assert_eq!(controller.global_ms(), 3_000.0);
    assert_eq!(current(&controller).formation_id(), "b");
}

#[test]
fn pause_renders_the_exact_clock_position() {
    let mut controller = controller();
    let ticket = controller.play(0.0).unwrap();
    controller.tick(ticket, 0.0);
    controller.tick(ticket, 1_200.0);
    controller.pause(1_700.0);

    assert_eq!(controller.state(), PlayState::Paused);
    assert_eq!(controller.global_ms(), 1_700.0);
    assert_eq!(current(&controller).formation_id(), "a");

    let ticket = controller.play(2_000.0).unwrap();
    assert_eq!(
        controller.tick(ticket, 2_000.0),
        TickOutcome::Rendered { global_ms: 1_700.0 }
    );
    assert_eq!(
        controller.tick(ticket, 2_300.0),
        TickOutcome::Rendered { global_ms: 2_000.0 }
    );
}

#[test]
fn audio_loaded_while_paused_keeps_the_cursor() {
    let mut controller = controller();
    let ticket = controller.play(0.0).unwrap();
    controller.tick(ticket, 0.0);
    controller.pause(1_000.0);

    let time = ManualTime::new(5.0);
    controller.load_audio(silent_track(10.0, &time));
    assert_eq!(controller.global_ms(), 1_000.0);

    let ticket = controller.play(0.0).unwrap();
    assert_eq!(controller.clock_kind(), Some(ClockKind::Audio));
    time.set(5.5);
    assert_eq!(
        controller.tick(ticket, 0.0),
        TickOutcome::Rendered { global_ms: 1_500.0 }
    );
}

#[test]
fn loading_a_project_stops_playback_and_resets_the_cursor() {
    let mut controller = controller();
    let ticket = controller.play(0.0).unwrap();
    controller.tick(ticket, 0.0);
    controller.tick(ticket, 2_000.0);

    controller.load_project(ProjectState::sample());
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.global_ms(), 0.0);
    assert_eq!(controller.tick(ticket, 2_100.0), TickOutcome::Stale);
    assert_eq!(controller.session().total_duration_ms(), 9_500.0);
    assert_eq!(current(&controller).formation_id(), "f1");
}

#[test]
fn clearing_audio_stops_playback_and_resets_the_cursor() {
    let time = ManualTime::new(0.0);
    let mut controller = controller();
    controller.load_audio(silent_track(10.0, &time));
    let ticket = controller.play(0.0).unwrap();
    time.set(1.0);
    controller.tick(ticket, 0.0);
    assert_eq!(controller.global_ms(), 1_000.0);

    controller.clear_audio();
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.global_ms(), 0.0);
    assert_eq!(controller.tick(ticket, 100.0), TickOutcome::Stale);
    assert_eq!(controller.session().total_duration_ms(), 4_500.0);
    assert!(controller.amplitude_envelope().is_none());
}
