mod support;

use std::fs;

use midiviz::runtime::action::{SystemAction, WindowFrame, WindowSystem};
use midiviz::runtime::clock::PlaybackClock;
use midiviz::runtime::session::{Session, initial_state};
use support::{
    CallLog, MockOverlay, MockVisualizer, MockWindow, config, scratch_dir,
};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::KeyCode;

type MockSession = Session<MockWindow, MockVisualizer, MockOverlay>;

fn start(
    args: &[&str],
    visualizer: MockVisualizer,
    log: &CallLog,
) -> MockSession {
    Session::start_with_clock(
        &config(args),
        MockWindow::new(log),
        visualizer,
        MockOverlay::new(log),
        PlaybackClock::new(1.0),
    )
}

#[test]
fn startup_runs_in_order() {
    let log = CallLog::default();
    let mut window = MockWindow::new(&log);
    window.pixel_ratio = 2;

    let session = Session::start_with_clock(
        &config(&["--midi", "song.mid", "--gui-scale", "1.5", "preroll=3"]),
        window,
        MockVisualizer::new(&log),
        MockOverlay::new(&log),
        PlaybackClock::new(1.0),
    );

    assert_eq!(
        log.entries(),
        vec![
            "load_file(song.mid)",
            "set_state(preroll=3)",
            "swap_interval(1)",
            "resize_and_rescale(1600,1200,2)",
            "set_gui_scale(1.5)",
        ]
    );
    assert!(!session.should_close());
    assert_eq!(session.dispatches(), 0);
    assert_eq!(session.window_frame().size(), [800, 600]);
}

#[test]
fn failed_midi_load_does_not_stop_startup() {
    let log = CallLog::default();
    let mut visualizer = MockVisualizer::new(&log);
    visualizer.fail_loads = true;

    let session = start(&["--midi", "broken.mid"], visualizer, &log);

    assert!(!session.should_close());
    assert!(log.position("set_gui_scale(1)").is_some());
}

#[test]
fn failed_recording_quits_without_drawing() {
    let log = CallLog::default();
    let mut visualizer = MockVisualizer::new(&log);
    visualizer.recording_succeeds = false;

    let session =
        start(&["--export", "out.mp4", "--fullscreen"], visualizer, &log);

    assert!(session.should_close());
    assert_eq!(session.frames(), 0);
    assert_eq!(log.count("draw"), 0);
    assert_eq!(log.count("acquire_frame"), 0);

    // The synthetic quit goes through the dispatcher, then fullscreen still
    // applies.
    let quit = log.position("set_should_close").unwrap();
    let recording = log.position("start_direct_recording(800,600)").unwrap();
    assert!(recording < quit);
    assert_eq!(session.dispatches(), 2);

    log.clear();
    session.shutdown();
    assert_eq!(
        log.entries(),
        vec![
            "ui_shutdown",
            "clean",
            "drop:visualizer",
            "drop:overlay",
            "drop:window",
        ]
    );
}

#[test]
fn successful_recording_keeps_running() {
    let log = CallLog::default();
    let mut window = MockWindow::new(&log);
    window.pixel_ratio = 2;

    let session = Session::start_with_clock(
        &config(&["--export", "frames"]),
        window,
        MockVisualizer::new(&log),
        MockOverlay::new(&log),
        PlaybackClock::new(1.0),
    );

    assert!(!session.should_close());
    assert_eq!(session.dispatches(), 0);
    // Same pixels the panel's record button uses.
    assert_eq!(log.count("start_direct_recording(1600,1200)"), 1);
    assert_eq!(log.count("resize_and_rescale(1600,1200,2)"), 1);
}

#[test]
fn fullscreen_flag_enters_fullscreen_before_the_loop() {
    let log = CallLog::default();
    let session = start(&["--fullscreen"], MockVisualizer::new(&log), &log);

    assert!(session.window().fullscreen);
    assert_eq!(session.dispatches(), 1);
    assert_eq!(session.frames(), 0);
    // The saved frame is the windowed geometry.
    assert_eq!(session.window_frame().size(), [800, 600]);
}

#[test]
fn every_frame_dispatches_exactly_once() {
    let log = CallLog::default();
    let visualizer = MockVisualizer::with_actions(
        &log,
        [SystemAction::FixSize, SystemAction::None, SystemAction::FreeSize],
    );
    let mut session = start(&[], visualizer, &log);
    log.clear();

    for _ in 0..4 {
        session.frame();
    }

    assert_eq!(session.frames(), 4);
    assert_eq!(session.dispatches(), 4);
    assert_eq!(log.count("set_resizable(false)"), 1);
    assert_eq!(log.count("set_resizable(true)"), 1);

    let first_frame: Vec<String> = log.entries().into_iter().take(7).collect();
    assert_eq!(
        first_frame,
        vec![
            "ui_begin",
            "acquire_frame",
            "draw(1)",
            "set_resizable(false)",
            "swap_interval(0)",
            "ui_end(1)",
            "swap_buffers(1)",
        ]
    );
}

#[test]
fn quit_from_a_frame_closes_the_session() {
    let log = CallLog::default();
    let visualizer = MockVisualizer::with_actions(&log, [SystemAction::Quit]);
    let mut session = start(&[], visualizer, &log);

    session.frame();

    assert!(session.should_close());
    assert_eq!(log.count("swap_buffers(1)"), 1);
}

#[test]
fn keys_reach_the_visualizer_only_without_ui_focus() {
    let log = CallLog::default();
    let overlay = MockOverlay::new(&log);
    let focus = overlay.wants_keyboard.clone();

    let mut session = Session::start_with_clock(
        &config(&[]),
        MockWindow::new(&log),
        MockVisualizer::new(&log),
        overlay,
        PlaybackClock::new(1.0),
    );
    log.clear();

    focus.set(true);
    session.on_key(KeyCode::Space, ElementState::Pressed);
    assert!(log.entries().is_empty());

    focus.set(false);
    session.on_key(KeyCode::Space, ElementState::Pressed);
    assert_eq!(log.entries(), vec!["key(Space,Pressed)"]);
}

#[test]
fn window_events_reach_the_ui_first() {
    let log = CallLog::default();
    let mut session = start(&[], MockVisualizer::new(&log), &log);
    log.clear();

    session.handle_window_event(&WindowEvent::Resized(PhysicalSize::new(
        640, 480,
    )));
    assert_eq!(
        log.entries(),
        vec!["ui_event", "resize_surface(640,480)", "resize(640,480)"]
    );

    session.handle_window_event(&WindowEvent::CloseRequested);
    assert!(session.should_close());
}

#[test]
fn user_moves_and_resizes_update_the_window_frame() {
    let log = CallLog::default();
    let mut session = start(&[], MockVisualizer::new(&log), &log);
    assert_eq!(session.window_frame(), &WindowFrame::new(100, 100, 800, 600));

    session.window_mut().size = (1024, 700);
    session.handle_window_event(&WindowEvent::Resized(PhysicalSize::new(
        1024, 700,
    )));
    assert_eq!(session.window_frame().size(), [1024, 700]);

    session.window_mut().position = (40, 60);
    session.handle_window_event(&WindowEvent::Moved(PhysicalPosition::new(
        40, 60,
    )));
    assert_eq!(session.window_frame(), &WindowFrame::new(40, 60, 1024, 700));
}

#[test]
fn fullscreen_geometry_never_reaches_the_window_frame() {
    let log = CallLog::default();
    let mut session = start(&[], MockVisualizer::new(&log), &log);

    session.dispatch(SystemAction::Fullscreen);
    assert!(session.window().is_fullscreen());

    session.handle_window_event(&WindowEvent::Resized(PhysicalSize::new(
        1920, 1080,
    )));
    session.handle_window_event(&WindowEvent::Moved(PhysicalPosition::new(
        0, 0,
    )));
    assert_eq!(session.window_frame(), &WindowFrame::new(100, 100, 800, 600));

    session.dispatch(SystemAction::Fullscreen);
    assert_eq!(session.window_frame(), &WindowFrame::new(100, 100, 800, 600));
}

#[test]
fn rescale_is_independent_of_resize() {
    let log = CallLog::default();
    let mut session = start(&[], MockVisualizer::new(&log), &log);
    log.clear();

    session.on_rescale(2.0);
    assert_eq!(log.entries(), vec!["rescale(2)"]);
}

#[test]
fn preset_file_is_overridden_by_arguments() {
    let dir = scratch_dir("preset");
    let preset = dir.join("preset.yml");
    fs::write(&preset, "preroll: 2\ncolor-bg: [0.1, 0.2, 0.3]\n")
        .expect("write preset");

    let config = config(&[
        "--config",
        preset.to_str().expect("utf-8 path"),
        "preroll=5",
    ]);
    let state = initial_state(&config);

    assert_eq!(state.get("preroll"), Some("5"));
    assert_eq!(state.get("color-bg"), Some("0.1 0.2 0.3"));
    assert_eq!(state.keys().collect::<Vec<_>>(), vec!["preroll", "color-bg"]);
}

#[test]
fn missing_preset_falls_back_to_arguments() {
    let config = config(&["--config", "/nonexistent/preset.yml", "a=1"]);
    let state = initial_state(&config);

    assert_eq!(state.len(), 1);
    assert_eq!(state.get("a"), Some("1"));
}
