use std::time::{Duration, Instant};

use glam::Vec2;
use rust_photo_gallery::config::ViewerConfig;
use rust_photo_gallery::events::GalleryCommand;
use rust_photo_gallery::gallery::focus::{DIMMER_ACTIVE_OPACITY, FocusState};
use rust_photo_gallery::gallery::animator::LAYOUT_SMOOTHING;
use rust_photo_gallery::gallery::layout::{LayoutKind, layout_target};
use rust_photo_gallery::gallery::scene::{PARTICLE_COUNT, PARTICLE_COUNT_COMPACT, SceneComposer};
use rust_photo_gallery::gallery::scroll::{AUTO_SCROLL_SPEED, DEFAULT_GESTURE_TIMEOUT, MAX_VELOCITY};
use rust_photo_gallery::gallery::{Gallery, Viewport};

const FRAME: Duration = Duration::from_millis(16);
const DESKTOP: Viewport = Viewport {
    width: 1280,
    height: 720,
};

fn gallery_with(count: usize, start: Instant) -> Gallery {
    let mut gallery = Gallery::new(&ViewerConfig::default(), DEFAULT_GESTURE_TIMEOUT, start);
    gallery.set_items((0..count).map(|_| (1200, 800)));
    gallery
}

fn run_ticks(gallery: &mut Gallery, start: Instant, from: u32, count: u32) -> Instant {
    let mut now = start;
    for i in from..from + count {
        now = start + FRAME * i;
        gallery.tick(now, DESKTOP, Vec2::ZERO);
    }
    now
}

#[test]
fn selecting_same_item_twice_unfocuses() {
    let start = Instant::now();
    let mut gallery = gallery_with(5, start);
    gallery.select(2);
    assert_eq!(gallery.focus(), FocusState::Focused(2));
    gallery.select(2);
    assert_eq!(gallery.focused_index(), None);
}

#[test]
fn selecting_another_item_moves_focus_directly() {
    let start = Instant::now();
    let mut gallery = gallery_with(5, start);
    gallery.select(1);
    let change = gallery.select(4).unwrap();
    assert_eq!(change.from, FocusState::Focused(1));
    assert_eq!(change.to, FocusState::Focused(4));
}

#[test]
fn out_of_range_select_is_ignored() {
    let start = Instant::now();
    let mut gallery = gallery_with(3, start);
    assert!(gallery.select(3).is_none());
    assert!(!gallery.is_focused());
}

#[test]
fn layout_switch_resets_scroll_to_exact_zero() {
    let start = Instant::now();
    let mut gallery = gallery_with(6, start);
    gallery.wheel(400.0);
    run_ticks(&mut gallery, start, 1, 10);
    assert!(gallery.scroll().position != 0.0);
    assert!(gallery.scroll().velocity != 0.0);

    gallery.set_layout(LayoutKind::Heart);
    assert_eq!(gallery.layout(), LayoutKind::Heart);
    assert_eq!(gallery.scroll().position, 0.0);
    assert_eq!(gallery.scroll().velocity, 0.0);

    // Re-selecting the current layout still restarts from rest.
    gallery.wheel(100.0);
    gallery.set_layout(LayoutKind::Heart);
    assert_eq!(gallery.scroll().velocity, 0.0);
}

#[test]
fn photos_follow_scroll_integrated_in_the_same_tick() {
    let start = Instant::now();
    let mut gallery = gallery_with(4, start);
    gallery.set_layout(LayoutKind::Ring);
    gallery.wheel(400.0);
    assert_eq!(gallery.scroll().velocity, MAX_VELOCITY);

    gallery.tick(start, DESKTOP, Vec2::ZERO);
    let scroll = gallery.scroll().position;
    assert!((scroll - (AUTO_SCROLL_SPEED + MAX_VELOCITY)).abs() < 1e-6);

    let target = layout_target(0, 4, LayoutKind::Ring, false, scroll).position;
    let eased = gallery.photos()[0].transform().position;
    assert!((eased.x - target.x * LAYOUT_SMOOTHING).abs() < 1e-5);
    assert!((eased.z - target.z * LAYOUT_SMOOTHING).abs() < 1e-5);

    let stale = layout_target(0, 4, LayoutKind::Ring, false, 0.0).position;
    assert!((eased.z - stale.z * LAYOUT_SMOOTHING).abs() > 1e-3);
}

#[test]
fn non_finite_gesture_delta_keeps_photos_finite() {
    let start = Instant::now();
    let mut gallery = gallery_with(3, start);
    gallery.gesture_scroll(f32::NAN, start);
    let now = run_ticks(&mut gallery, start, 0, 30);
    assert!(gallery.scroll().position.is_finite());
    assert!(gallery.scroll().velocity.is_finite());
    gallery.tick(now, DESKTOP, Vec2::ZERO);
    assert!(gallery.photos().iter().all(|p| p.transform().position.is_finite()));
}

#[test]
fn layout_change_keeps_focus() {
    let start = Instant::now();
    let mut gallery = gallery_with(4, start);
    gallery.select(3);
    gallery.set_layout(LayoutKind::Ring);
    assert_eq!(gallery.focused_index(), Some(3));
}

#[test]
fn layout_selector_is_ignored_while_focused() {
    let start = Instant::now();
    let mut gallery = gallery_with(4, start);
    gallery.select(0);
    gallery.apply(GalleryCommand::SelectLayout(LayoutKind::Spiral));
    assert_eq!(gallery.layout(), LayoutKind::Corridor);

    gallery.apply(GalleryCommand::CloseFocus);
    gallery.apply(GalleryCommand::SelectLayout(LayoutKind::Spiral));
    assert_eq!(gallery.layout(), LayoutKind::Spiral);
}

#[test]
fn scroll_input_is_suppressed_while_focused() {
    let start = Instant::now();
    let mut gallery = gallery_with(4, start);
    gallery.select(1);
    gallery.wheel(500.0);
    gallery.touch_start(300.0);
    gallery.touch_move(100.0);
    gallery.gesture_scroll(2.0, start);
    let scroll = gallery.scroll();
    assert_eq!(scroll.velocity, 0.0);
    assert_eq!(scroll.position, 0.0);
    assert!(!scroll.is_dragging);
}

#[test]
fn stale_gesture_drag_releases_and_auto_scroll_resumes() {
    let start = Instant::now();
    let mut gallery = gallery_with(4, start);
    gallery.tick(start, DESKTOP, Vec2::ZERO);

    gallery.gesture_scroll(0.0, start);
    assert!(gallery.scroll().is_dragging);
    let held = gallery.scroll().position;

    gallery.tick(start + Duration::from_millis(50), DESKTOP, Vec2::ZERO);
    assert!(gallery.scroll().is_dragging);
    assert_eq!(gallery.scroll().position, held);

    gallery.tick(start + Duration::from_millis(150), DESKTOP, Vec2::ZERO);
    assert!(!gallery.scroll().is_dragging);
    assert!((gallery.scroll().position - (held + AUTO_SCROLL_SPEED)).abs() < 1e-6);
}

#[test]
fn shrinking_item_set_drops_stale_focus() {
    let start = Instant::now();
    let mut gallery = gallery_with(5, start);
    gallery.select(4);
    gallery.set_items([(10, 10), (10, 10)]);
    assert_eq!(gallery.len(), 2);
    assert!(!gallery.is_focused());
}

#[test]
fn dimmer_fades_in_and_out_with_focus() {
    let start = Instant::now();
    let mut gallery = gallery_with(3, start);
    gallery.select(0);
    gallery.tick(start, DESKTOP, Vec2::ZERO);
    let first = gallery.dimmer().opacity();
    assert!(first > 0.0 && first < DIMMER_ACTIVE_OPACITY / 2.0);

    let now = run_ticks(&mut gallery, start, 1, 120);
    assert!((gallery.dimmer().opacity() - DIMMER_ACTIVE_OPACITY).abs() < 1e-3);
    assert!(gallery.dimmer().is_visible());

    gallery.clear_focus();
    run_ticks(&mut gallery, now, 1, 120);
    assert!(!gallery.dimmer().is_visible());
}

#[test]
fn focused_photo_docks_in_front_of_camera() {
    let start = Instant::now();
    let mut gallery = gallery_with(3, start);
    gallery.select(1);
    run_ticks(&mut gallery, start, 0, 200);
    let photo = &gallery.photos()[1];
    let camera = gallery.camera();
    let expected_z = camera.position.z - 3.5;
    assert!((photo.transform().position.z - expected_z).abs() < 1e-3);
    assert!(photo.transform().rotation.length() < 1e-3);
}

#[test]
fn clicking_a_photo_picks_it() {
    let start = Instant::now();
    let mut gallery = gallery_with(1, start);
    run_ticks(&mut gallery, start, 0, 200);

    let center = gallery.photos()[0].transform().position;
    let ndc = gallery
        .camera()
        .view_projection()
        .project_point3(center)
        .truncate();
    assert_eq!(gallery.pick_at(ndc), Some(0));
    assert_eq!(gallery.pick_at(Vec2::new(0.99, 0.99)), None);
}

#[test]
fn composed_frame_marks_focused_photo_unlit() {
    let start = Instant::now();
    let mut gallery = gallery_with(3, start);
    gallery.select(2);
    gallery.tick(start, DESKTOP, Vec2::ZERO);

    let mut composer = SceneComposer::new(Some(11));
    let frame = composer.compose(&gallery, gallery.camera(), false);
    assert_eq!(frame.photos.len(), 3);
    let lit: Vec<_> = frame.photos.iter().map(|p| p.lit).collect();
    assert_eq!(lit, [true, true, false]);
    assert_eq!(composer.particles().len(), PARTICLE_COUNT);
}

#[test]
fn compact_viewport_thins_the_particle_field() {
    let start = Instant::now();
    let gallery = gallery_with(2, start);
    let phone = Viewport::new(390, 844);
    assert!(gallery.is_compact(phone));
    assert!(!gallery.is_compact(DESKTOP));

    let mut composer = SceneComposer::new(Some(3));
    assert!(composer.take_particle_update().is_some());
    composer.compose(&gallery, gallery.camera(), true);
    assert_eq!(composer.particles().len(), PARTICLE_COUNT_COMPACT);
    assert!(composer.take_particle_update().is_some());
    composer.compose(&gallery, gallery.camera(), true);
    assert!(composer.take_particle_update().is_none());
}

#[test]
fn high_density_phone_is_compact_in_logical_pixels() {
    let start = Instant::now();
    let gallery = gallery_with(2, start);
    let physical = Viewport::new(1170, 2532);
    assert!(!gallery.is_compact(physical));

    let logical = physical.to_logical(3.0);
    assert_eq!(logical, Viewport::new(390, 844));
    assert!(gallery.is_compact(logical));
    assert_eq!(DESKTOP.to_logical(1.0), DESKTOP);
}
