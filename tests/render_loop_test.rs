use instant::{Duration, Instant};
use tree_scene::{Frame, RenderLoop, SceneConfig, resources::load_model_gltf};

use crate::common::test_utils::{CountingSchedule, FakeRenderer, MemorySource, tree_glb};

mod common;

#[test]
fn deferred_renderer_skips_then_draws() {
    let mut render_loop: RenderLoop<FakeRenderer> = RenderLoop::new(&SceneConfig::default());
    let mut schedule = CountingSchedule::default();
    let start = Instant::now();

    assert!(render_loop.start());
    for i in 0..60 {
        let frame = render_loop.frame(start + Duration::from_millis(16 * i), &mut schedule);
        assert_eq!(frame, Frame::Skipped);
    }
    assert_eq!(schedule.requests, 60);

    // the recovery check found the target
    assert!(render_loop.install_renderer(FakeRenderer::new(1280, 720)));
    assert!(!render_loop.start());
    for i in 60..63 {
        render_loop.frame(start + Duration::from_millis(16 * i), &mut schedule);
    }
    assert_eq!(schedule.requests, 63);
    assert_eq!(render_loop.renderer().unwrap().draws, 3);
    assert_eq!(render_loop.skipped_frames(), 60);
    assert_eq!(render_loop.renderer().unwrap().last_aspect, Some(1280.0 / 720.0));
}

#[test]
fn failed_construction_allows_a_later_renderer() {
    let mut render_loop: RenderLoop<FakeRenderer> = RenderLoop::new(&SceneConfig::default());
    assert!(render_loop.begin_renderer());
    assert!(!render_loop.begin_renderer());
    render_loop.renderer_failed(&anyhow::anyhow!("no adapter"));
    assert!(!render_loop.has_renderer());
    assert!(render_loop.begin_renderer());
    assert!(render_loop.install_renderer(FakeRenderer::new(10, 10)));
}

#[test]
fn resize_follows_the_host_exactly() {
    let mut render_loop = RenderLoop::new(&SceneConfig::default());
    render_loop.install_renderer(FakeRenderer::new(800, 600));
    render_loop.resize(1024, 512);
    render_loop.resize(0, 0);
    render_loop.resize(333, 111);
    assert_eq!(
        render_loop.renderer().unwrap().resizes,
        vec![(1024, 512), (333, 111)]
    );
    assert_eq!(render_loop.camera().aspect(), 3.0);
}

#[tokio::test]
async fn animation_advances_by_wall_clock_delta() {
    let model = load_model_gltf(&MemorySource::default(), "/a.glb".into(), tree_glb(&["sway"]))
        .await
        .unwrap();
    let mut render_loop = RenderLoop::new(&SceneConfig::default());
    render_loop.install_renderer(FakeRenderer::new(100, 100));
    assert!(render_loop.attach_model(model));

    let crown_y = |render_loop: &RenderLoop<FakeRenderer>| {
        render_loop.scene().model().unwrap().nodes[1].local.position.y
    };
    let mut schedule = CountingSchedule::default();
    let start = Instant::now();

    // the first drawn frame has no delta
    render_loop.frame(start, &mut schedule);
    assert_eq!(crown_y(&render_loop), 0.0);

    render_loop.frame(start + Duration::from_millis(250), &mut schedule);
    assert!((crown_y(&render_loop) - 0.25).abs() < 1e-5);

    // 1.5s into a 1s clip wraps to 0.5s
    render_loop.frame(start + Duration::from_millis(1500), &mut schedule);
    assert!((crown_y(&render_loop) - 0.5).abs() < 1e-5);
    assert_eq!(render_loop.renderer().unwrap().draws_with_model, 3);
}

#[test]
fn exhausted_load_keeps_the_loop_drawing() {
    let mut render_loop = RenderLoop::new(&SceneConfig::default());
    render_loop.install_renderer(FakeRenderer::new(100, 100));
    render_loop.finish_loading(tree_scene::Fallback::Exhausted { failures: vec![] });
    let mut schedule = CountingSchedule::default();
    assert_eq!(render_loop.frame(Instant::now(), &mut schedule), Frame::Drawn);
    assert_eq!(render_loop.scene().model_count(), 0);
    assert_eq!(render_loop.failed_loads(), 1);
}

#[tokio::test]
async fn model_arriving_before_the_loop_starts_is_drawn_once_started() {
    // the web build fetches while the document is still loading
    let model = load_model_gltf(&MemorySource::default(), "/a.glb".into(), tree_glb(&["sway"]))
        .await
        .unwrap();
    let mut render_loop = RenderLoop::new(&SceneConfig::default());
    render_loop.install_renderer(FakeRenderer::new(100, 100));
    render_loop.finish_loading(tree_scene::Fallback::Loaded {
        index: 0,
        path: "/a.glb".into(),
        asset: model,
    });
    assert!(!render_loop.is_running());
    assert_eq!(render_loop.scene().model_count(), 1);

    assert!(render_loop.start());
    let mut schedule = CountingSchedule::default();
    assert_eq!(render_loop.frame(Instant::now(), &mut schedule), Frame::Drawn);
    assert_eq!(render_loop.renderer().unwrap().draws_with_model, 1);
}
