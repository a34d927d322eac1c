//! Integration tests for the viewer runtime.
//!
//! GPU-backed tests create a headless engine and skip gracefully when no
//! adapter is available (CI without GPU support). State-machine tests run
//! everywhere.

use std::collections::HashSet;
use std::sync::Arc;

use pollster::FutureExt;
use voluscope::*;

fn volume(w: u32, h: u32, d: u32, channels: u32) -> Arc<NormalizedVolume> {
    let len = (w * h * d * channels) as usize;
    Arc::new(
        NormalizedVolume::new(w, h, d, channels, vec![0u8; len], 0.0, 1.0, VolumeDataType::Uint8)
            .unwrap(),
    )
}

fn track(id: &str, channel: &str, times: &[f32]) -> TrackDefinition {
    TrackDefinition {
        id: id.to_string(),
        channel_id: channel.to_string(),
        track_number: 0,
        points: times
            .iter()
            .enumerate()
            .map(|(i, &time)| TrackPoint {
                time,
                x: i as f32 * 2.0,
                y: 0.0,
                z: 0.0,
                amplitude: 1.0,
            })
            .collect(),
    }
}

fn headless_engine() -> Option<RenderEngine> {
    match RenderEngine::new_headless(320, 240).block_on() {
        Ok(engine) => Some(engine),
        Err(e) => {
            eprintln!("skipping GPU tests: no adapter available ({e})");
            None
        }
    }
}

/// GPU-backed tests share one engine because adapter creation is the slow
/// part; each section resets the runtime it needs.
#[test]
fn gpu_runtime_tests() {
    let Some(mut engine) = headless_engine() else {
        return;
    };

    // --- Resource map reconciliation invariant ---
    {
        let mut runtime = ViewerRuntime::new();
        runtime.set_layers(vec![
            ViewerLayer::new("a", volume(4, 4, 4, 1)),
            ViewerLayer::new("b", volume(8, 8, 2, 2)),
        ]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(
            runtime.resource_keys(),
            HashSet::from(["a".to_string(), "b".to_string()])
        );

        // Removing a layer retires its resources on the next pass
        runtime.set_layers(vec![ViewerLayer::new("b", volume(8, 8, 2, 2))]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(runtime.resource_keys(), HashSet::from(["b".to_string()]));

        // A layer without a volume owns no resources
        let mut empty = ViewerLayer::new("c", volume(2, 2, 2, 1));
        empty.volume = None;
        runtime.set_layers(vec![ViewerLayer::new("b", volume(8, 8, 2, 2)), empty]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(runtime.resource_keys(), HashSet::from(["b".to_string()]));
    }

    // --- Parameter changes reuse resources, structural changes rebuild ---
    {
        let mut runtime = ViewerRuntime::new();
        let shared = volume(4, 4, 4, 1);
        let mut layer = ViewerLayer::new("a", shared.clone());
        runtime.set_layers(vec![layer.clone()]);
        runtime.reconcile(&mut engine).unwrap();

        // Window change: cheap update path
        layer.window_min = 0.2;
        layer.window_max = 0.8;
        runtime.set_layers(vec![layer.clone()]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(runtime.resource_keys().len(), 1);

        // Dimension change: rebuild
        layer.volume = Some(volume(16, 4, 4, 1));
        runtime.set_layers(vec![layer.clone()]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(runtime.resource_keys().len(), 1);

        // Mode switch to slice: rebuild into a 2D texture
        layer.mode = LayerMode::Slice;
        layer.slice_index = 0;
        runtime.set_layers(vec![layer]);
        runtime.reconcile(&mut engine).unwrap();
        assert_eq!(runtime.resource_keys().len(), 1);
    }

    // --- Track draw range reveal ---
    {
        let mut runtime = ViewerRuntime::new();
        runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0, 2.0, 3.0])]);
        runtime.set_timepoint(1);
        runtime.update_track_overlays(&engine);
        assert_eq!(
            runtime.track_visible_segments("t1"),
            Some(1),
            "only segment 0->1 is revealed at t=1"
        );

        runtime.set_timepoint(3);
        runtime.update_track_overlays(&engine);
        assert_eq!(runtime.track_visible_segments("t1"), Some(3));

        // Monotonic reveal going forward from zero
        runtime.set_timepoint(0);
        runtime.update_track_overlays(&engine);
        assert_eq!(runtime.track_visible_segments("t1"), Some(0));
    }

    // --- Hover cleared when the hovered track is hidden ---
    {
        let mut runtime = ViewerRuntime::new();
        runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0])]);
        runtime.update_track_overlays(&engine);

        runtime
            .interaction
            .set_hover("t1", HoverSource::Pointer);
        assert_eq!(runtime.interaction.hovered_track_id(), Some("t1"));

        let mut settings = TrackChannelSettings::default();
        settings.hidden_tracks.insert("t1".to_string());
        runtime.set_channel_settings("ch0", settings);
        runtime.update_track_overlays(&engine);

        assert_eq!(
            runtime.interaction.hovered_track_id(),
            None,
            "hiding the hovered track must clear hover"
        );
        assert_eq!(runtime.track_outline_visible("t1"), Some(false));
    }

    // --- Followed track stays visible even when hidden ---
    {
        let mut runtime = ViewerRuntime::new();
        runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0])]);
        let mut settings = TrackChannelSettings::default();
        settings.hidden_tracks.insert("t1".to_string());
        runtime.set_channel_settings("ch0", settings);
        runtime.follow_track("t1");
        runtime.update_track_overlays(&engine);
        assert_eq!(runtime.track_line_visible("t1"), Some(true));
        assert_eq!(runtime.track_outline_visible("t1"), Some(true));
    }

    // --- VR session restores the exact camera pose ---
    {
        let mut runtime = ViewerRuntime::new();
        let mut hud = HudRenderData::new(
            &engine.device,
            &engine.hud_bind_group_layout,
            &engine.hud_label_bind_group_layout,
            &engine.camera_buffer,
            &engine.colormap_sampler,
        );

        engine.camera.position = Vec3::new(3.0, 1.0, 8.0);
        engine.camera.target = Vec3::new(0.5, 0.5, 0.5);
        let pose = engine.camera.snapshot();

        runtime.request_vr(true).unwrap();
        runtime.vr_presented(&engine, &mut hud);
        assert!(runtime.vr.is_presenting());
        assert!(!runtime.controls_enabled);
        assert!(hud.visible);

        // Head tracking perturbs the camera during the session
        engine.camera.position = Vec3::new(-2.0, 7.0, 1.0);
        engine.camera.orbit(0.4, 0.1);

        runtime.vr_ended(&mut engine, &mut hud);
        assert_eq!(engine.camera.position, pose.position);
        assert_eq!(engine.camera.target, pose.target);
        assert_eq!(engine.camera.up, pose.up);
        assert!(runtime.controls_enabled);
        assert!(!hud.visible);
        assert!(runtime.interaction.hovered_track_id().is_none());
    }

    // --- Full frame renders without error ---
    {
        let mut runtime = ViewerRuntime::new();
        runtime.set_layers(vec![ViewerLayer::new("a", volume(8, 8, 8, 1))]);
        runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0, 2.0])]);
        runtime.set_timepoint(2);
        runtime
            .frame(&mut engine, None, 1.0 / 60.0)
            .expect("headless frame should render");
    }
}

#[test]
fn follow_centroid_tracks_timepoint() {
    let mut runtime = ViewerRuntime::new();
    runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0, 2.0, 3.0])]);
    runtime.follow_track("t1");

    runtime.set_timepoint(0);
    // Latest point with time <= 0 + 1 is the point at t=1 (x=2)
    let target = runtime.follow_target().unwrap();
    assert!((target.x - 2.0).abs() < 1e-5);

    runtime.set_timepoint(2);
    let target = runtime.follow_target().unwrap();
    assert!((target.x - 6.0).abs() < 1e-5);
}

#[test]
fn external_follow_request_wins_over_hover() {
    let mut runtime = ViewerRuntime::new();
    runtime.set_tracks(vec![
        track("t1", "ch0", &[0.0, 1.0]),
        track("t2", "ch0", &[0.0, 1.0]),
    ]);
    runtime.interaction.set_hover("t1", HoverSource::Pointer);
    runtime.follow_track("t2");
    assert_eq!(runtime.interaction.followed_track_id(), Some("t2"));
    assert_eq!(runtime.interaction.hovered_track_id(), Some("t1"));
}

proptest::proptest! {
    #[test]
    fn prop_ray_segment_distance_nonnegative(
        ox in -10.0f32..10.0, oy in -10.0f32..10.0,
        ax in -10.0f32..10.0, ay in -10.0f32..10.0, az in -10.0f32..10.0,
        bx in -10.0f32..10.0, by in -10.0f32..10.0, bz in -10.0f32..10.0,
    ) {
        let a = Vec3::new(ax, ay, az);
        let b = Vec3::new(bx, by, bz);
        if let Some((dist, t, point)) =
            ray_segment_distance(Vec3::new(ox, oy, -20.0), Vec3::Z, a, b)
        {
            proptest::prop_assert!(dist >= 0.0);
            proptest::prop_assert!(t >= 0.0);
            // The closest point lies within the segment's bounding box
            let min = a.min(b) - Vec3::splat(1e-4);
            let max = a.max(b) + Vec3::splat(1e-4);
            proptest::prop_assert!(point.cmpge(min).all() && point.cmple(max).all());
        }
    }
}

#[test]
fn removing_track_drops_interaction_references() {
    let mut runtime = ViewerRuntime::new();
    runtime.set_tracks(vec![track("t1", "ch0", &[0.0, 1.0])]);
    runtime.follow_track("t1");
    runtime.interaction.set_hover("t1", HoverSource::Pointer);

    // Replace the track list; the stale id must drop everywhere even
    // before any GPU resources exist.
    runtime.set_tracks(vec![track("t2", "ch0", &[0.0])]);
    runtime.prune_dead_tracks();
    assert_eq!(runtime.interaction.followed_track_id(), None);
    assert_eq!(runtime.interaction.hovered_track_id(), None);
}
