// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing wired to run loops, the way an embedder drives it.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use strata::kurbo::{Rect, Size, Vec2};
use strata::peniko::Color;
use strata::runloop::RunLoop;
use strata::{
    CompositorContext, FrameScheduler, FrameSchedulerConfig, Layer, LayerTree, RecordingCanvas,
    SchedulerState,
};
use strata_tests::solid_picture;

fn animation_frame(step: usize) -> LayerTree {
    let sprite = solid_picture(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
    LayerTree::new(
        Layer::picture(Vec2::new(step as f64, 0.0), sprite, false, true),
        Size::new(100.0, 100.0),
        1.0,
    )
}

/// One producer-loop turn: deliver the tick, render, and re-arm through
/// the run loop if the scheduler asked for it.
fn deliver_tick(
    scheduler: &Arc<Mutex<FrameScheduler>>,
    run_loop: &mut RunLoop,
    step: usize,
    animating: bool,
) {
    let interval = scheduler.lock().unwrap().config().frame_interval;
    let tick_target = scheduler.clone();
    run_loop.task_runner().post_delayed_task(
        move || {
            let mut scheduler = tick_target.lock().unwrap();
            scheduler.begin_frame(|window| {
                window.render(animation_frame(step)).unwrap();
                if animating {
                    window.request_frame();
                }
            });
        },
        interval,
    );
    run_loop.run_expired_tasks(Instant::now() + interval + Duration::from_millis(1));
}

#[test]
fn timer_driven_animation_produces_frames_in_order() -> Result<()> {
    let scheduler = Arc::new(Mutex::new(FrameScheduler::new(FrameSchedulerConfig {
        depth: 3,
        frame_interval: Duration::from_millis(1),
    })));
    let mut producer_loop = RunLoop::new();

    assert!(scheduler.lock().unwrap().schedule_frame());
    for step in 0..3 {
        deliver_tick(&scheduler, &mut producer_loop, step, true);
    }

    // The raster side consumes in production order.
    let mut context = CompositorContext::default();
    for step in 0..3 {
        let mut scene = scheduler.lock().unwrap().take_frame().unwrap();
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, None, None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        assert_eq!(canvas.draw_count(), 1);
        assert_eq!(
            scene.root().paint_bounds(),
            Rect::new(step as f64, 0.0, step as f64 + 10.0, 10.0)
        );
        scheduler.lock().unwrap().frame_complete();
    }
    assert!(scheduler.lock().unwrap().take_frame().is_none());
    Ok(())
}

#[test]
fn full_pipeline_defers_and_resumes() {
    let scheduler = Arc::new(Mutex::new(FrameScheduler::new(FrameSchedulerConfig {
        depth: 3,
        frame_interval: Duration::from_millis(1),
    })));
    let mut producer_loop = RunLoop::new();

    // A stalled raster thread: requests keep coming, nothing completes.
    for step in 0..5 {
        scheduler.lock().unwrap().schedule_frame();
        deliver_tick(&scheduler, &mut producer_loop, step, false);
    }
    {
        let scheduler = scheduler.lock().unwrap();
        assert_eq!(scheduler.outstanding_frames(), 3);
        assert_eq!(scheduler.state(), SchedulerState::Deferred);
    }

    // The raster thread catches up; the first completion replays the
    // deferred request, later ones do not.
    assert!(scheduler.lock().unwrap().frame_complete());
    assert_eq!(scheduler.lock().unwrap().state(), SchedulerState::Requested);
    assert!(!scheduler.lock().unwrap().frame_complete());
    assert!(!scheduler.lock().unwrap().frame_complete());
}

#[test]
fn trees_raster_on_a_dedicated_thread() -> Result<()> {
    let (raster_runner, raster_thread) = RunLoop::spawn("raster")?;
    let (result_sender, result_receiver) = mpsc::channel();

    // Producer side: build the tree here, raster it over there.
    let mut scene = animation_frame(0);
    raster_runner.post_task(move || {
        let mut context = CompositorContext::default();
        let mut canvas = RecordingCanvas::new();
        let mut scoped = context.acquire_frame(&mut canvas, None, None, false);
        scoped.raster(&mut scene);
        drop(scoped);
        let _ = result_sender.send(canvas.draw_count());
    });

    let draws = result_receiver.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(draws, 1);
    raster_runner.post_quit();
    raster_thread.join().unwrap();
    Ok(())
}
