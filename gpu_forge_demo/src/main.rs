/// Headless run of every sample on the soft backend

use glam::{Mat4, Vec3};
use gpu_forge::forge::frame::FrameScheduler;
use gpu_forge::forge::log::{set_min_severity, LogSeverity};
use gpu_forge::forge::{BackendKind, DeviceConfig, RenderContext, Result};
use gpu_forge::{engine_error, engine_info};
use gpu_forge_backend_soft::{create_context, print_validation_report};
use gpu_forge_demo::bitonic_sort::MAX_ELEMENTS;
use gpu_forge_demo::{BitonicSorter, SceneCompositor, SimpleBezier, SoftParticles, SoftParticlesConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SOURCE: &str = "demo::Main";

const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: u32 = 120;

fn run_bitonic_sort(context: &RenderContext, scheduler: &mut FrameScheduler) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let keys: Vec<u32> = (0..MAX_ELEMENTS).map(|_| rng.gen()).collect();

    let mut sorter = BitonicSorter::new(context, MAX_ELEMENTS)?;
    scheduler.begin_frame()?;
    let sorted = sorter.sort(scheduler, &keys)?;
    let ordered = sorted.windows(2).all(|pair| pair[0] <= pair[1]);
    let report = scheduler.end_frame();

    engine_info!(
        SOURCE,
        "Bitonic sort of {} keys in {} dispatches, ordered: {}",
        keys.len(),
        report.dispatch_count(),
        ordered
    );
    Ok(())
}

fn run_soft_particles(context: &RenderContext, scheduler: &mut FrameScheduler) -> Result<()> {
    let mut particles = SoftParticles::new(context, SoftParticlesConfig::default())?;
    let eye = Vec3::new(2.0, 1.0, -3.0);
    let look_at = Vec3::new(0.0, 0.7, 3.0);

    for frame in 1..=FRAMES {
        scheduler.begin_frame()?;
        particles.render(scheduler, (frame as f32 * FRAME_TIME) as f64, FRAME_TIME, eye, look_at)?;
        scheduler.end_frame();
    }
    engine_info!(SOURCE, "Soft particles: {} alive after {} frames", particles.alive_count(), FRAMES);
    Ok(())
}

fn run_compositor(context: &RenderContext, scheduler: &mut FrameScheduler) -> Result<()> {
    let config = context.config();
    let mut compositor = SceneCompositor::new(context, config.screen_width, config.screen_height)?;

    for frame in 0..FRAMES {
        if frame == FRAMES / 2 {
            compositor.resize(config.screen_width / 2, config.screen_height / 2)?;
        }
        scheduler.begin_frame()?;
        compositor.render_frame(scheduler, FRAME_TIME)?;
        scheduler.end_frame();
    }
    let live = compositor.particles().live_count(scheduler)?;
    engine_info!(SOURCE, "Compositor: {} live GPU particles after {} frames", live, FRAMES);
    Ok(())
}

fn run_bezier(context: &RenderContext, scheduler: &mut FrameScheduler) -> Result<()> {
    let mut bezier = SimpleBezier::new(context)?;
    let eye = Vec3::new(3.5, -6.0, 8.0);
    let view_proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 4.0 / 3.0, 0.1, 100.0)
        * Mat4::look_at_rh(eye, Vec3::new(3.5, 1.5, 0.0), Vec3::Z);

    for (frame, factor) in [4.0, 7.5, 16.0].into_iter().enumerate() {
        bezier.set_tessellation_factor(factor)?;
        bezier.set_partition_type(frame as u32)?;
        bezier.set_wireframe(frame == 1)?;
        scheduler.begin_frame()?;
        bezier.render_frame(scheduler, eye, view_proj)?;
        scheduler.end_frame();
        engine_info!(
            SOURCE,
            "Bezier: '{}' at factor {}, {} segments, {} vertices",
            bezier.technique().name(),
            factor,
            bezier.segments(),
            bezier.vertex_count()
        );
    }
    Ok(())
}

fn run() -> Result<()> {
    let config = DeviceConfig {
        description: "GpuForge Demo".to_string(),
        screen_width: 320,
        screen_height: 240,
        ..DeviceConfig::for_backend(BackendKind::Compute)
    };
    let (context, handle) = create_context(config)?;
    let mut scheduler = context.scheduler();

    run_bitonic_sort(&context, &mut scheduler)?;
    run_soft_particles(&context, &mut scheduler)?;
    run_compositor(&context, &mut scheduler)?;
    run_bezier(&context, &mut scheduler)?;

    let stats = handle.stats();
    engine_info!(
        SOURCE,
        "{} dispatches, {} draw calls, {} buffers alive",
        stats.dispatches,
        stats.draw_calls,
        stats.buffers_alive
    );
    if handle.validation_enabled() {
        print_validation_report(&handle.validation_stats());
    }
    Ok(())
}

fn main() {
    set_min_severity(LogSeverity::Info);
    if let Err(err) = run() {
        engine_error!(SOURCE, "Demo failed: {}", err);
        std::process::exit(1);
    }
}
