use super::*;
use gpu_forge::forge::frame::{FrameStatus, PassCommand};
use gpu_forge::forge::{BackendKind, DeviceConfig, Error};
use gpu_forge_backend_soft::{create_context, SoftDeviceHandle};

fn small_context() -> (RenderContext, SoftDeviceHandle) {
    create_context(DeviceConfig {
        screen_width: 8,
        screen_height: 8,
        ..DeviceConfig::for_backend(BackendKind::Compute)
    })
    .unwrap()
}

/// Points along x whose dissolve threshold grows by 0.1 per point
fn mesh_points(context: &RenderContext, count: usize) -> (Buffer, ShaderResourceView) {
    let points: Vec<Vec4> = (0..count)
        .map(|i| Vec4::new(i as f32, 1.0, 2.0, 0.1 * (i + 1) as f32))
        .collect();
    let buffer = context
        .make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ,
            16 * count as u64,
            Some(bytemuck::cast_slice(&points)),
            16,
        )
        .unwrap();
    let srv = context
        .make_buffer_srv(&buffer, ElementFormat::R32G32B32A32_SFLOAT)
        .unwrap();
    (buffer, srv)
}

fn assert_close(actual: Vec4, expected: Vec4) {
    assert!(
        (actual - expected).abs().max_element() < 1e-5,
        "{:?} != {:?}",
        actual,
        expected
    );
}

#[test]
fn test_rejects_empty_system() {
    let (context, _handle) = small_context();
    assert!(matches!(GpuParticleSystem::new(&context, 0, 4), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_particles_start_dead() {
    let (context, _handle) = small_context();
    let mut scheduler = context.scheduler();
    let system = GpuParticleSystem::new(&context, 300, 16).unwrap();

    let particles = system.read_particles(&mut scheduler).unwrap();
    assert_eq!(particles.len(), 300);
    assert!(particles.iter().all(|p| *p == DEAD_PARTICLE));
    assert_eq!(system.live_count(&mut scheduler).unwrap(), 0);
}

#[test]
fn test_append_counts_dissolving_points() {
    let (context, _handle) = small_context();
    let mut scheduler = context.scheduler();
    let mut system = GpuParticleSystem::new(&context, 300, 16).unwrap();
    let (_points, srv) = mesh_points(&context, 6);

    system.append_emitters(&mut scheduler, &srv, 0.35).unwrap();
    assert_eq!(system.emitted_count(), 3);

    // Binding the emit view again starts over
    system.append_emitters(&mut scheduler, &srv, 0.15).unwrap();
    assert_eq!(system.emitted_count(), 1);
}

#[test]
fn test_emission_then_update() {
    let (context, _handle) = small_context();
    let mut scheduler = context.scheduler();
    let mut system = GpuParticleSystem::new(&context, 300, 16).unwrap();
    let (_points, srv) = mesh_points(&context, 6);

    scheduler.begin_frame().unwrap();
    system.append_emitters(&mut scheduler, &srv, 0.35).unwrap();
    system.update(&mut scheduler, EMIT_INTERVAL).unwrap();
    let report = scheduler.end_frame();

    assert_eq!(system.emissions(), 1);
    let particles = system.read_particles(&mut scheduler).unwrap();
    for (i, particle) in particles.iter().take(3).enumerate() {
        let expected = Vec4::new(i as f32, 1.0 + PARTICLE_VELOCITY * EMIT_INTERVAL, 2.0, SPAWN_LIFE - EMIT_INTERVAL);
        assert_close(*particle, expected);
    }
    assert!(particles[3..].iter().all(|p| *p == DEAD_PARTICLE));
    assert_eq!(system.live_count(&mut scheduler).unwrap(), 3);

    assert_eq!(report.dispatch_order(), vec!["Append", "Update"]);
    assert!(report
        .commands
        .iter()
        .any(|command| matches!(command, PassCommand::Discard { target, .. } if target == "default")));
}

#[test]
fn test_no_emission_before_interval() {
    let (context, _handle) = small_context();
    let mut scheduler = context.scheduler();
    let mut system = GpuParticleSystem::new(&context, 64, 16).unwrap();
    let (_points, srv) = mesh_points(&context, 4);

    system.append_emitters(&mut scheduler, &srv, 1.0).unwrap();
    system.update(&mut scheduler, 0.01).unwrap();
    assert_eq!(system.emissions(), 0);
    assert_eq!(system.live_count(&mut scheduler).unwrap(), 0);
}

#[test]
fn test_emitters_per_emission_are_capped() {
    let (context, _handle) = small_context();
    let mut scheduler = context.scheduler();
    let mut system = GpuParticleSystem::new(&context, 64, 2).unwrap();
    let (_points, srv) = mesh_points(&context, 6);

    system.append_emitters(&mut scheduler, &srv, 1.0).unwrap();
    assert_eq!(system.emitted_count(), 6);
    system.update(&mut scheduler, EMIT_INTERVAL).unwrap();
    assert_eq!(system.live_count(&mut scheduler).unwrap(), 2);

    // Living particles are left alone, the next two dead ones respawn
    system.update(&mut scheduler, EMIT_INTERVAL).unwrap();
    assert_eq!(system.emissions(), 2);
    assert_eq!(system.live_count(&mut scheduler).unwrap(), 4);
}

#[test]
fn test_positions_restored_from_last_upload_after_reset() {
    let (context, handle) = small_context();
    let mut scheduler = context.scheduler();
    let mut system = GpuParticleSystem::new(&context, 64, 16).unwrap();
    let (_points, srv) = mesh_points(&context, 2);

    system.append_emitters(&mut scheduler, &srv, 1.0).unwrap();
    system.update(&mut scheduler, EMIT_INTERVAL).unwrap();

    handle.simulate_device_lost();
    assert_eq!(scheduler.begin_frame().unwrap(), FrameStatus::Skipped);
    handle.simulate_device_available();
    assert_eq!(scheduler.begin_frame().unwrap(), FrameStatus::Ready);

    // The mirror holds the respawned particles, not the GPU update after them
    let particles = system.read_particles(&mut scheduler).unwrap();
    assert_eq!(particles[0], Vec4::new(0.0, 1.0, 2.0, SPAWN_LIFE));
    assert_eq!(particles[1], Vec4::new(1.0, 1.0, 2.0, SPAWN_LIFE));
    assert_eq!(particles[2], DEAD_PARTICLE);
}
