use super::*;
use crate::error::Error;
use crate::graphics_device::{BufferUsage, BufferDesc};
use crate::graphics_device::mock_graphics_device::mock_context;

fn compute_flags() -> AccessFlags {
    AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED
}

#[test]
fn test_srv_needs_gpu_read() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::CPU_READ, 16, None, 4)
        .unwrap();
    let result = make_shader_resource_view(&buffer, ElementFormat::R32_UINT);
    assert!(matches!(result, Err(Error::IncompatibleAccess(_))));
}

#[test]
fn test_uav_needs_unordered_access() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 16, None, 4)
        .unwrap();
    let result = make_unordered_access_view(&buffer, ElementFormat::R32_UINT);
    assert!(matches!(result, Err(Error::IncompatibleAccess(_))));
}

#[test]
fn test_views_on_compute_buffer() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, compute_flags(), 64, None, 4)
        .unwrap();

    let srv = make_shader_resource_view(&buffer, ElementFormat::R32_UINT).unwrap();
    let uav = make_unordered_access_view(&buffer, ElementFormat::R32_UINT).unwrap();

    assert_eq!(srv.kind(), ViewKind::ShaderResource);
    assert_eq!(uav.kind(), ViewKind::UnorderedAccess);
    assert_eq!(srv.buffer_id(), buffer.id());
    assert_eq!(srv.element_count().unwrap(), 16);
    assert!(srv.aliases(&uav));
}

#[test]
fn test_views_compare_by_buffer_and_format() {
    let (context, _control) = mock_context();
    let a = context.make_vertex_buffer(BufferUsage::Static, compute_flags(), 64, None, 4).unwrap();
    let b = context.make_vertex_buffer(BufferUsage::Static, compute_flags(), 64, None, 4).unwrap();

    let a1 = make_shader_resource_view(&a, ElementFormat::R32_UINT).unwrap();
    let a2 = make_shader_resource_view(&a, ElementFormat::R32_UINT).unwrap();
    let a3 = make_shader_resource_view(&a, ElementFormat::R32_SFLOAT).unwrap();
    let b1 = make_shader_resource_view(&b, ElementFormat::R32_UINT).unwrap();

    assert_eq!(a1, a2);
    assert_ne!(a1, a3);
    assert_ne!(a1, b1);
}

#[test]
fn test_view_observes_resize() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Dynamic, compute_flags(), 64, None, 4)
        .unwrap();
    let srv = make_shader_resource_view(&buffer, ElementFormat::R32_UINT).unwrap();

    buffer.resize(256).unwrap();
    assert_eq!(srv.element_count().unwrap(), 64);
}

#[test]
fn test_view_format_must_tile_buffer() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, compute_flags(), 24, None, 4)
        .unwrap();
    let result = make_shader_resource_view(&buffer, ElementFormat::R32G32B32A32_SFLOAT);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
}

#[test]
fn test_structured_view_must_match_stride() {
    let (context, _control) = mock_context();
    let desc = BufferDesc::new(
        BufferUsage::Static,
        compute_flags() | AccessFlags::GPU_STRUCTURED,
        64,
    )
    .with_stride(16);
    let buffer = context.create_buffer(desc, None).unwrap();

    assert!(make_shader_resource_view(&buffer, ElementFormat::R32G32B32A32_SFLOAT).is_ok());
    assert!(matches!(
        make_shader_resource_view(&buffer, ElementFormat::R32_UINT),
        Err(Error::InvalidOperation(_))
    ));
}

#[test]
fn test_counter_view() {
    let (context, _control) = mock_context();
    let plain = context.make_vertex_buffer(BufferUsage::Static, compute_flags(), 16, None, 4).unwrap();
    assert!(matches!(
        make_unordered_access_view_with_counter(&plain, ElementFormat::R32_UINT, 0),
        Err(Error::IncompatibleAccess(_))
    ));

    let counted = context
        .make_vertex_buffer(BufferUsage::Static, compute_flags() | AccessFlags::COUNTER, 16, None, 4)
        .unwrap();
    let uav = make_unordered_access_view_with_counter(&counted, ElementFormat::R32_UINT, 3).unwrap();
    assert_eq!(uav.initial_counter(), Some(3));
}

#[test]
fn test_view_of_dropped_buffer() {
    let (context, _control) = mock_context();
    let buffer = context.make_vertex_buffer(BufferUsage::Static, compute_flags(), 16, None, 4).unwrap();
    let srv = make_shader_resource_view(&buffer, ElementFormat::R32_UINT).unwrap();
    assert!(srv.is_alive());

    drop(buffer);
    assert!(!srv.is_alive());
    assert!(matches!(srv.element_count(), Err(Error::InvalidResource(_))));
}
