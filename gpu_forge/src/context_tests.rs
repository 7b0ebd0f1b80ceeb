//! Unit tests for context.rs
//!
//! Tests the resource factory helpers, the default frame buffer and the
//! capability queries.

use super::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{mock_context, mock_context_with, MockControl};
use crate::lifecycle::ResourceState;
use crate::resource::ViewKind;

fn compute_flags() -> AccessFlags {
    AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED
}

#[test]
fn test_default_frame_buffer() {
    let (context, _control) = mock_context();
    let frame_buffer = context.default_frame_buffer();
    assert_eq!(frame_buffer.name(), "default");
    assert_eq!((frame_buffer.width(), frame_buffer.height()), (4, 4));
    assert_eq!(frame_buffer.lifecycle_state(), ResourceState::Unbound);
}

#[test]
fn test_clones_share_the_device() {
    let (context, control) = mock_context();
    let clone = context.clone();
    let _buffer = clone
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 16, None, 4)
        .unwrap();

    assert_eq!(MockControl::count(&control.buffers_created), 1);
    assert_eq!(context.lifecycle().resource_count(), 2);
    assert_eq!(clone.default_frame_buffer(), context.default_frame_buffer());
}

#[test]
fn test_vertex_and_index_helpers() {
    let (context, _control) = mock_context();
    let vertices = context
        .make_vertex_buffer(BufferUsage::Dynamic, AccessFlags::GPU_READ, 64, None, 16)
        .unwrap();
    let indices = context
        .make_index_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 12, Some(&[0u8; 12]), 2)
        .unwrap();

    assert_eq!(vertices.binding(), BufferBinding::Vertex);
    assert_eq!(vertices.stride(), 16);
    assert_eq!(vertices.element_count(), 4);
    assert_eq!(indices.binding(), BufferBinding::Index);
    assert_eq!(indices.element_count(), 6);
}

#[test]
fn test_view_helpers() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, compute_flags() | AccessFlags::COUNTER, 64, None, 4)
        .unwrap();

    let srv = context.make_buffer_srv(&buffer, ElementFormat::R32_UINT).unwrap();
    let uav = context.make_buffer_uav(&buffer, ElementFormat::R32_UINT).unwrap();
    let counted = context
        .make_buffer_uav_with_counter(&buffer, ElementFormat::R32_UINT, 0)
        .unwrap();

    assert_eq!(srv.kind(), ViewKind::ShaderResource);
    assert_eq!(uav.kind(), ViewKind::UnorderedAccess);
    assert_eq!(uav.initial_counter(), None);
    assert_eq!(counted.initial_counter(), Some(0));
}

#[test]
fn test_compute_buffer_on_legacy_profile_fails() {
    let (context, _control) = mock_context_with(Capabilities::MAPPABLE);
    let result = context.make_vertex_buffer(BufferUsage::Static, compute_flags(), 64, None, 4);
    assert!(matches!(result, Err(Error::ResourceCreation(_))));
}

#[test]
fn test_offscreen_frame_buffer() {
    let (context, control) = mock_context();
    let frame_buffer = context
        .make_frame_buffer(FrameBufferDesc::new("scene", 8, 2))
        .unwrap();
    assert_eq!(frame_buffer.read_color(0).unwrap().len(), 16);
    assert_eq!(MockControl::count(&control.frame_buffers_created), 2);

    let result = context.make_frame_buffer(FrameBufferDesc::new("empty", 0, 2));
    assert!(matches!(result, Err(Error::ResourceCreation(_))));
}

#[test]
fn test_stats_follow_the_device() {
    let (context, _control) = mock_context();
    let mut scheduler = context.scheduler();
    let vertices = context
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 48, None, 16)
        .unwrap();
    scheduler.begin_frame().unwrap();
    scheduler.bind_vertex_stream(0, &vertices, 16).unwrap();
    scheduler.draw(3, 0).unwrap();

    assert_eq!(context.stats().unwrap().draw_calls, 1);
}
