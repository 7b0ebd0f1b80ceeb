//! Unit tests for resource/buffer.rs
//!
//! Tests creation-time validation, resize, upload, copy and content tracking
//! against the mock graphics device.

use super::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{mock_context, mock_context_with, MockControl};

fn rw_flags() -> AccessFlags {
    AccessFlags::CPU_READ | AccessFlags::CPU_WRITE | AccessFlags::GPU_READ
}

fn bytes(values: &[u32]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

// ============================================================================
// VALIDATION TESTS
// ============================================================================

#[test]
fn test_validate_immutable_rejects_writes() {
    let desc = BufferDesc::new(
        BufferUsage::Static,
        AccessFlags::GPU_READ | AccessFlags::GPU_WRITE | AccessFlags::IMMUTABLE,
        16,
    );
    let result = validate_desc(&desc, Capabilities::all(), Some(&[0u8; 16]));
    assert!(matches!(result, Err(Error::ResourceCreation(_))));
}

#[test]
fn test_validate_immutable_needs_initial_data() {
    let desc = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ | AccessFlags::IMMUTABLE, 16);
    assert!(matches!(
        validate_desc(&desc, Capabilities::all(), None),
        Err(Error::ResourceCreation(_))
    ));
    assert!(validate_desc(&desc, Capabilities::all(), Some(&[1u8; 16])).is_ok());
}

#[test]
fn test_validate_immutable_rejects_dynamic() {
    let desc = BufferDesc::new(BufferUsage::Dynamic, AccessFlags::GPU_READ | AccessFlags::IMMUTABLE, 16);
    assert!(matches!(
        validate_desc(&desc, Capabilities::all(), Some(&[0u8; 16])),
        Err(Error::ResourceCreation(_))
    ));
}

#[test]
fn test_validate_capabilities() {
    let mappable = BufferDesc::new(BufferUsage::Static, AccessFlags::CPU_READ, 16);
    assert!(validate_desc(&mappable, Capabilities::MAPPABLE, None).is_ok());
    assert!(validate_desc(&mappable, Capabilities::COMPUTE_TARGET, None).is_err());

    let unordered = BufferDesc::new(
        BufferUsage::Static,
        AccessFlags::GPU_WRITE | AccessFlags::GPU_UNORDERED,
        16,
    );
    assert!(matches!(
        validate_desc(&unordered, Capabilities::MAPPABLE, None),
        Err(Error::ResourceCreation(_))
    ));
    assert!(validate_desc(&unordered, Capabilities::MAPPABLE | Capabilities::COMPUTE_TARGET, None).is_ok());
}

#[test]
fn test_validate_structured_needs_stride_and_capability() {
    let desc = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ | AccessFlags::GPU_STRUCTURED, 64);
    assert!(validate_desc(&desc, Capabilities::all(), None).is_err());
    let desc = desc.with_stride(16);
    assert!(validate_desc(&desc, Capabilities::all(), None).is_ok());
    assert!(validate_desc(&desc, Capabilities::MAPPABLE | Capabilities::COMPUTE_TARGET, None).is_err());
}

#[test]
fn test_validate_counter_needs_unordered() {
    let desc = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_WRITE | AccessFlags::COUNTER, 16);
    assert!(validate_desc(&desc, Capabilities::all(), None).is_err());
}

#[test]
fn test_validate_sizes() {
    let zero = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ, 0);
    assert!(matches!(validate_desc(&zero, Capabilities::all(), None), Err(Error::ResourceCreation(_))));

    let ragged = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ, 10).with_stride(4);
    assert!(matches!(validate_desc(&ragged, Capabilities::all(), None), Err(Error::ResourceCreation(_))));

    let small = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ, 4);
    assert!(matches!(
        validate_desc(&small, Capabilities::all(), Some(&[0u8; 8])),
        Err(Error::SizeMismatch(_))
    ));
}

// ============================================================================
// CREATION TESTS
// ============================================================================

#[test]
fn test_create_with_initial_data() {
    let (context, control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, Some(&bytes(&[1, 2, 3, 4])), 4)
        .unwrap();

    assert_eq!(buffer.size(), 16);
    assert_eq!(buffer.stride(), 4);
    assert_eq!(buffer.element_count(), 4);
    assert_eq!(buffer.binding(), BufferBinding::Vertex);
    assert_eq!(buffer.generation(), 0);
    assert_eq!(buffer.lifecycle_state(), ResourceState::Unbound);
    assert_eq!(buffer.content_state(), ContentState::Valid);
    assert!(!buffer.has_mirror());
    assert_eq!(MockControl::count(&control.buffers_created), 1);
}

#[test]
fn test_create_without_data_is_undefined() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_index_buffer(BufferUsage::Dynamic, AccessFlags::GPU_READ, 8, None, 2)
        .unwrap();
    assert_eq!(buffer.content_state(), ContentState::Undefined);
    assert_eq!(buffer.binding(), BufferBinding::Index);
}

#[test]
fn test_create_with_partial_data_is_undefined() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, Some(&[1u8; 8]), 0)
        .unwrap();
    assert_eq!(buffer.content_state(), ContentState::Undefined);
}

#[test]
fn test_create_unmappable_on_compute_only_device() {
    let (context, _control) = mock_context_with(Capabilities::COMPUTE_TARGET);
    let result = context.make_vertex_buffer(BufferUsage::Static, AccessFlags::CPU_READ, 16, None, 0);
    assert!(matches!(result, Err(Error::ResourceCreation(_))));
}

#[test]
fn test_immutable_buffer_keeps_mirror() {
    let (context, _control) = mock_context();
    let data = bytes(&[5, 6]);
    let buffer = context
        .make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            8,
            Some(&data),
            4,
        )
        .unwrap();
    assert_eq!(buffer.mirror(), Some(data));
}

#[test]
fn test_create_while_device_lost() {
    let (context, control) = mock_context();
    control.lose_device();
    let result = context.make_vertex_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 16, None, 0);
    assert!(matches!(result, Err(Error::DeviceLost(_))));
}

// ============================================================================
// UPDATE TESTS
// ============================================================================

#[test]
fn test_update_immutable_fails() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            16,
            Some(&[0u8; 16]),
            0,
        )
        .unwrap();
    let result = buffer.update_subresource(0, &[1u8; 4]);
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
}

#[test]
fn test_update_out_of_range() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0)
        .unwrap();
    assert!(matches!(buffer.update_subresource(12, &[0u8; 8]), Err(Error::SizeMismatch(_))));
    assert!(matches!(buffer.update_subresource(u64::MAX, &[0u8; 1]), Err(Error::SizeMismatch(_))));
    assert!(buffer.update_subresource(12, &[0u8; 4]).is_ok());
}

#[test]
fn test_update_while_mapped_fails() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0)
        .unwrap();
    let _mapper = buffer.map(BufferAccess::ReadOnly).unwrap();
    let result = buffer.update_subresource(0, &[0u8; 4]);
    assert!(matches!(result, Err(Error::ConcurrentAccess(_))));
}

#[test]
fn test_update_content_state() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0)
        .unwrap();

    buffer.update_subresource(0, &[1u8; 8]).unwrap();
    assert_eq!(buffer.content_state(), ContentState::Undefined);

    buffer.update_subresource(0, &[1u8; 16]).unwrap();
    assert_eq!(buffer.content_state(), ContentState::Valid);

    buffer.update_subresource(4, &[2u8; 4]).unwrap();
    assert_eq!(buffer.content_state(), ContentState::Valid);
}

#[test]
fn test_partial_pass_write_keeps_content_state() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0)
        .unwrap();

    buffer.shared().write_range(4, &[3u8; 4]).unwrap();
    assert_eq!(buffer.content_state(), ContentState::Undefined);

    buffer.shared().mark_written();
    assert_eq!(buffer.content_state(), ContentState::Valid);
}

#[test]
fn test_update_tracks_mirror() {
    let (context, _control) = mock_context();
    let desc = BufferDesc::new(BufferUsage::Static, rw_flags(), 8).with_mirror();
    let buffer = context.create_buffer(desc, None).unwrap();

    assert_eq!(buffer.mirror(), Some(vec![0u8; 8]));
    buffer.update_subresource(2, &[7, 8]).unwrap();
    assert_eq!(buffer.mirror(), Some(vec![0, 0, 7, 8, 0, 0, 0, 0]));
}

// ============================================================================
// RESIZE TESTS
// ============================================================================

#[test]
fn test_resize_static_fails() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0)
        .unwrap();
    assert!(matches!(buffer.resize(32), Err(Error::InvalidOperation(_))));
    assert_eq!(buffer.size(), 16);
}

#[test]
fn test_resize_dynamic() {
    let (context, control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Dynamic, rw_flags(), 16, Some(&[1u8; 16]), 4)
        .unwrap();

    // Shrinking keeps the storage
    buffer.resize(8).unwrap();
    assert_eq!(buffer.size(), 8);
    assert_eq!(buffer.generation(), 0);
    assert_eq!(buffer.content_state(), ContentState::Undefined);
    assert_eq!(MockControl::count(&control.buffers_created), 1);

    // Growing back within capacity still keeps it
    buffer.resize(16).unwrap();
    assert_eq!(buffer.generation(), 0);

    // Growing past capacity reallocates
    buffer.resize(64).unwrap();
    assert_eq!(buffer.size(), 64);
    assert_eq!(buffer.generation(), 1);
    assert_eq!(MockControl::count(&control.buffers_created), 2);
}

#[test]
fn test_resize_rejects_bad_sizes() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Dynamic, rw_flags(), 16, None, 4)
        .unwrap();
    assert!(matches!(buffer.resize(0), Err(Error::SizeMismatch(_))));
    assert!(matches!(buffer.resize(10), Err(Error::SizeMismatch(_))));
}

#[test]
fn test_resize_while_mapped_fails() {
    let (context, _control) = mock_context();
    let buffer = context
        .make_vertex_buffer(BufferUsage::Dynamic, rw_flags(), 16, None, 0)
        .unwrap();
    let _mapper = buffer.map(BufferAccess::ReadOnly).unwrap();
    assert!(matches!(buffer.resize(32), Err(Error::ConcurrentAccess(_))));
}

#[test]
fn test_resize_zero_fills_mirror() {
    let (context, _control) = mock_context();
    let desc = BufferDesc::new(BufferUsage::Dynamic, rw_flags(), 4).with_mirror();
    let buffer = context.create_buffer(desc, Some(&[9u8; 4])).unwrap();
    buffer.resize(8).unwrap();
    assert_eq!(buffer.mirror(), Some(vec![0u8; 8]));
}

// ============================================================================
// COPY TESTS
// ============================================================================

#[test]
fn test_copy_round_trip() {
    let (context, _control) = mock_context();
    let src = context
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::GPU_READ, 16, Some(&bytes(&[1, 2, 3, 4])), 4)
        .unwrap();
    let dst = context
        .make_vertex_buffer(BufferUsage::Static, AccessFlags::CPU_READ, 32, None, 4)
        .unwrap();

    src.copy_to_buffer(&dst).unwrap();
    assert_eq!(dst.content_state(), ContentState::Valid);
    assert_eq!(src.lifecycle_state(), ResourceState::Bound);
    assert_eq!(dst.lifecycle_state(), ResourceState::Bound);

    let mapper = dst.map(BufferAccess::ReadOnly).unwrap();
    let values: Vec<u32> = mapper.read_as();
    assert_eq!(&values[..4], &[1, 2, 3, 4]);
}

#[test]
fn test_copy_destination_too_small() {
    let (context, _control) = mock_context();
    let src = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 32, None, 0).unwrap();
    let dst = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    assert!(matches!(src.copy_to_buffer(&dst), Err(Error::SizeMismatch(_))));
}

#[test]
fn test_copy_onto_itself_fails() {
    let (context, _control) = mock_context();
    let buffer = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    assert!(matches!(buffer.copy_to_buffer(&buffer), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_copy_to_immutable_fails() {
    let (context, _control) = mock_context();
    let src = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    let dst = context
        .make_vertex_buffer(
            BufferUsage::Static,
            AccessFlags::GPU_READ | AccessFlags::IMMUTABLE,
            16,
            Some(&[0u8; 16]),
            0,
        )
        .unwrap();
    assert!(matches!(src.copy_to_buffer(&dst), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_copy_while_mapped_fails() {
    let (context, _control) = mock_context();
    let src = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    let dst = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    let _mapper = dst.map(BufferAccess::ReadOnly).unwrap();
    assert!(matches!(src.copy_to_buffer(&dst), Err(Error::ConcurrentAccess(_))));
}

#[test]
fn test_copy_propagates_undefined_content() {
    let (context, _control) = mock_context();
    let src = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    let dst = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, Some(&[1u8; 16]), 0)
        .unwrap();
    src.copy_to_buffer(&dst).unwrap();
    assert_eq!(dst.content_state(), ContentState::Undefined);
}

#[test]
fn test_copy_updates_destination_mirror() {
    let (context, control) = mock_context();
    let mut scheduler = context.scheduler();
    let src = context
        .make_vertex_buffer(BufferUsage::Static, rw_flags(), 8, Some(&[1, 2, 3, 4, 5, 6, 7, 8]), 0)
        .unwrap();
    let desc = BufferDesc::new(BufferUsage::Static, rw_flags(), 16).with_mirror();
    let dst = context.create_buffer(desc, Some(&[9u8; 16])).unwrap();

    src.copy_to_buffer(&dst).unwrap();
    let expected = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 9, 9, 9, 9, 9];
    assert_eq!(dst.mirror(), Some(expected.clone()));

    // The copied bytes come back after a reset
    control.lose_device();
    context.lifecycle().notify_device_lost();
    control.restore_device();
    context.lifecycle().notify_device_reset(&mut scheduler).unwrap();
    assert_eq!(dst.content_state(), ContentState::Valid);
    assert_eq!(dst.map(BufferAccess::ReadOnly).unwrap().as_slice(), expected.as_slice());
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_unbound_buffer_becomes_lost() {
    let (context, _control) = mock_context();
    let buffer = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    context.lifecycle().notify_device_lost();

    assert_eq!(buffer.lifecycle_state(), ResourceState::Lost);
    assert_eq!(buffer.content_state(), ContentState::Undefined);
    assert!(matches!(buffer.update_subresource(0, &[0u8; 4]), Err(Error::DeviceLost(_))));
    assert!(matches!(buffer.map(BufferAccess::ReadOnly), Err(Error::DeviceLost(_))));
}

#[test]
fn test_ids_are_distinct() {
    let (context, _control) = mock_context();
    let a = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    let b = context.make_vertex_buffer(BufferUsage::Static, rw_flags(), 16, None, 0).unwrap();
    assert_ne!(a.id(), b.id());
    assert!(format!("{:?}", a).contains("Buffer"));
}
