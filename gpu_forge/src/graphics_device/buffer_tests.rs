use super::*;

#[test]
fn test_element_format_size_bytes() {
    assert_eq!(ElementFormat::R8_UINT.size_bytes(), 1);
    assert_eq!(ElementFormat::R16_UINT.size_bytes(), 2);
    assert_eq!(ElementFormat::R32_UINT.size_bytes(), 4);
    assert_eq!(ElementFormat::R32_SFLOAT.size_bytes(), 4);
    assert_eq!(ElementFormat::R32G32_SFLOAT.size_bytes(), 8);
    assert_eq!(ElementFormat::R32G32B32_SFLOAT.size_bytes(), 12);
    assert_eq!(ElementFormat::R32G32B32A32_SFLOAT.size_bytes(), 16);
    assert_eq!(ElementFormat::R32G32B32A32_UINT.size_bytes(), 16);
}

#[test]
fn test_buffer_access_modes() {
    assert!(BufferAccess::ReadOnly.reads());
    assert!(!BufferAccess::ReadOnly.writes());
    assert!(!BufferAccess::WriteOnly.reads());
    assert!(BufferAccess::WriteOnly.writes());
    assert!(BufferAccess::ReadWrite.reads());
    assert!(BufferAccess::ReadWrite.writes());
}

#[test]
fn test_buffer_access_required_flags() {
    assert_eq!(BufferAccess::ReadOnly.required_flags(), AccessFlags::CPU_READ);
    assert_eq!(BufferAccess::WriteOnly.required_flags(), AccessFlags::CPU_WRITE);
    assert_eq!(
        BufferAccess::ReadWrite.required_flags(),
        AccessFlags::CPU_READ | AccessFlags::CPU_WRITE
    );
}

#[test]
fn test_buffer_desc_builder() {
    let desc = BufferDesc::new(BufferUsage::Dynamic, AccessFlags::GPU_READ, 64)
        .with_stride(16)
        .with_binding(BufferBinding::Index)
        .with_mirror();

    assert_eq!(desc.size, 64);
    assert_eq!(desc.stride, 16);
    assert_eq!(desc.usage, BufferUsage::Dynamic);
    assert_eq!(desc.binding, BufferBinding::Index);
    assert!(desc.retain_mirror);
}

#[test]
fn test_buffer_desc_defaults() {
    let desc = BufferDesc::new(BufferUsage::Static, AccessFlags::GPU_READ, 4);
    assert_eq!(desc.stride, 0);
    assert_eq!(desc.binding, BufferBinding::Vertex);
    assert!(!desc.retain_mirror);
}
