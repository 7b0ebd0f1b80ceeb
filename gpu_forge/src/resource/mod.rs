/// Resource module - logical buffers, views and mappers

pub mod buffer;
pub mod view;
pub mod mapper;

pub use buffer::{validate_desc, Buffer, ContentState};
pub(crate) use buffer::BufferShared;
pub use view::{
    make_shader_resource_view, make_unordered_access_view,
    make_unordered_access_view_with_counter, BufferView, ShaderResourceView,
    UnorderedAccessView, ViewKind,
};
pub use mapper::Mapper;
