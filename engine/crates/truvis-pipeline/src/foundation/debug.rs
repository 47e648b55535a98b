use ash::vk::{self, Handle};

use crate::foundation::device::PipelineDevice;

/// 可以设置 debug name 的 native 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[inline]
fn object_type_of<H: vk::Handle>(_: &H) -> vk::ObjectType {
    H::TYPE
}

/// debug name 的格式为 `{type name}::{name}`
pub fn set_debug_name<T: DebugType>(device: &dyn PipelineDevice, object: &T, name: impl AsRef<str>) {
    let handle = object.vk_handle();
    let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
    device.set_object_debug_name(object_type_of(&handle), handle.as_raw(), &debug_name);
}

/// 给还没有被封装的 handle 设置 debug name
#[inline]
pub fn set_handle_debug_name<H: vk::Handle>(device: &dyn PipelineDevice, handle: H, name: impl AsRef<str>) {
    device.set_object_debug_name(H::TYPE, handle.as_raw(), name.as_ref());
}
