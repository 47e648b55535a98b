pub mod debug;
pub mod device;
pub mod gfx_device;
