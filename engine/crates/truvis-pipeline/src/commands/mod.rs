pub mod command_buffer;
pub mod command_recorder;
