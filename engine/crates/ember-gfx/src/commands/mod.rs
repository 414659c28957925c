pub mod barrier;
pub mod command_buffer;
pub mod label_color;
pub mod one_time;
