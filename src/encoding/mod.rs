pub mod bincode;
pub mod keycode;
