pub mod frame;
pub mod layout;
pub mod recorder;
pub mod rects;
pub mod renderer;
pub mod scene;
pub mod visuals;
