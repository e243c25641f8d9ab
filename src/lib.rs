pub mod config;
pub mod events;
pub mod gallery;
pub mod processing {
    pub mod resize;
}
pub mod tasks {
    pub mod gesture;
    pub mod loader;
    pub mod source;
    pub mod viewer;
}
