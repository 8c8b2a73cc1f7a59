pub mod api;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod risk;
pub mod state;
pub mod storage;
pub mod view;
