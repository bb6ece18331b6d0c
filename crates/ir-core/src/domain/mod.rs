//! 연동 동기화를 위한 도메인 모델.

mod checkpoint;
mod data_point;
mod provider;
mod workspace;

pub use checkpoint::*;
pub use data_point::*;
pub use provider::*;
pub use workspace::*;
