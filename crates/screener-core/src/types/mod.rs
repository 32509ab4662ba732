//! 쿼리와 결과 전반에서 사용되는 공통 타입.

mod resolution;
mod scalar;

pub use resolution::*;
pub use scalar::*;
