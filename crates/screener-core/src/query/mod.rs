//! 선언적 스캐너 쿼리.
//!
//! - [`field`]: 필드 참조와 연산자별 빌더 메서드
//! - [`filter`]: 필터 표현식 트리
//! - [`builder`]: 쿼리 빌더
//! - [`wire`]: 원격 요청 형식으로의 컴파일 및 복원

pub mod builder;
pub mod field;
pub mod filter;
pub mod wire;

pub use builder::*;
pub use field::*;
pub use filter::*;
pub use wire::*;

/// 결과 테이블의 종목 식별자 컬럼 이름.
pub const TICKER_COLUMN: &str = "ticker";
