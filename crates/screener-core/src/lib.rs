//! # Screener Core
//!
//! 시장 스캐너 쿼리의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 필드 참조 및 필터 표현식 트리
//! - 선언적 쿼리 빌더와 원격 요청 컴파일러
//! - 조회 결과 테이블
//! - 타임프레임(해상도) 정의
//! - 로깅 인프라

pub mod error;
pub mod logging;
pub mod query;
pub mod table;
pub mod types;

pub use error::*;
pub use logging::*;
pub use query::*;
pub use table::*;
pub use types::*;
