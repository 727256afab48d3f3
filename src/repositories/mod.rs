//! 데이터 액세스 계층을 담당하는 리포지토리 모듈
//!
//! 사용자 레코드는 외부 관계형 저장소가 소유하며, 이 크레이트는 이미 검증된
//! 숫자 사용자 ID만 받습니다. 여기서는 캐시 기반 세션 저장소만 제공합니다.

pub mod sessions;
