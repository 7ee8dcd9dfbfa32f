//! 공급량 스냅샷 기반 기간별 변화량 계산.

pub mod delta;

pub use delta::{compute_supply_deltas, percent_change};
