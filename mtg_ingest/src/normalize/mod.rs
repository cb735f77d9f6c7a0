//! Record normalizers: provider JSON to canonical entities

pub mod card;
pub mod price;

pub use card::normalize_card;
pub use price::PriceNormalizer;
