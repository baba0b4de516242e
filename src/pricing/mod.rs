pub mod calculator;
pub mod special_price;
pub mod tier_matrix;
