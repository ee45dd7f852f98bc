mod geo;
mod postcode;
mod pricing;

pub use geo::haversine_km;
pub use postcode::outward_prefix;
pub use pricing::{discounted_total, PriceBreakdown};
