pub mod events;
pub mod properties;

pub use events::{idempotency_key, synthesize, Distribution, EventsPerDay, DEFAULT_FIXED_TIME};
pub use properties::{generate_properties, parse_specs, PropertySpec, PropertySpecs};
