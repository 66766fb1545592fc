//! Targeting collaborators and tiered segment resolution — subdivision
//! (geographic) targeting, the anti-targeting resource, and the
//! parent-child → parent → untargeted fallback resolver.

pub mod anti_targeting;
pub mod resolver;
pub mod subdivision;

pub use anti_targeting::{AntiTargetingFilter, AntiTargetingResource, AntiTargetingSets, InMemoryAntiTargeting};
pub use resolver::{TargetingFallbackResolver, TargetingTier};
pub use subdivision::{AllowAllSubdivisions, StaticSubdivision, SubdivisionFilter, SubdivisionTargeting};
