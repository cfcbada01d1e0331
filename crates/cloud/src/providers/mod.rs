//! One backend per [`ProviderKind`](dbprov_core::types::ProviderKind).

pub mod mongodb;
pub mod neon;
pub mod planetscale;
pub mod supabase;
pub mod upstash;

pub use mongodb::MongodbProvider;
pub use neon::NeonProvider;
pub use planetscale::PlanetscaleProvider;
pub use supabase::SupabaseProvider;
pub use upstash::UpstashProvider;
