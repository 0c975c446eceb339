pub mod model;
pub mod repository;

pub use model::{
    InstitutionConnectionDB, InstitutionDB, ProviderConnectionDB, ProviderDB,
};
pub use repository::{
    InstitutionConnectionRepository, InstitutionRepository, ProviderConnectionRepository,
    ProviderRepository,
};
