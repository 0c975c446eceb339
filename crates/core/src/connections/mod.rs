pub mod connections_model;
pub mod connections_traits;

pub use connections_model::{
    Institution, InstitutionConnection, NewInstitution, NewInstitutionConnection,
    NewProviderConnection, Provider, ProviderConnection,
};
pub use connections_traits::{
    InstitutionConnectionRepositoryTrait, InstitutionRepositoryTrait,
    ProviderConnectionRepositoryTrait, ProviderRepositoryTrait,
};
