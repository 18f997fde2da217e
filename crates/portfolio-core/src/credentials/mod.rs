// # Credential Resolvers
//
// Implementations of the CredentialResolver trait.
//
// - `EnvCredentialResolver`: named bundles whose fields map to environment
//   variables
// - `MemoryCredentialResolver`: bundles held in memory (tests, embedding)

pub mod env;
pub mod memory;

pub use env::EnvCredentialResolver;
pub use memory::MemoryCredentialResolver;
