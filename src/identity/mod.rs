//! OIDC client registration.
//!
//! An instance registers its client once with the identity provider's
//! dynamic registration endpoint and keeps the answer sealed in the instance
//! directory.

mod client;
mod discovery;
mod registration;

pub use client::{ClientInit, IdentityClient};
pub use discovery::discover_registration_endpoint;
pub use registration::{redirect_uri, ClientRegistration, RegistrationRequest, SCOPES};
