//! # authgate Providers
//!
//! Identity provider adapters. Every OAuth vendor implements the closed
//! [`OAuthProvider`] contract; the e-mail magic link lives in
//! [`email::EmailProvider`] because its shape differs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod email;
pub mod registry;
pub mod traits;

mod apple;
mod facebook;
mod github;
mod google;
mod http;
mod microsoft;

pub use apple::AppleProvider;
pub use email::{
    EmailError, EmailMessage, EmailProvider, EmailSender, EmailTokenClaims, EmailTokenSigner,
    TokenError,
};
pub use facebook::FacebookProvider;
pub use github::GithubProvider;
pub use google::GoogleProvider;
pub use microsoft::MicrosoftProvider;
pub use registry::ProviderRegistry;
pub use traits::{AuthorizationRequest, OAuthProvider, ProviderError};
