pub mod client;
pub mod oauth;
pub mod resolver;
pub mod soql;

pub use client::{
    CrmClient, CrmRequest, CrmResponse, CrmTransport, HttpMethod, HttpTransport, QueryResult,
    RequestBody,
};
pub use oauth::{FreshToken, HttpTokenRefresher, OAuthApp, TokenExchange};
pub use resolver::{CredentialResolver, ResolvedAuth};
pub use soql::substitute_current_user;
