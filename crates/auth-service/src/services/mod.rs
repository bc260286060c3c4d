pub mod token_issuer;
pub mod token_validator;
