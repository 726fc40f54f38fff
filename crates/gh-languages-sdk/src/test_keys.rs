//! Key material shared by unit tests. Generated for testing only.

pub(crate) const RSA_PKCS1_PEM: &str = include_str!("../tests/fixtures/app_key_pkcs1.pem");
pub(crate) const RSA_PKCS8_PEM: &str = include_str!("../tests/fixtures/app_key_pkcs8.pem");
pub(crate) const RSA_PUBLIC_PEM: &str = include_str!("../tests/fixtures/app_key_public.pem");
pub(crate) const EC_PEM: &str = include_str!("../tests/fixtures/ec_key.pem");
