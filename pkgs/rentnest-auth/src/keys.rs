//! Persisted key schema.
//!
//! These names are read back by every installed version of the app on a
//! device, so they never change.

pub const ACCESS_TOKEN: &str = "access_token";
pub const USER_INFO: &str = "user_info";
pub const ROLE: &str = "role";
pub const EMAIL: &str = "email";
pub const NAME: &str = "name";
pub const USER_ID: &str = "user_id";
pub const PHONE: &str = "phone";
pub const USER_EMAIL: &str = "user_email";
pub const LANDLORD_INFO: &str = "landlord_info";
pub const TENANT_INFO: &str = "tenant_info";
pub const SAVED_PROPERTIES: &str = "saved_properties";
/// Legacy user blob, only ever removed
pub const USER: &str = "user";

/// Everything a wipe removes.
pub const SESSION_KEYS: [&str; 12] = [
    ACCESS_TOKEN,
    USER_INFO,
    ROLE,
    EMAIL,
    NAME,
    USER_ID,
    PHONE,
    USER_EMAIL,
    LANDLORD_INFO,
    TENANT_INFO,
    SAVED_PROPERTIES,
    USER,
];
