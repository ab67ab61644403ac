//! Stacks LDAP -- patron authentication against an LDAP directory.
//!
//! Patrons are located by a configured username attribute, verified with a
//! bind as their own entry, and their directory attributes are mapped onto
//! the stored patron record.

pub mod auth;
pub mod session;
