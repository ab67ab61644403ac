//! LDAP session seam and its ldap3 implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use stacks_core::error::{Result, StacksError};
use tracing::debug;

/// LDAP result code for a successful operation.
const LDAP_SUCCESS: u32 = 0;

/// A directory entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// First value of an attribute, matching the name case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// An open, possibly bound, directory connection.
#[async_trait]
pub trait LdapSession: Send {
    /// Simple bind. `Ok(false)` means the server refused the credentials.
    async fn bind(&mut self, dn: &str, password: &str) -> Result<bool>;

    /// Subtree search under `base`.
    async fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<LdapEntry>>;

    async fn unbind(&mut self) -> Result<()>;
}

#[async_trait]
pub trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Connects with ldap3, upgrading plain connections with StartTLS.
pub struct Ldap3Connector {
    url: String,
    starttls: bool,
    tls_verify: bool,
}

impl Ldap3Connector {
    /// `host` may be a bare host name or an `ldap://` / `ldaps://` URL.
    pub fn new(host: &str, port: u16, tls_verify: bool) -> Self {
        let (url, starttls) = if host.starts_with("ldaps://") {
            (with_port(host, port), false)
        } else if host.starts_with("ldap://") {
            (with_port(host, port), true)
        } else {
            (format!("ldap://{host}:{port}"), true)
        };
        Self {
            url,
            starttls,
            tls_verify,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn uses_starttls(&self) -> bool {
        self.starttls
    }
}

/// Append the port unless the URL already names one.
fn with_port(url: &str, port: u16) -> String {
    let authority = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = authority.trim_end_matches('/');
    if authority.contains(':') {
        url.trim_end_matches('/').to_string()
    } else {
        format!("{}:{port}", url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LdapConnector for Ldap3Connector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = LdapConnSettings::new()
            .set_starttls(self.starttls)
            .set_no_tls_verify(!self.tls_verify);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| StacksError::Backend(format!("LDAP connect to {} failed: {e}", self.url)))?;

        ldap3::drive!(conn);

        debug!(url = %self.url, starttls = self.starttls, "LDAP connection opened");
        Ok(Box::new(Ldap3Session { ldap }))
    }
}

pub struct Ldap3Session {
    ldap: Ldap,
}

#[async_trait]
impl LdapSession for Ldap3Session {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<bool> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| StacksError::Backend(format!("LDAP bind failed: {e}")))?;
        debug!(dn = %dn, rc = result.rc, "LDAP bind result");
        Ok(result.rc == LDAP_SUCCESS)
    }

    async fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<LdapEntry>> {
        let (results, _) = self
            .ldap
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .await
            .map_err(|e| StacksError::Backend(format!("LDAP search failed: {e}")))?
            .success()
            .map_err(|e| StacksError::Backend(format!("LDAP search error: {e}")))?;

        Ok(results
            .into_iter()
            .map(|entry| {
                let se = SearchEntry::construct(entry);
                LdapEntry {
                    dn: se.dn,
                    attrs: se.attrs,
                }
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| StacksError::Backend(format!("LDAP unbind failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_uses_starttls() {
        let connector = Ldap3Connector::new("ldap.example.edu", 389, true);
        assert_eq!(connector.url(), "ldap://ldap.example.edu:389");
        assert!(connector.uses_starttls());
    }

    #[test]
    fn ldaps_skips_starttls() {
        let connector = Ldap3Connector::new("ldaps://ldap.example.edu", 636, true);
        assert_eq!(connector.url(), "ldaps://ldap.example.edu:636");
        assert!(!connector.uses_starttls());
    }

    #[test]
    fn explicit_port_kept() {
        let connector = Ldap3Connector::new("ldap://ldap.example.edu:1389/", 389, false);
        assert_eq!(connector.url(), "ldap://ldap.example.edu:1389");
        assert!(connector.uses_starttls());
    }

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = LdapEntry {
            dn: "uid=jdoe,ou=people,dc=example,dc=edu".into(),
            attrs: HashMap::from([("givenName".to_string(), vec!["Jane".to_string()])]),
        };
        assert_eq!(entry.first_value("givenname"), Some("Jane"));
        assert_eq!(entry.first_value("GIVENNAME"), Some("Jane"));
        assert!(entry.first_value("sn").is_none());
    }
}
