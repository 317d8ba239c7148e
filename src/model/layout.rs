//! Tenant routing of document paths.
//!
//! # Responsibilities
//! - Decide which tenant owns a path (or the commons pseudo-tenant)
//! - Re-address a tenant document under another tenant
//! - Locate the alias tree document
//!
//! # Design Decisions
//! - A path belongs to tenant `T` only when it has at least one segment
//!   below `<tenants_root>/T/`; files directly in the root are commons
//! - No normalization of tenant keys; they are matched verbatim

/// Reserved tenant key for paths that are not under any tenant folder.
pub const COMMONS_TENANT: &str = "commons";

/// Where tenant folders live and where the alias tree document is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    tenants_root: String,
    alias_file: String,
}

impl PathLayout {
    /// Create a layout. Trailing slashes on the root are ignored.
    pub fn new(tenants_root: impl Into<String>, alias_file: impl Into<String>) -> Self {
        let root: String = tenants_root.into();
        Self {
            tenants_root: root.trim_end_matches('/').to_string(),
            alias_file: alias_file.into(),
        }
    }

    pub fn tenants_root(&self) -> &str {
        &self.tenants_root
    }

    /// Absolute path of the alias tree document.
    pub fn alias_path(&self) -> String {
        format!("{}/{}", self.tenants_root, self.alias_file)
    }

    /// Split a tenant path into `(tenant, suffix)`.
    fn split<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = path
            .strip_prefix(self.tenants_root.as_str())?
            .strip_prefix('/')?;
        let (tenant, suffix) = rest.split_once('/')?;
        if tenant.is_empty() || suffix.is_empty() {
            return None;
        }
        Some((tenant, suffix))
    }

    /// The tenant owning `path`, or [`COMMONS_TENANT`].
    pub fn tenant_of<'a>(&self, path: &'a str) -> &'a str {
        self.split(path)
            .map(|(tenant, _)| tenant)
            .unwrap_or(COMMONS_TENANT)
    }

    /// The part of a tenant path below the tenant folder.
    pub fn suffix_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.split(path).map(|(_, suffix)| suffix)
    }

    /// Folder prefix (with trailing slash) of a tenant.
    pub fn tenant_prefix(&self, tenant: &str) -> String {
        format!("{}/{}/", self.tenants_root, tenant)
    }

    pub fn tenant_path(&self, tenant: &str, suffix: &str) -> String {
        format!("{}/{}/{}", self.tenants_root, tenant, suffix)
    }

    /// Re-address a tenant document under `tenant`. Commons paths have no
    /// tenant counterpart.
    pub fn relocate(&self, path: &str, tenant: &str) -> Option<String> {
        self.suffix_of(path)
            .map(|suffix| self.tenant_path(tenant, suffix))
    }
}

impl Default for PathLayout {
    fn default() -> Self {
        Self::new("/config/tenants", "tenant-aliases.yml")
    }
}
