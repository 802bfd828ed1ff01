//! Permission descriptors carried by each operation

/// Which resource a permission is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTarget {
    /// The operation's own resource (a secret or a version)
    Resource,
    /// The owning parent, for creation and listing
    Parent,
}

/// The permission an operation requires and where it is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck {
    pub permission: &'static str,
    pub target: ResourceTarget,
}

impl PermissionCheck {
    pub const fn on_resource(permission: &'static str) -> Self {
        Self {
            permission,
            target: ResourceTarget::Resource,
        }
    }

    pub const fn on_parent(permission: &'static str) -> Self {
        Self {
            permission,
            target: ResourceTarget::Parent,
        }
    }
}

pub const SECRETS_CREATE: PermissionCheck = PermissionCheck::on_parent("secretmanager.secrets.create");
pub const SECRETS_LIST: PermissionCheck = PermissionCheck::on_parent("secretmanager.secrets.list");
pub const SECRETS_GET: PermissionCheck = PermissionCheck::on_resource("secretmanager.secrets.get");
pub const SECRETS_UPDATE: PermissionCheck = PermissionCheck::on_resource("secretmanager.secrets.update");
pub const SECRETS_DELETE: PermissionCheck = PermissionCheck::on_resource("secretmanager.secrets.delete");

pub const VERSIONS_ADD: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.add");
pub const VERSIONS_GET: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.get");
pub const VERSIONS_ACCESS: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.access");
pub const VERSIONS_LIST: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.list");
pub const VERSIONS_ENABLE: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.enable");
pub const VERSIONS_DISABLE: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.disable");
pub const VERSIONS_DESTROY: PermissionCheck = PermissionCheck::on_resource("secretmanager.versions.destroy");
