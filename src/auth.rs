//! Organization-admin authorization.
//!
//! Identity extraction from caller certificates happens in the host;
//! entrypoints receive an already-parsed [`CallerIdentity`] and check it
//! against the per-organization admin list kept on the ledger.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::key::{composite_key, ORG_ADMINS};
use crate::store::{read_json, write_json, StateStore};

/// Organization and subject id of the invoking client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub org_id: String,
    pub subject_id: String,
}

impl CallerIdentity {
    pub fn new(org_id: &str, subject_id: &str) -> Self {
        Self {
            org_id: org_id.to_string(),
            subject_id: subject_id.to_string(),
        }
    }
}

/// Admin subject ids registered for one organization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrgAdminList {
    pub admins: Vec<String>,
}

fn org_key(org_id: &str) -> String {
    composite_key(ORG_ADMINS, &[org_id])
}

/// Register the admin list for an organization, replacing any previous
/// list
pub fn set_org_admins<S: StateStore + ?Sized>(
    store: &S,
    org_id: &str,
    admins: Vec<String>,
) -> Result<(), ContractError> {
    if admins.is_empty() {
        return Err(ContractError::RequiredField(
            "admins should not be empty".to_string(),
        ));
    }
    debug!("registering {} admins for organization {}", admins.len(), org_id);
    write_json(store, &org_key(org_id), &OrgAdminList { admins })
}

/// Get the admin list of an organization
pub fn org_admins<S: StateStore + ?Sized>(
    store: &S,
    org_id: &str,
) -> Result<Vec<String>, ContractError> {
    let list: Option<OrgAdminList> = read_json(store, &org_key(org_id))?;
    match list {
        Some(list) => Ok(list.admins),
        None => Err(ContractError::NotFound(format!(
            "The organization {} has not been registered",
            org_id
        ))),
    }
}

/// Whether an organization has a registered admin list
pub fn org_registered<S: StateStore + ?Sized>(
    store: &S,
    org_id: &str,
) -> Result<bool, ContractError> {
    Ok(store.get(&org_key(org_id))?.is_some())
}

/// Require the caller's subject id to be in its organization's admin
/// list
pub fn require_admin<S: StateStore + ?Sized>(
    store: &S,
    caller: &CallerIdentity,
) -> Result<(), ContractError> {
    let admins = org_admins(store, &caller.org_id)?;
    if !admins.iter().any(|admin| admin == &caller.subject_id) {
        return Err(ContractError::Unauthorized(format!(
            "The admin {} is not authorized in organization {}",
            caller.subject_id, caller.org_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_unregistered_org_fails_not_found() {
        let store = MemoryStore::new();
        let caller = CallerIdentity::new("org1", "admin1");
        let err = require_admin(&store, &caller).unwrap_err();
        assert_eq!(err.code(), 3008);
        assert_eq!(
            err.to_string(),
            "The organization org1 has not been registered"
        );
    }

    #[test]
    fn test_registered_admin_passes() {
        let store = MemoryStore::new();
        set_org_admins(&store, "org1", vec!["admin1".into(), "admin2".into()]).unwrap();
        assert!(require_admin(&store, &CallerIdentity::new("org1", "admin2")).is_ok());
    }

    #[test]
    fn test_non_admin_subject_fails_unauthorized() {
        let store = MemoryStore::new();
        set_org_admins(&store, "org1", vec!["admin1".into()]).unwrap();
        let err = require_admin(&store, &CallerIdentity::new("org1", "intruder")).unwrap_err();
        assert_eq!(err.code(), 3007);
        assert_eq!(
            err.to_string(),
            "The admin intruder is not authorized in organization org1"
        );
    }

    #[test]
    fn test_empty_admin_list_rejected() {
        let store = MemoryStore::new();
        let err = set_org_admins(&store, "org1", vec![]).unwrap_err();
        assert_eq!(err.code(), 3005);
    }
}
