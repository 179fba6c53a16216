//! Named-permission authorization.
//!
//! Permissions are strings of the form `<resource>-<action>` granted to users
//! through roles. Each `(resource, action)` pair maps to one check function;
//! most pairs use the plain permission lookup, a few carry extra rules.

use std::fmt;
use std::str::FromStr;

use crate::api::ServiceError;
use crate::auth::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Depot,
    Owner,
    Status,
    RepairWorkshop,
    RepairType,
    Repair,
    FreightWagon,
    FreightWagonType,
    PassengerWagon,
    PassengerWagonType,
    PassengerInteriorType,
    TractiveUnit,
    Timetable,
    Train,
    RollingStockTrain,
    Image,
    PassengerReport,
    User,
    Role,
    Permission,
}

impl Resource {
    pub const ALL: [Resource; 20] = [
        Resource::Depot,
        Resource::Owner,
        Resource::Status,
        Resource::RepairWorkshop,
        Resource::RepairType,
        Resource::Repair,
        Resource::FreightWagon,
        Resource::FreightWagonType,
        Resource::PassengerWagon,
        Resource::PassengerWagonType,
        Resource::PassengerInteriorType,
        Resource::TractiveUnit,
        Resource::Timetable,
        Resource::Train,
        Resource::RollingStockTrain,
        Resource::Image,
        Resource::PassengerReport,
        Resource::User,
        Resource::Role,
        Resource::Permission,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Depot => "depot",
            Resource::Owner => "owner",
            Resource::Status => "status",
            Resource::RepairWorkshop => "repair-workshop",
            Resource::RepairType => "repair-type",
            Resource::Repair => "repair",
            Resource::FreightWagon => "freight-wagon",
            Resource::FreightWagonType => "freight-wagon-type",
            Resource::PassengerWagon => "passenger-wagon",
            Resource::PassengerWagonType => "passenger-wagon-type",
            Resource::PassengerInteriorType => "passenger-interior-type",
            Resource::TractiveUnit => "tractive-unit",
            Resource::Timetable => "timetable",
            Resource::Train => "train",
            Resource::RollingStockTrain => "rolling-stock-train",
            Resource::Image => "image",
            Resource::PassengerReport => "passenger-report",
            Resource::User => "user",
            Resource::Role => "role",
            Resource::Permission => "permission",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::ViewAny,
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ViewAny => "viewAny",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// A parsed permission name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.resource.as_str(), self.action.as_str())
    }
}

impl FromStr for Permission {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Resource names contain dashes themselves, the action never does.
        let (resource, action) = s.rsplit_once('-').ok_or(())?;
        let resource = Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == resource)
            .ok_or(())?;
        let action = Action::ALL
            .into_iter()
            .find(|a| a.as_str() == action)
            .ok_or(())?;

        Ok(Permission { resource, action })
    }
}

/// What a check may look at besides the principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subject {
    /// User who created the record, for records that track one.
    pub owner_id: Option<i32>,
}

type Check = fn(Option<&Principal>, Permission, Subject) -> bool;

fn has_permission(principal: Option<&Principal>, permission: Permission, _: Subject) -> bool {
    principal.is_some_and(|p| p.has_permission(&permission.to_string()))
}

fn anyone(_: Option<&Principal>, _: Permission, _: Subject) -> bool {
    true
}

fn owner_or_permission(principal: Option<&Principal>, permission: Permission, subject: Subject) -> bool {
    let is_owner = principal
        .zip(subject.owner_id)
        .is_some_and(|(p, owner_id)| p.user.id == owner_id);

    is_owner || has_permission(principal, permission, subject)
}

/// The check function for one `(resource, action)` pair.
fn check_for(resource: Resource, action: Action) -> Check {
    match (resource, action) {
        (Resource::PassengerReport, Action::Create) => anyone,
        (Resource::Image, Action::Update | Action::Delete) => owner_or_permission,
        _ => has_permission,
    }
}

/// Whether `principal` may perform `action` on `resource`, without mapping to
/// an error.
pub fn allows(
    principal: Option<&Principal>,
    resource: Resource,
    action: Action,
    subject: Subject,
) -> bool {
    let permission = Permission { resource, action };
    check_for(resource, action)(principal, permission, subject)
}

/// Fails with `Unauthenticated` for a guest and `Forbidden` for a principal
/// that is denied.
pub fn authorize_subject(
    principal: Option<&Principal>,
    resource: Resource,
    action: Action,
    subject: Subject,
) -> Result<(), ServiceError> {
    if allows(principal, resource, action, subject) {
        Ok(())
    } else if principal.is_none() {
        Err(ServiceError::Unauthenticated)
    } else {
        Err(ServiceError::Forbidden)
    }
}

pub fn authorize(principal: &Principal, resource: Resource, action: Action) -> Result<(), ServiceError> {
    authorize_subject(Some(principal), resource, action, Subject::default())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::repo::user::User;

    fn principal(id: i32, is_admin: bool, permissions: &[&str]) -> Principal {
        Principal {
            user: User {
                id,
                name: "Dispatcher".to_owned(),
                email: format!("user{}@hzpp.hr", id),
                password: String::new(),
                is_admin,
                created_at: NaiveDateTime::default(),
                updated_at: NaiveDateTime::default(),
            },
            permissions: permissions
                .iter()
                .map(|s| s.to_string())
                .collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn permission_names_round_trip() {
        for resource in Resource::ALL {
            for action in Action::ALL {
                let permission = Permission { resource, action };
                assert_eq!(permission.to_string().parse::<Permission>(), Ok(permission));
            }
        }
        assert_eq!(
            "freight-wagon-viewAny".parse::<Permission>(),
            Ok(Permission {
                resource: Resource::FreightWagon,
                action: Action::ViewAny,
            })
        );
        assert!("freight-wagon-fly".parse::<Permission>().is_err());
        assert!("locomotive-view".parse::<Permission>().is_err());
        assert!("depot".parse::<Permission>().is_err());
    }

    #[test]
    fn granting_exactly_the_permission_allows_the_action() {
        let clerk = principal(1, false, &["depot-create"]);

        assert!(authorize(&clerk, Resource::Depot, Action::Create).is_ok());
        assert!(matches!(
            authorize(&clerk, Resource::Depot, Action::Delete),
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            authorize(&clerk, Resource::Owner, Action::Create),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn guests_are_unauthenticated_except_for_report_intake() {
        assert!(matches!(
            authorize_subject(None, Resource::Depot, Action::ViewAny, Subject::default()),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(authorize_subject(
            None,
            Resource::PassengerReport,
            Action::Create,
            Subject::default()
        )
        .is_ok());
        assert!(matches!(
            authorize_subject(None, Resource::PassengerReport, Action::Delete, Subject::default()),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn uploaders_may_edit_their_own_images() {
        let uploader = principal(5, false, &[]);
        let own = Subject { owner_id: Some(5) };
        let foreign = Subject { owner_id: Some(6) };

        assert!(authorize_subject(Some(&uploader), Resource::Image, Action::Update, own).is_ok());
        assert!(authorize_subject(Some(&uploader), Resource::Image, Action::Delete, own).is_ok());
        assert!(matches!(
            authorize_subject(Some(&uploader), Resource::Image, Action::Delete, foreign),
            Err(ServiceError::Forbidden)
        ));
        // Ownership does not extend to other actions.
        assert!(matches!(
            authorize_subject(Some(&uploader), Resource::Image, Action::View, own),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn report_updates_ignore_ownership() {
        let filer = principal(5, false, &[]);
        let subject = Subject { owner_id: Some(5) };
        assert!(matches!(
            authorize_subject(Some(&filer), Resource::PassengerReport, Action::Update, subject),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn administrators_pass_every_check() {
        let admin = principal(1, true, &[]);
        for resource in Resource::ALL {
            for action in Action::ALL {
                assert!(authorize(&admin, resource, action).is_ok());
            }
        }
    }
}
