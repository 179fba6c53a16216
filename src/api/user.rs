//! Accounts, roles and permission names.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::error::{ServiceError, ValidationErrors};
use crate::repo::user::{Permission, Role, User};

/// A user as the API shows it: never with the password hash.
#[derive(Debug, Serialize)]
pub struct UserResource {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub roles: Vec<Role>,
    #[serde(serialize_with = "dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

impl UserResource {
    pub fn new(user: User, roles: Vec<Role>) -> Self {
        UserResource {
            id: user.id,
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleResource {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    #[serde(default)]
    pub roles: Vec<i32>,
}

impl UserForm {
    /// `password_required` is set on create; on update a missing password
    /// keeps the current one.
    fn validate(&self, password_required: bool) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        errors.required("email", &self.email);
        if !self.email.trim().is_empty() && !self.email.contains('@') {
            errors.add("email", "The email must be a valid email address.");
        }

        match self.password.as_deref() {
            None | Some("") if password_required => {
                errors.add("password", "The password field is required.")
            }
            Some(pass) if !pass.is_empty() && pass.chars().count() < 8 => {
                errors.add("password", "The password must be at least 8 characters.")
            }
            _ => {}
        }
        errors
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|pass| !pass.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionForm {
    #[serde(default)]
    pub name: String,
}

impl PermissionForm {
    /// Names must be a `<resource>-<action>` pair the policy table knows.
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        if errors.is_empty()
            && self
                .name
                .trim()
                .parse::<crate::auth::policy::Permission>()
                .is_err()
        {
            errors.add(
                "name",
                "The name must be a resource and an action, e.g. depot-viewAny.",
            );
        }
        errors.finish()
    }
}

pub mod users {
    use axum::extract::{FromRef, Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing, Json, Router};
    use diesel::PgConnection;

    use super::{UserForm, UserResource};
    use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
    use crate::auth::service::hash_password;
    use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
    use crate::repo::user::{self, NewUser, User, UserChanges};
    use crate::repo::Repo;

    pub fn build_router<S>() -> Router<S>
    where
        S: Send + Sync + Clone + 'static,
        AuthRwLock: FromRef<S>,
        Repo: FromRef<S>,
    {
        Router::new()
            .route("/", routing::get(index).post(store))
            .route(
                "/:id",
                routing::get(show).put(update).patch(update).delete(destroy),
            )
    }

    fn present(conn: &mut PgConnection, rows: Vec<User>) -> Result<Vec<UserResource>, ServiceError> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut roles = user::user::roles_of(conn, &ids)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let row_roles = roles.remove(&row.id).unwrap_or_default();
                UserResource::new(row, row_roles)
            })
            .collect())
    }

    fn present_one(conn: &mut PgConnection, row: User) -> Result<UserResource, ServiceError> {
        present(conn, vec![row])?.pop().ok_or(ServiceError::NotFound)
    }

    async fn index(
        principal: Principal,
        State(repo): State<Repo>,
        Query(query): Query<PageQuery>,
    ) -> ListResult<UserResource> {
        authorize(&principal, Resource::User, Action::ViewAny)?;

        let page = query.page();
        let rows = repo
            .run(move |conn| user::user::list(conn, page)?.try_map_items(|rows| present(conn, rows)))
            .await?;
        Ok(api::list(rows))
    }

    async fn show(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> ApiResult<UserResource> {
        authorize(&principal, Resource::User, Action::View)?;

        let row = repo
            .run(move |conn| {
                let row = user::user::find(conn, id)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::ok(row))
    }

    async fn store(
        principal: Principal,
        State(repo): State<Repo>,
        Json(form): Json<UserForm>,
    ) -> Result<impl IntoResponse, ServiceError> {
        authorize(&principal, Resource::User, Action::Create)?;
        let mut errors = form.validate(true);

        let row = repo
            .run(move |conn| {
                user::user::validate_roles(conn, &mut errors, &form.roles)?;
                errors.finish()?;

                let new_user = NewUser {
                    name: form.name.trim().to_owned(),
                    email: form.email.trim().to_owned(),
                    password: hash_password(form.password().unwrap_or_default())?,
                    is_admin: false,
                };
                let row = user::user::create(conn, &new_user, &form.roles)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::created(row))
    }

    async fn update(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
        Json(form): Json<UserForm>,
    ) -> ApiResult<UserResource> {
        authorize(&principal, Resource::User, Action::Update)?;
        let mut errors = form.validate(false);

        let row = repo
            .run(move |conn| {
                user::user::find(conn, id)?;
                user::user::validate_roles(conn, &mut errors, &form.roles)?;
                errors.finish()?;

                let changes = UserChanges {
                    name: form.name.trim().to_owned(),
                    email: form.email.trim().to_owned(),
                    password: form.password().map(hash_password).transpose()?,
                };
                let row = user::user::update(conn, id, &changes, &form.roles)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::ok(row))
    }

    async fn destroy(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> Result<StatusCode, ServiceError> {
        authorize(&principal, Resource::User, Action::Delete)?;

        let deleted = repo
            .run(move |conn| user::user::delete(conn, id).map_err(ServiceError::from_delete))
            .await?;
        match deleted {
            0 => Err(ServiceError::NotFound),
            _ => Ok(StatusCode::NO_CONTENT),
        }
    }
}

pub mod roles {
    use axum::extract::{FromRef, Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing, Json, Router};
    use diesel::PgConnection;

    use super::{RoleForm, RoleResource};
    use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError, ValidationErrors};
    use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
    use crate::repo::user::{role, Role};
    use crate::repo::Repo;

    pub fn build_router<S>() -> Router<S>
    where
        S: Send + Sync + Clone + 'static,
        AuthRwLock: FromRef<S>,
        Repo: FromRef<S>,
    {
        Router::new()
            .route("/", routing::get(index).post(store))
            .route(
                "/:id",
                routing::get(show).put(update).patch(update).delete(destroy),
            )
    }

    fn present(conn: &mut PgConnection, rows: Vec<Role>) -> Result<Vec<RoleResource>, ServiceError> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut permissions = role::permissions_of(conn, &ids)?;

        Ok(rows
            .into_iter()
            .map(|row| RoleResource {
                permissions: permissions.remove(&row.id).unwrap_or_default(),
                role: row,
            })
            .collect())
    }

    fn present_one(conn: &mut PgConnection, row: Role) -> Result<RoleResource, ServiceError> {
        present(conn, vec![row])?.pop().ok_or(ServiceError::NotFound)
    }

    fn checked(
        conn: &mut PgConnection,
        form: &RoleForm,
    ) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &form.name);
        role::validate_permissions(conn, &mut errors, &form.permissions)?;
        errors.finish()
    }

    async fn index(
        principal: Principal,
        State(repo): State<Repo>,
        Query(query): Query<PageQuery>,
    ) -> ListResult<RoleResource> {
        authorize(&principal, Resource::Role, Action::ViewAny)?;

        let page = query.page_or_all();
        let rows = repo
            .run(move |conn| role::list(conn, page)?.try_map_items(|rows| present(conn, rows)))
            .await?;
        Ok(api::list(rows))
    }

    async fn show(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> ApiResult<RoleResource> {
        authorize(&principal, Resource::Role, Action::View)?;

        let row = repo
            .run(move |conn| {
                let row = role::find(conn, id)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::ok(row))
    }

    async fn store(
        principal: Principal,
        State(repo): State<Repo>,
        Json(form): Json<RoleForm>,
    ) -> Result<impl IntoResponse, ServiceError> {
        authorize(&principal, Resource::Role, Action::Create)?;

        let row = repo
            .run(move |conn| {
                checked(conn, &form)?;
                let row = role::create(conn, form.name.trim(), &form.permissions)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::created(row))
    }

    async fn update(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
        Json(form): Json<RoleForm>,
    ) -> ApiResult<RoleResource> {
        authorize(&principal, Resource::Role, Action::Update)?;

        let row = repo
            .run(move |conn| {
                role::find(conn, id)?;
                checked(conn, &form)?;
                let row = role::update(conn, id, form.name.trim(), &form.permissions)?;
                present_one(conn, row)
            })
            .await?;
        Ok(api::ok(row))
    }

    async fn destroy(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> Result<StatusCode, ServiceError> {
        authorize(&principal, Resource::Role, Action::Delete)?;

        let deleted = repo
            .run(move |conn| role::delete(conn, id).map_err(ServiceError::from_delete))
            .await?;
        match deleted {
            0 => Err(ServiceError::NotFound),
            _ => Ok(StatusCode::NO_CONTENT),
        }
    }
}

pub mod permissions {
    use axum::extract::{FromRef, Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing, Json, Router};

    use super::PermissionForm;
    use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
    use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
    use crate::repo::user::{permission, Permission};
    use crate::repo::Repo;

    pub fn build_router<S>() -> Router<S>
    where
        S: Send + Sync + Clone + 'static,
        AuthRwLock: FromRef<S>,
        Repo: FromRef<S>,
    {
        Router::new()
            .route("/", routing::get(index).post(store))
            .route(
                "/:id",
                routing::get(show).put(update).patch(update).delete(destroy),
            )
    }

    async fn index(
        principal: Principal,
        State(repo): State<Repo>,
        Query(query): Query<PageQuery>,
    ) -> ListResult<Permission> {
        authorize(&principal, Resource::Permission, Action::ViewAny)?;

        let page = query.page_or_all();
        let rows = repo.run(move |conn| Ok(permission::list(conn, page)?)).await?;
        Ok(api::list(rows))
    }

    async fn show(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> ApiResult<Permission> {
        authorize(&principal, Resource::Permission, Action::View)?;

        let row = repo.run(move |conn| Ok(permission::find(conn, id)?)).await?;
        Ok(api::ok(row))
    }

    async fn store(
        principal: Principal,
        State(repo): State<Repo>,
        Json(form): Json<PermissionForm>,
    ) -> Result<impl IntoResponse, ServiceError> {
        authorize(&principal, Resource::Permission, Action::Create)?;
        form.validate()?;

        let row = repo
            .run(move |conn| Ok(permission::create(conn, form.name.trim())?))
            .await?;
        Ok(api::created(row))
    }

    async fn update(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
        Json(form): Json<PermissionForm>,
    ) -> ApiResult<Permission> {
        authorize(&principal, Resource::Permission, Action::Update)?;
        form.validate()?;

        let row = repo
            .run(move |conn| Ok(permission::update(conn, id, form.name.trim())?))
            .await?;
        Ok(api::ok(row))
    }

    async fn destroy(
        principal: Principal,
        State(repo): State<Repo>,
        Path(id): Path<i32>,
    ) -> Result<StatusCode, ServiceError> {
        authorize(&principal, Resource::Permission, Action::Delete)?;

        let deleted = repo
            .run(move |conn| permission::delete(conn, id).map_err(ServiceError::from_delete))
            .await?;
        match deleted {
            0 => Err(ServiceError::NotFound),
            _ => Ok(StatusCode::NO_CONTENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_form(email: &str, password: Option<&str>) -> UserForm {
        UserForm {
            name: "Ana Horvat".to_owned(),
            email: email.to_owned(),
            password: password.map(str::to_owned),
            roles: vec![],
        }
    }

    #[test]
    fn password_is_required_only_on_create() {
        let form = user_form("ana@hzpp.hr", None);
        assert!(form.validate(true).get("password").is_some());
        assert!(form.validate(false).is_empty());
    }

    #[test]
    fn short_passwords_and_bad_emails_are_rejected() {
        let errors = user_form("ana.hzpp.hr", Some("short")).validate(false);
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn permission_names_must_be_known_pairs() {
        let known = PermissionForm {
            name: "tractive-unit-update".to_owned(),
        };
        assert!(known.validate().is_ok());

        let unknown = PermissionForm {
            name: "tractive-unit-repaint".to_owned(),
        };
        assert!(matches!(unknown.validate(), Err(ServiceError::Validation(_))));
    }
}
