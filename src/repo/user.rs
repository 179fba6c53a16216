//! Users, roles and permissions with their link tables.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::error::{ServiceError, ValidationErrors};
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::schema::{permission_role, permissions, role_user, roles, users};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// `password` holds the argon2 hash, never the plain text.
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    /// Left untouched when `None`.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Role {
    pub id: i32,
    pub name: String,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Permission {
    pub id: i32,
    pub name: String,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

/// Records a validation error when any of `ids` is missing from `found`.
fn check_ids(errors: &mut ValidationErrors, field: &str, ids: &[i32], found: usize) {
    let mut distinct = ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != found {
        errors.invalid_reference(field);
    }
}

pub mod user {
    use super::*;

    pub fn list(conn: &mut PgConnection, page: PageRequest) -> QueryResult<Paged<User>> {
        let total = users::table.count().get_result(conn)?;
        let items = users::table
            .order(users::id)
            .select(User::as_select())
            .limit(PER_PAGE)
            .offset(page.offset())
            .load(conn)?;

        Ok(Paged {
            items,
            total,
            page: Some(page),
        })
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<User> {
        users::table.find(id).select(User::as_select()).first(conn)
    }

    pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn validate_roles(
        conn: &mut PgConnection,
        errors: &mut ValidationErrors,
        role_ids: &[i32],
    ) -> QueryResult<()> {
        if !role_ids.is_empty() {
            let found = super::role::find_many(conn, role_ids)?.len();
            check_ids(errors, "roles", role_ids, found);
        }
        Ok(())
    }

    fn replace_roles(conn: &mut PgConnection, user_id: i32, role_ids: &[i32]) -> QueryResult<()> {
        diesel::delete(role_user::table.filter(role_user::user_id.eq(user_id))).execute(conn)?;

        let mut role_ids = role_ids.to_vec();
        role_ids.sort_unstable();
        role_ids.dedup();
        let rows: Vec<_> = role_ids
            .into_iter()
            .map(|role_id| (role_user::role_id.eq(role_id), role_user::user_id.eq(user_id)))
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(role_user::table).values(&rows).execute(conn)?;
        }
        Ok(())
    }

    pub fn create(
        conn: &mut PgConnection,
        new_user: &NewUser,
        role_ids: &[i32],
    ) -> Result<User, ServiceError> {
        conn.transaction(|conn| {
            let created = diesel::insert_into(users::table)
                .values(new_user)
                .returning(User::as_returning())
                .get_result(conn)?;
            replace_roles(conn, created.id, role_ids)?;
            Ok(created)
        })
    }

    pub fn update(
        conn: &mut PgConnection,
        id: i32,
        changes: &UserChanges,
        role_ids: &[i32],
    ) -> Result<User, ServiceError> {
        conn.transaction(|conn| {
            let updated = diesel::update(users::table.find(id))
                .set((changes, users::updated_at.eq(diesel::dsl::now)))
                .returning(User::as_returning())
                .get_result(conn)?;
            replace_roles(conn, id, role_ids)?;
            Ok(updated)
        })
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(users::table.find(id)).execute(conn)
    }

    /// Roles of each user in `user_ids`.
    pub fn roles_of(
        conn: &mut PgConnection,
        user_ids: &[i32],
    ) -> QueryResult<HashMap<i32, Vec<Role>>> {
        let rows: Vec<(i32, Role)> = role_user::table
            .inner_join(roles::table)
            .filter(role_user::user_id.eq_any(user_ids))
            .order(roles::id)
            .select((role_user::user_id, Role::as_select()))
            .load(conn)?;

        let mut by_user: HashMap<i32, Vec<Role>> = HashMap::new();
        for (user_id, role) in rows {
            by_user.entry(user_id).or_default().push(role);
        }
        Ok(by_user)
    }

    /// Names of every permission granted through the user's roles.
    pub fn permission_names(conn: &mut PgConnection, user_id: i32) -> QueryResult<Vec<String>> {
        role_user::table
            .inner_join(permission_role::table.on(permission_role::role_id.eq(role_user::role_id)))
            .inner_join(permissions::table.on(permissions::id.eq(permission_role::permission_id)))
            .filter(role_user::user_id.eq(user_id))
            .select(permissions::name)
            .distinct()
            .order(permissions::name)
            .load(conn)
    }
}

pub mod role {
    use super::*;

    pub fn list(conn: &mut PgConnection, page: Option<PageRequest>) -> QueryResult<Paged<Role>> {
        let query = roles::table.order(roles::id).select(Role::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: roles::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Role> {
        roles::table.find(id).select(Role::as_select()).first(conn)
    }

    pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<Vec<Role>> {
        roles::table
            .filter(roles::id.eq_any(ids))
            .select(Role::as_select())
            .load(conn)
    }

    pub fn validate_permissions(
        conn: &mut PgConnection,
        errors: &mut ValidationErrors,
        permission_ids: &[i32],
    ) -> QueryResult<()> {
        if !permission_ids.is_empty() {
            let found = super::permission::find_many(conn, permission_ids)?.len();
            check_ids(errors, "permissions", permission_ids, found);
        }
        Ok(())
    }

    fn replace_permissions(
        conn: &mut PgConnection,
        role_id: i32,
        permission_ids: &[i32],
    ) -> QueryResult<()> {
        diesel::delete(permission_role::table.filter(permission_role::role_id.eq(role_id)))
            .execute(conn)?;

        let mut permission_ids = permission_ids.to_vec();
        permission_ids.sort_unstable();
        permission_ids.dedup();
        let rows: Vec<_> = permission_ids
            .into_iter()
            .map(|permission_id| {
                (
                    permission_role::permission_id.eq(permission_id),
                    permission_role::role_id.eq(role_id),
                )
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(permission_role::table)
                .values(&rows)
                .execute(conn)?;
        }
        Ok(())
    }

    pub fn create(
        conn: &mut PgConnection,
        name: &str,
        permission_ids: &[i32],
    ) -> Result<Role, ServiceError> {
        conn.transaction(|conn| {
            let created = diesel::insert_into(roles::table)
                .values(roles::name.eq(name))
                .returning(Role::as_returning())
                .get_result(conn)?;
            replace_permissions(conn, created.id, permission_ids)?;
            Ok(created)
        })
    }

    pub fn update(
        conn: &mut PgConnection,
        id: i32,
        name: &str,
        permission_ids: &[i32],
    ) -> Result<Role, ServiceError> {
        conn.transaction(|conn| {
            let updated = diesel::update(roles::table.find(id))
                .set((roles::name.eq(name), roles::updated_at.eq(diesel::dsl::now)))
                .returning(Role::as_returning())
                .get_result(conn)?;
            replace_permissions(conn, id, permission_ids)?;
            Ok(updated)
        })
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(roles::table.find(id)).execute(conn)
    }

    /// Permissions of each role in `role_ids`.
    pub fn permissions_of(
        conn: &mut PgConnection,
        role_ids: &[i32],
    ) -> QueryResult<HashMap<i32, Vec<Permission>>> {
        let rows: Vec<(i32, Permission)> = permission_role::table
            .inner_join(permissions::table)
            .filter(permission_role::role_id.eq_any(role_ids))
            .order(permissions::id)
            .select((permission_role::role_id, Permission::as_select()))
            .load(conn)?;

        let mut by_role: HashMap<i32, Vec<Permission>> = HashMap::new();
        for (role_id, permission) in rows {
            by_role.entry(role_id).or_default().push(permission);
        }
        Ok(by_role)
    }
}

pub mod permission {
    use super::*;

    pub fn list(conn: &mut PgConnection, page: Option<PageRequest>) -> QueryResult<Paged<Permission>> {
        let query = permissions::table
            .order(permissions::id)
            .select(Permission::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: permissions::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Permission> {
        permissions::table
            .find(id)
            .select(Permission::as_select())
            .first(conn)
    }

    pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<Vec<Permission>> {
        permissions::table
            .filter(permissions::id.eq_any(ids))
            .select(Permission::as_select())
            .load(conn)
    }

    pub fn create(conn: &mut PgConnection, name: &str) -> QueryResult<Permission> {
        diesel::insert_into(permissions::table)
            .values(permissions::name.eq(name))
            .returning(Permission::as_returning())
            .get_result(conn)
    }

    pub fn update(conn: &mut PgConnection, id: i32, name: &str) -> QueryResult<Permission> {
        diesel::update(permissions::table.find(id))
            .set((permissions::name.eq(name), permissions::updated_at.eq(diesel::dsl::now)))
            .returning(Permission::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(permissions::table.find(id)).execute(conn)
    }
}
