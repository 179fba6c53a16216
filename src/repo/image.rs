use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::error::{ServiceError, ValidationErrors};
use crate::repo::fleet;
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::rolling_stock::RollingStockKind;
use crate::schema::{imageables, images};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = images)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Image {
    pub id: i32,
    pub title: Option<String>,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = images)]
pub struct NewImage {
    pub title: Option<String>,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub user_id: Option<i32>,
}

/// Vehicles an image is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLinks {
    pub passenger_wagon_ids: Vec<i32>,
    pub freight_wagon_ids: Vec<i32>,
    pub tractive_unit_ids: Vec<i32>,
}

impl ImageLinks {
    fn ids(&self, kind: RollingStockKind) -> &[i32] {
        match kind {
            RollingStockKind::PassengerWagon => &self.passenger_wagon_ids,
            RollingStockKind::FreightWagon => &self.freight_wagon_ids,
            RollingStockKind::TractiveUnit => &self.tractive_unit_ids,
        }
    }

    fn ids_mut(&mut self, kind: RollingStockKind) -> &mut Vec<i32> {
        match kind {
            RollingStockKind::PassengerWagon => &mut self.passenger_wagon_ids,
            RollingStockKind::FreightWagon => &mut self.freight_wagon_ids,
            RollingStockKind::TractiveUnit => &mut self.tractive_unit_ids,
        }
    }

    /// `(type code, id)` rows for the link table, without duplicates.
    pub fn pairs(&self) -> Vec<(i16, i32)> {
        let mut pairs: Vec<(i16, i32)> = RollingStockKind::ALL
            .iter()
            .flat_map(|kind| self.ids(*kind).iter().map(move |id| (kind.code(), *id)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Every listed vehicle must exist.
    pub fn validate(&self, conn: &mut PgConnection, errors: &mut ValidationErrors) -> QueryResult<()> {
        for kind in RollingStockKind::ALL {
            let ids = self.ids(kind);
            if ids.is_empty() {
                continue;
            }

            let found = match kind {
                RollingStockKind::PassengerWagon => fleet::passenger::find_many(conn, ids)?.len(),
                RollingStockKind::FreightWagon => fleet::freight::find_many(conn, ids)?.len(),
                RollingStockKind::TractiveUnit => fleet::tractive::find_many(conn, ids)?.len(),
            };
            let mut distinct = ids.to_vec();
            distinct.sort_unstable();
            distinct.dedup();
            if found != distinct.len() {
                errors.invalid_reference(&format!("{}_ids", kind.label()));
            }
        }
        Ok(())
    }
}

pub fn list(conn: &mut PgConnection, page: PageRequest) -> QueryResult<Paged<Image>> {
    let total = images::table.count().get_result(conn)?;
    let items = images::table
        .order(images::id)
        .select(Image::as_select())
        .limit(PER_PAGE)
        .offset(page.offset())
        .load(conn)?;

    Ok(Paged {
        items,
        total,
        page: Some(page),
    })
}

pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Image> {
    images::table.find(id).select(Image::as_select()).first(conn)
}

/// Links of each image in `image_ids`.
pub fn links_of(
    conn: &mut PgConnection,
    image_ids: &[i32],
) -> QueryResult<HashMap<i32, ImageLinks>> {
    let rows: Vec<(i32, i16, i32)> = imageables::table
        .filter(imageables::image_id.eq_any(image_ids))
        .order((imageables::image_id, imageables::imageable_type, imageables::imageable_id))
        .select((imageables::image_id, imageables::imageable_type, imageables::imageable_id))
        .load(conn)?;

    let mut links: HashMap<i32, ImageLinks> = HashMap::new();
    for (image_id, code, id) in rows {
        if let Some(kind) = RollingStockKind::from_code(code) {
            links.entry(image_id).or_default().ids_mut(kind).push(id);
        }
    }
    Ok(links)
}

fn replace_links(conn: &mut PgConnection, image_id: i32, links: &ImageLinks) -> QueryResult<()> {
    diesel::delete(imageables::table.filter(imageables::image_id.eq(image_id))).execute(conn)?;

    let rows: Vec<_> = links
        .pairs()
        .into_iter()
        .map(|(code, id)| {
            (
                imageables::image_id.eq(image_id),
                imageables::imageable_type.eq(code),
                imageables::imageable_id.eq(id),
            )
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(imageables::table).values(&rows).execute(conn)?;
    }
    Ok(())
}

pub fn create(
    conn: &mut PgConnection,
    image: &NewImage,
    links: &ImageLinks,
) -> Result<Image, ServiceError> {
    conn.transaction(|conn| {
        let created = diesel::insert_into(images::table)
            .values(image)
            .returning(Image::as_returning())
            .get_result(conn)?;
        replace_links(conn, created.id, links)?;
        Ok(created)
    })
}

/// Replaces the title and the whole link set.
pub fn update(
    conn: &mut PgConnection,
    id: i32,
    title: Option<&str>,
    links: &ImageLinks,
) -> Result<Image, ServiceError> {
    conn.transaction(|conn| {
        let updated = diesel::update(images::table.find(id))
            .set((images::title.eq(title), images::updated_at.eq(diesel::dsl::now)))
            .returning(Image::as_returning())
            .get_result(conn)?;
        replace_links(conn, id, links)?;
        Ok(updated)
    })
}

/// Deletes the row and returns it so the caller can remove the stored files.
pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<Image> {
    diesel::delete(images::table.find(id))
        .returning(Image::as_returning())
        .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_coded_and_deduplicated() {
        let links = ImageLinks {
            passenger_wagon_ids: vec![4, 4],
            freight_wagon_ids: vec![9],
            tractive_unit_ids: vec![2, 1],
        };
        assert_eq!(links.pairs(), vec![(1, 4), (2, 9), (3, 1), (3, 2)]);
    }
}
