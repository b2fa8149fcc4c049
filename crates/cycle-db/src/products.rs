use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{NewProduct, ProductChanges, ProductImageRow, ProductRow};
use crate::{Database, NOW};

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, description, price, category, purchasing_date, thumbnail, created_at";

impl Database {
    // -- Products --

    /// Insert a product with its images. The thumbnail is the first image.
    pub fn insert_product(&self, product: &NewProduct<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO products (id, owner_id, name, description, price, category, purchasing_date, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    product.id,
                    product.owner_id,
                    product.name,
                    product.description,
                    product.price,
                    product.category,
                    product.purchasing_date,
                    product.images.first().map(|img| img.url.as_str()),
                ],
            )?;
            insert_images(&tx, product.id, product.images)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_product(&self, id: &str) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))?;
            let Some(mut product) = stmt.query_row([id], map_product).optional()? else {
                return Ok(None);
            };
            product.images = query_images(conn, id)?;
            Ok(Some(product))
        })
    }

    /// Owner-scoped update of the plain fields. Returns `false` when the
    /// product does not exist or belongs to someone else.
    /// Owner-scoped update of fields, new images and thumbnail in one
    /// transaction. Returns `false` (and writes nothing) if the caller does
    /// not own the product.
    pub fn update_product(&self, id: &str, owner_id: &str, changes: &ProductChanges<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                &format!(
                    "UPDATE products
                     SET name = ?3, description = ?4, price = ?5, category = ?6, purchasing_date = ?7,
                         updated_at = {NOW}
                     WHERE id = ?1 AND owner_id = ?2"
                ),
                rusqlite::params![
                    id,
                    owner_id,
                    changes.name,
                    changes.description,
                    changes.price,
                    changes.category,
                    changes.purchasing_date,
                ],
            )?;
            if updated != 1 {
                return Ok(false);
            }

            insert_images(&tx, id, changes.new_images)?;
            match (changes.thumbnail, changes.new_images.first()) {
                (Some(thumbnail), _) => {
                    tx.execute("UPDATE products SET thumbnail = ?2 WHERE id = ?1", (id, thumbnail))?;
                }
                (None, Some(first)) => {
                    tx.execute(
                        "UPDATE products SET thumbnail = ?2 WHERE id = ?1 AND (thumbnail IS NULL OR thumbnail = '')",
                        (id, &first.url),
                    )?;
                }
                (None, None) => {}
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Owner-scoped delete. Returns the removed product (with its images) so
    /// the caller can release them on the image host.
    pub fn delete_product(&self, id: &str, owner_id: &str) -> Result<Option<ProductRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut product) = query_owned_product(&tx, id, owner_id)? else {
                return Ok(None);
            };
            product.images = query_images(&tx, id)?;
            tx.execute("DELETE FROM products WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(Some(product))
        })
    }

    /// Owner-scoped removal of one image. If the thumbnail pointed at it, the
    /// thumbnail falls back to the first remaining image (or is cleared).
    /// Returns the product as it is after the change.
    pub fn remove_product_image(&self, id: &str, owner_id: &str, image_id: &str) -> Result<Option<ProductRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut product) = query_owned_product(&tx, id, owner_id)? else {
                return Ok(None);
            };

            tx.execute(
                "DELETE FROM product_images WHERE product_id = ?1 AND image_id = ?2",
                (id, image_id),
            )?;
            product.images = query_images(&tx, id)?;

            if product.thumbnail.as_deref().is_some_and(|t| t.contains(image_id)) {
                product.thumbnail = product.images.first().map(|img| img.url.clone());
                tx.execute(
                    "UPDATE products SET thumbnail = ?2 WHERE id = ?1",
                    (id, product.thumbnail.as_deref()),
                )?;
            }

            tx.commit()?;
            Ok(Some(product))
        })
    }

    /// Newest first.
    pub fn list_products_by_category(&self, category: &str, offset: u32, limit: u32) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            query_products(
                conn,
                "WHERE category = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                rusqlite::params![category, limit, offset],
            )
        })
    }

    pub fn list_products_by_owner(&self, owner_id: &str, offset: u32, limit: u32) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            query_products(
                conn,
                "WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                rusqlite::params![owner_id, limit, offset],
            )
        })
    }

    pub fn latest_products(&self, limit: u32) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            query_products(
                conn,
                "ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                rusqlite::params![limit],
            )
        })
    }
}

fn insert_images(conn: &Connection, product_id: &str, images: &[ProductImageRow]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO product_images (product_id, image_id, url) VALUES (?1, ?2, ?3)")?;
    for image in images {
        stmt.execute((product_id, &image.image_id, &image.url))?;
    }
    Ok(())
}

fn query_owned_product(conn: &Connection, id: &str, owner_id: &str) -> Result<Option<ProductRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND owner_id = ?2"
    ))?;
    let row = stmt.query_row((id, owner_id), map_product).optional()?;
    Ok(row)
}

fn query_images(conn: &Connection, product_id: &str) -> Result<Vec<ProductImageRow>> {
    let mut stmt =
        conn.prepare("SELECT image_id, url FROM product_images WHERE product_id = ?1 ORDER BY seq")?;
    let images = stmt
        .query_map([product_id], |row| {
            Ok(ProductImageRow {
                image_id: row.get(0)?,
                url: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(images)
}

fn query_products(conn: &Connection, tail: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<ProductRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products {tail}"))?;
    let mut products = stmt
        .query_map(params, map_product)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Listings are capped at a page, so one image query per row is fine.
    for product in &mut products {
        product.images = query_images(conn, &product.id)?;
    }
    Ok(products)
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        category: row.get(5)?,
        purchasing_date: row.get(6)?,
        thumbnail: row.get(7)?,
        created_at: row.get(8)?,
        images: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use uuid::Uuid;

    fn seed_user(db: &Database, email: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&NewUser {
            id: &id,
            name: "Seller",
            email,
            password: "Abc12345!",
        })
        .unwrap();
        id
    }

    fn image(n: u32) -> ProductImageRow {
        ProductImageRow {
            image_id: format!("img{n}"),
            url: format!("https://cdn.test/img{n}.jpg"),
        }
    }

    fn seed_product(db: &Database, owner: &str, category: &str, images: &[ProductImageRow]) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_product(&NewProduct {
            id: &id,
            owner_id: owner,
            name: "Bike",
            description: "Blue, barely used",
            price: 120.0,
            category,
            purchasing_date: "2023-05-01T00:00:00Z",
            images,
        })
        .unwrap();
        id
    }

    #[test]
    fn insert_sets_thumbnail_to_first_image() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "s@x.com");
        let id = seed_product(&db, &owner, "Fitness", &[image(1), image(2)]);

        let product = db.get_product(&id).unwrap().unwrap();
        assert_eq!(product.thumbnail.as_deref(), Some("https://cdn.test/img1.jpg"));
        assert_eq!(product.images, vec![image(1), image(2)]);
    }

    #[test]
    fn updates_and_deletes_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "s@x.com");
        let other = seed_user(&db, "o@x.com");
        let id = seed_product(&db, &owner, "Fitness", &[]);

        let changes = ProductChanges {
            name: "Road bike",
            description: "Blue",
            price: 99.5,
            category: "Fitness",
            purchasing_date: "2023-05-01T00:00:00Z",
            new_images: &[],
            thumbnail: None,
        };
        assert!(!db.update_product(&id, &other, &changes).unwrap());
        assert!(db.update_product(&id, &owner, &changes).unwrap());
        assert_eq!(db.get_product(&id).unwrap().unwrap().name, "Road bike");

        assert!(db.delete_product(&id, &other).unwrap().is_none());
        assert!(db.delete_product(&id, &owner).unwrap().is_some());
        assert!(db.get_product(&id).unwrap().is_none());
    }

    #[test]
    fn update_appends_images_and_sets_thumbnail() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "s@x.com");
        let other = seed_user(&db, "o@x.com");
        let id = seed_product(&db, &owner, "Fitness", &[]);

        let new_images = [image(1), image(2)];
        let mut changes = ProductChanges {
            name: "Road bike",
            description: "Blue",
            price: 99.5,
            category: "Fitness",
            purchasing_date: "2023-05-01T00:00:00Z",
            new_images: &new_images,
            thumbnail: None,
        };

        // A non-owner writes nothing, images included.
        assert!(!db.update_product(&id, &other, &changes).unwrap());
        assert!(db.get_product(&id).unwrap().unwrap().images.is_empty());

        assert!(db.update_product(&id, &owner, &changes).unwrap());
        let product = db.get_product(&id).unwrap().unwrap();
        assert_eq!(product.images, vec![image(1), image(2)]);
        assert_eq!(product.thumbnail.as_deref(), Some("https://cdn.test/img1.jpg"));

        changes.new_images = &new_images[..0];
        changes.thumbnail = Some("https://cdn.test/img2.jpg");
        assert!(db.update_product(&id, &owner, &changes).unwrap());
        let product = db.get_product(&id).unwrap().unwrap();
        assert_eq!(product.thumbnail.as_deref(), Some("https://cdn.test/img2.jpg"));
    }

    #[test]
    fn removing_thumbnail_image_falls_back() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "s@x.com");
        let id = seed_product(&db, &owner, "Fitness", &[image(1), image(2)]);

        let product = db.remove_product_image(&id, &owner, "img1").unwrap().unwrap();
        assert_eq!(product.images, vec![image(2)]);
        assert_eq!(product.thumbnail.as_deref(), Some("https://cdn.test/img2.jpg"));

        let product = db.remove_product_image(&id, &owner, "img2").unwrap().unwrap();
        assert!(product.images.is_empty());
        assert!(product.thumbnail.is_none());
    }

    #[test]
    fn category_listing_paginates_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "s@x.com");
        let ids: Vec<String> = (0..3).map(|_| seed_product(&db, &owner, "Books", &[])).collect();
        seed_product(&db, &owner, "Toys", &[]);

        let first_page = db.list_products_by_category("Books", 0, 2).unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].id, ids[2]);

        let second_page = db.list_products_by_category("Books", 2, 2).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, ids[0]);

        assert_eq!(db.latest_products(10).unwrap().len(), 4);
        assert_eq!(db.list_products_by_owner(&owner, 0, 10).unwrap().len(), 4);
    }
}
