// ==========================================
// 工程物资调拨审批系统 - 物资/库存数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: product 与 stock_level 为 1:1 聚合,
//       目录写入同时维护两张表 (单一事务)
// ==========================================

use crate::domain::product::{Product, ProductWithStock};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ProductRepository - 物资仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 创建新的ProductRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新物资 (同时覆盖库存水位,单一事务)
    ///
    /// # 参数
    /// - `product`: 物资主数据
    /// - `available_qty`: 可用库存 (覆盖写入)
    ///
    /// # 返回
    /// - `Ok(())`: 成功
    /// - `Err`: 数据库错误
    pub fn upsert_with_stock(&self, product: &Product, available_qty: i64) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO product (
                product_id, product_name, category, unit, unit_price,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(product_id) DO UPDATE SET
                product_name = excluded.product_name,
                category = excluded.category,
                unit = excluded.unit,
                unit_price = excluded.unit_price,
                updated_at = excluded.updated_at"#,
            params![
                &product.product_id,
                &product.product_name,
                &product.category,
                &product.unit,
                &product.unit_price,
                &product.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &product.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        tx.execute(
            r#"INSERT INTO stock_level (product_id, available_qty, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id) DO UPDATE SET
                available_qty = excluded.available_qty,
                updated_at = excluded.updated_at"#,
            params![
                &product.product_id,
                &available_qty,
                &product.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 按product_id查询物资
    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT product_id, product_name, category, unit, unit_price,
                      created_at, updated_at
               FROM product
               WHERE product_id = ?"#,
            params![product_id],
            |row| self.map_row(row),
        ) {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按product_id查询物资+库存联合视图
    pub fn find_with_stock(&self, product_id: &str) -> RepositoryResult<Option<ProductWithStock>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT p.product_id, p.product_name, p.category, p.unit, p.unit_price,
                      p.created_at, p.updated_at,
                      COALESCE(s.available_qty, 0)
               FROM product p
               LEFT JOIN stock_level s ON s.product_id = p.product_id
               WHERE p.product_id = ?"#,
            params![product_id],
            |row| self.map_row_with_stock(row),
        ) {
            Ok(view) => Ok(Some(view)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部物资+库存 (目录页)
    pub fn list_with_stock(&self) -> RepositoryResult<Vec<ProductWithStock>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT p.product_id, p.product_name, p.category, p.unit, p.unit_price,
                      p.created_at, p.updated_at,
                      COALESCE(s.available_qty, 0)
               FROM product p
               LEFT JOIN stock_level s ON s.product_id = p.product_id
               ORDER BY p.product_id"#,
        )?;

        let views = stmt
            .query_map([], |row| self.map_row_with_stock(row))?
            .collect::<Result<Vec<ProductWithStock>, _>>()?;

        Ok(views)
    }

    /// 查询低库存物资 (可用数量 < 阈值)
    pub fn find_low_stock(&self, threshold: i64) -> RepositoryResult<Vec<ProductWithStock>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT p.product_id, p.product_name, p.category, p.unit, p.unit_price,
                      p.created_at, p.updated_at,
                      COALESCE(s.available_qty, 0) AS qty
               FROM product p
               LEFT JOIN stock_level s ON s.product_id = p.product_id
               WHERE qty < ?
               ORDER BY qty ASC, p.product_id"#,
        )?;

        let views = stmt
            .query_map(params![threshold], |row| self.map_row_with_stock(row))?
            .collect::<Result<Vec<ProductWithStock>, _>>()?;

        Ok(views)
    }

    /// 库存补货 (增量累加)
    ///
    /// # 返回
    /// - `Ok(new_qty)`: 补货后的可用数量
    /// - `Err(NotFound)`: product_id不存在
    pub fn restock(&self, product_id: &str, qty: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let now = chrono::Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let rows_affected = conn.execute(
            r#"UPDATE stock_level
               SET available_qty = available_qty + ?, updated_at = ?
               WHERE product_id = ?"#,
            params![&qty, &now, product_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StockLevel".to_string(),
                id: product_id.to_string(),
            });
        }

        let new_qty: i64 = conn.query_row(
            "SELECT available_qty FROM stock_level WHERE product_id = ?",
            params![product_id],
            |row| row.get(0),
        )?;

        Ok(new_qty)
    }

    /// 统计物资总数
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;

        Ok(count)
    }

    /// 映射数据库行到Product对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<Product> {
        Ok(Product {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            category: row.get(2)?,
            unit: row.get(3)?,
            unit_price: row.get(4)?,
            created_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(5)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?,
            updated_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(6)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }

    /// 映射数据库行到ProductWithStock对象 (第8列为available_qty)
    fn map_row_with_stock(&self, row: &rusqlite::Row) -> rusqlite::Result<ProductWithStock> {
        Ok(ProductWithStock {
            product: self.map_row(row)?,
            available_qty: row.get(7)?,
        })
    }
}
