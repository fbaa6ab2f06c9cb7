use market_common::Money;

use crate::{
    db_types::{NewProduct, Product},
    traits::MarketplaceError,
};

/// The slice of the product catalog that the order flow depends on.
///
/// Catalog CRUD and search live elsewhere. The order engine reads products to price an order and, on settlement,
/// decrements `available_quantity` (that write happens inside [`crate::traits::MarketplaceDatabase`] so that it is
/// atomic with the payment status change).
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetches the product with the given id, or `None` if it does not exist.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Adds a product to the catalog.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    /// Changes the list price of a product. Existing orders are unaffected, since their line items hold snapshots.
    async fn update_product_price(&self, product_id: i64, unit_price: Money) -> Result<Product, MarketplaceError>;
}
