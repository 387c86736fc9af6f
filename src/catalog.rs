//! Read-only traversal of a bot's catalog: category tree, products, tiers.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::ShopError;
use crate::shop_model::{Category, ProductWithTiers};
use crate::store::ShopStore;

/// What a category node renders as
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryView {
    /// The node has children; its own products are not listed
    SubCategories {
        category: Category,
        children: Vec<Category>,
    },
    Products {
        category: Category,
        products: Vec<ProductWithTiers>,
    },
    Empty { category: Category },
}

impl CategoryView {
    pub fn category(&self) -> &Category {
        match self {
            CategoryView::SubCategories { category, .. }
            | CategoryView::Products { category, .. }
            | CategoryView::Empty { category } => category,
        }
    }
}

#[derive(Clone)]
pub struct CatalogReader {
    store: Arc<dyn ShopStore>,
}

impl CatalogReader {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    pub async fn root_categories(&self, bot_id: Uuid) -> Result<Vec<Category>, ShopError> {
        Ok(self.store.root_categories(bot_id).await?)
    }

    /// Open a category of `bot_id`. Categories of other bots are reported as
    /// not found.
    pub async fn open_category(
        &self,
        bot_id: Uuid,
        category_id: Uuid,
    ) -> Result<CategoryView, ShopError> {
        let category = self
            .store
            .category(category_id)
            .await?
            .filter(|c| c.bot_id == bot_id)
            .ok_or_else(|| ShopError::not_found("category", category_id))?;

        let children = self.store.sub_categories(category_id).await?;
        if !children.is_empty() {
            debug!(category_id = %category_id, children = children.len(), "Rendering sub-categories");
            return Ok(CategoryView::SubCategories { category, children });
        }

        let products = self.store.products_with_tiers(category_id).await?;
        if products.is_empty() {
            return Ok(CategoryView::Empty { category });
        }
        Ok(CategoryView::Products { category, products })
    }
}
